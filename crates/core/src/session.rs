//! Per-session actor.
//!
//! Every inbound operation for a session goes through that session's private
//! queue and is applied by one task; no two operations on the same session
//! ever interleave, which is what makes the recording order and the
//! single-controller invariant structurally obvious. Sessions run on
//! independent tasks, so distinct sessions proceed fully in parallel.

use std::sync::Arc;

use cobrowse_protocol::{
	ActionPayload, AnnotationPayload, IssueAnalysis, ParticipantInfo, ServerEvent, SessionSnapshot,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::analysis::IssueAnalyzer;
use crate::arbiter::ControlArbiter;
use crate::driver::{PageDriver, PageEvent};
use crate::error::{CoreError, Result};
use crate::executor;
use crate::export::ExportSink;
use crate::lifecycle::{self, LifecyclePhase};
use crate::recording::RecordingStore;
use crate::store::{SessionHandle, SessionStore};

/// Outbound event channel for one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Messages a session actor processes, strictly one at a time.
pub enum SessionMsg {
	Join {
		user_id: String,
		user_name: String,
		connection_id: String,
		events: EventSender,
		reply: oneshot::Sender<Result<()>>,
	},
	Snapshot {
		reply: oneshot::Sender<Result<SessionSnapshot>>,
	},
	Action {
		performer: String,
		action: ActionPayload,
		force: bool,
		reply: oneshot::Sender<Result<()>>,
	},
	Annotate {
		author: String,
		annotation: AnnotationPayload,
		reply: oneshot::Sender<Result<()>>,
	},
	Comment {
		author: String,
		text: String,
		attached_to: Option<String>,
		is_issue: bool,
		reply: oneshot::Sender<Result<()>>,
	},
	RequestControl {
		requester: String,
		reply: oneshot::Sender<Result<()>>,
	},
	Leave {
		user_id: String,
		connection_id: String,
	},
	/// Fired by a control-request timer; always revalidated against current
	/// state before any transfer.
	ControlDeadline {
		requester: String,
		expected_controller: String,
		generation: u64,
	},
	/// Completed issue analysis, routed back through the queue so the
	/// `bug-detected` broadcast keeps session ordering.
	AnalysisReady {
		comment_id: String,
		analysis: IssueAnalysis,
	},
}

/// Services shared by all session actors.
#[derive(Clone)]
pub struct SessionDeps {
	pub store: SessionStore,
	pub export: Arc<dyn ExportSink>,
	pub analyzer: Arc<dyn IssueAnalyzer>,
}

pub(crate) struct Member {
	pub info: ParticipantInfo,
	pub connection_id: String,
	pub events: EventSender,
}

pub(crate) struct SessionState {
	pub session_id: String,
	pub name: String,
	pub created_at: u64,
	pub creator_id: String,
	/// Current participants in insertion order.
	pub members: Vec<Member>,
	/// Everyone who ever joined, in join order, for the export document.
	pub roster: Vec<ParticipantInfo>,
	pub arbiter: ControlArbiter,
	pub recording: RecordingStore,
	pub page: Box<dyn PageDriver>,
	pub current_url: Option<String>,
	pub phase: LifecyclePhase,
	/// Mailbox clone handed to analysis tasks.
	pub tx: mpsc::UnboundedSender<SessionMsg>,
}

enum Flow {
	Continue,
	Closed,
}

pub struct SessionActor;

impl SessionActor {
	/// Registers a new session in the store and spawns its actor task.
	///
	/// The creator joins as controller. The `session-created` event is
	/// emitted on the creator's channel before the actor starts, so it
	/// precedes every other event of this session.
	pub fn spawn(
		session_id: &str,
		name: &str,
		creator: ParticipantInfo,
		connection_id: &str,
		events: EventSender,
		mut page: Box<dyn PageDriver>,
		deps: SessionDeps,
	) -> Result<SessionHandle> {
		let (tx, rx) = mpsc::unbounded_channel();
		let handle = SessionHandle::new(tx.clone());
		if let Err(err) = deps.store.create(session_id, handle.clone()) {
			// No actor will ever own this page; release it here.
			tokio::spawn(async move { page.close().await });
			return Err(err);
		}

		let page_events = page.take_events();
		let arbiter = ControlArbiter::new(session_id, Some(creator.user_id.clone()), tx.clone());
		let state = SessionState {
			session_id: session_id.to_string(),
			name: name.to_string(),
			created_at: crate::ids::now_ms(),
			creator_id: creator.user_id.clone(),
			members: vec![Member {
				info: creator.clone(),
				connection_id: connection_id.to_string(),
				events: events.clone(),
			}],
			roster: vec![creator],
			arbiter,
			recording: RecordingStore::new(),
			page,
			current_url: None,
			phase: LifecyclePhase::Active,
			tx,
		};

		let created = ServerEvent::SessionCreated {
			session_id: session_id.to_string(),
			snapshot: state.snapshot(None),
		};
		let _ = events.send(created);

		info!(
			target = "cobrowse.session",
			session = session_id,
			creator = %state.creator_id,
			"session created"
		);
		tokio::spawn(run(state, rx, page_events, deps));
		Ok(handle)
	}
}

async fn run(
	mut state: SessionState,
	mut rx: mpsc::UnboundedReceiver<SessionMsg>,
	mut page_events: Option<mpsc::UnboundedReceiver<PageEvent>>,
	deps: SessionDeps,
) {
	loop {
		tokio::select! {
			msg = rx.recv() => {
				let Some(msg) = msg else { break };
				match state.handle(msg, &deps).await {
					Flow::Continue => {}
					Flow::Closed => break,
				}
			}
			event = next_page_event(&mut page_events) => {
				match event {
					Some(event) => state.forward_page_event(event),
					// Page event stream ended; stop polling it.
					None => page_events = None,
				}
			}
		}
	}

	// Answer anything that was queued behind the close instead of dropping
	// the reply channels on the floor.
	rx.close();
	while let Ok(msg) = rx.try_recv() {
		let _ = state.handle(msg, &deps).await;
	}
}

async fn next_page_event(
	events: &mut Option<mpsc::UnboundedReceiver<PageEvent>>,
) -> Option<PageEvent> {
	match events {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}

impl SessionState {
	async fn handle(&mut self, msg: SessionMsg, deps: &SessionDeps) -> Flow {
		if self.phase != LifecyclePhase::Active {
			self.reject_closed(msg);
			return Flow::Closed;
		}
		match msg {
			SessionMsg::Join {
				user_id,
				user_name,
				connection_id,
				events,
				reply,
			} => {
				let result = self.join(&user_id, &user_name, &connection_id, events).await;
				let _ = reply.send(result);
			}
			SessionMsg::Snapshot { reply } => {
				let screenshot = self.capture_screenshot().await;
				let _ = reply.send(Ok(self.snapshot(screenshot)));
			}
			SessionMsg::Action {
				performer,
				action,
				force,
				reply,
			} => {
				// Failures go to the requester only; nothing is broadcast
				// and nothing is recorded.
				let result = executor::execute(self, &performer, &action, force).await;
				let _ = reply.send(result);
			}
			SessionMsg::Annotate {
				author,
				annotation,
				reply,
			} => {
				let stored =
					self.recording
						.append_annotation(&annotation.kind, annotation.payload, &author);
				self.broadcast(ServerEvent::AnnotationAdded { annotation: stored });
				let _ = reply.send(Ok(()));
			}
			SessionMsg::Comment {
				author,
				text,
				attached_to,
				is_issue,
				reply,
			} => {
				let result = self.comment(&author, &text, attached_to, is_issue, deps);
				let _ = reply.send(result);
			}
			SessionMsg::RequestControl { requester, reply } => {
				let result = self.request_control(&requester);
				let _ = reply.send(result);
			}
			SessionMsg::ControlDeadline {
				requester,
				expected_controller,
				generation,
			} => {
				if !self.is_member(&requester) {
					self.arbiter.cancel_for(&requester);
				} else if self
					.arbiter
					.deadline_fired(&requester, &expected_controller, generation)
				{
					info!(
						target = "cobrowse.session",
						session = %self.session_id,
						new_controller = %requester,
						"control auto-granted after timeout"
					);
					self.broadcast(ServerEvent::ControlChanged {
						new_controller: Some(requester),
					});
				}
			}
			SessionMsg::AnalysisReady {
				comment_id,
				analysis,
			} => {
				self.broadcast(ServerEvent::BugDetected {
					comment_id,
					analysis,
				});
			}
			SessionMsg::Leave {
				user_id,
				connection_id,
			} => {
				if self.leave(&user_id, &connection_id) {
					lifecycle::close(self, deps).await;
					return Flow::Closed;
				}
			}
		}
		Flow::Continue
	}

	/// Answers a message that arrived after the session left `Active`.
	/// Request/response messages get `SessionClosed`; the rest are moot.
	fn reject_closed(&self, msg: SessionMsg) {
		match msg {
			SessionMsg::Join { reply, .. }
			| SessionMsg::Action { reply, .. }
			| SessionMsg::Annotate { reply, .. }
			| SessionMsg::Comment { reply, .. }
			| SessionMsg::RequestControl { reply, .. } => {
				let _ = reply.send(Err(CoreError::SessionClosed));
			}
			SessionMsg::Snapshot { reply } => {
				let _ = reply.send(Err(CoreError::SessionClosed));
			}
			SessionMsg::Leave { .. }
			| SessionMsg::ControlDeadline { .. }
			| SessionMsg::AnalysisReady { .. } => {}
		}
	}

	async fn join(
		&mut self,
		user_id: &str,
		user_name: &str,
		connection_id: &str,
		events: EventSender,
	) -> Result<()> {
		let info = ParticipantInfo {
			user_id: user_id.to_string(),
			display_name: user_name.to_string(),
		};

		if let Some(member) = self.members.iter_mut().find(|m| m.info.user_id == user_id) {
			// One live connection per user: a rejoin replaces the old one.
			member.connection_id = connection_id.to_string();
			member.events = events.clone();
			member.info = info;
		} else {
			self.members.push(Member {
				info: info.clone(),
				connection_id: connection_id.to_string(),
				events: events.clone(),
			});
			if !self.roster.iter().any(|p| p.user_id == user_id) {
				self.roster.push(info.clone());
			}
			self.broadcast_except(user_id, ServerEvent::UserJoined { participant: info });
		}

		let screenshot = self.capture_screenshot().await;
		let _ = events.send(ServerEvent::SessionJoined {
			snapshot: self.snapshot(screenshot),
		});
		debug!(
			target = "cobrowse.session",
			session = %self.session_id,
			user = user_id,
			"participant joined"
		);
		Ok(())
	}

	/// Removes a participant. Returns true when the session became empty and
	/// must close.
	fn leave(&mut self, user_id: &str, connection_id: &str) -> bool {
		// A stale leave from a replaced connection must not evict the user's
		// live connection.
		let Some(index) = self
			.members
			.iter()
			.position(|m| m.info.user_id == user_id && m.connection_id == connection_id)
		else {
			return false;
		};
		self.members.remove(index);
		self.arbiter.cancel_for(user_id);
		self.broadcast(ServerEvent::UserLeft {
			user_id: user_id.to_string(),
		});

		if self.arbiter.is_controller(user_id) {
			let successor = if user_id == self.creator_id {
				// Creator departure hands control to the oldest remaining
				// participant.
				self.members.first().map(|m| m.info.user_id.clone())
			} else {
				None
			};
			self.arbiter.set_controller(successor.clone());
			self.broadcast(ServerEvent::ControlChanged {
				new_controller: successor,
			});
		}

		debug!(
			target = "cobrowse.session",
			session = %self.session_id,
			user = user_id,
			remaining = self.members.len(),
			"participant left"
		);
		self.members.is_empty()
	}

	fn request_control(&mut self, requester: &str) -> Result<()> {
		if !self.is_member(requester) {
			return Err(CoreError::NotController(requester.to_string()));
		}
		match self.arbiter.request(requester) {
			crate::arbiter::RequestOutcome::Granted => {
				self.broadcast(ServerEvent::ControlChanged {
					new_controller: Some(requester.to_string()),
				});
			}
			crate::arbiter::RequestOutcome::AlreadyController => {}
			// The deadline moved but the holder was already asked once; a
			// repeat notification would just be noise.
			crate::arbiter::RequestOutcome::DeadlineReset => {}
			crate::arbiter::RequestOutcome::Deferred { controller } => {
				let info = self
					.members
					.iter()
					.find(|m| m.info.user_id == requester)
					.map(|m| m.info.clone())
					.unwrap_or(ParticipantInfo {
						user_id: requester.to_string(),
						display_name: requester.to_string(),
					});
				self.send_to(&controller, ServerEvent::ControlRequested { requester: info });
			}
		}
		Ok(())
	}

	fn comment(
		&mut self,
		author: &str,
		text: &str,
		attached_to: Option<String>,
		is_issue: bool,
		deps: &SessionDeps,
	) -> Result<()> {
		let comment = self
			.recording
			.append_comment(text, author, attached_to, is_issue)?;
		self.broadcast(ServerEvent::CommentAdded {
			comment: comment.clone(),
		});

		if is_issue {
			// Best effort: the analyzer runs off the actor so a slow service
			// never blocks the session. Results re-enter through the queue.
			let analyzer = Arc::clone(&deps.analyzer);
			let tx = self.tx.clone();
			let session_id = self.session_id.clone();
			let screenshot = self.recording.latest_screenshot().map(str::to_string);
			let text = text.to_string();
			let comment_id = comment.id;
			tokio::spawn(async move {
				match analyzer
					.analyze(&text, screenshot.as_deref(), &session_id)
					.await
				{
					Ok(analysis) if analysis.is_bug => {
						let _ = tx.send(SessionMsg::AnalysisReady {
							comment_id,
							analysis,
						});
					}
					Ok(_) => {}
					Err(err) => {
						warn!(
							target = "cobrowse.analysis",
							session = %session_id,
							error = %err,
							"issue analysis failed; ignoring"
						);
					}
				}
			});
		}
		Ok(())
	}

	fn is_member(&self, user_id: &str) -> bool {
		self.members.iter().any(|m| m.info.user_id == user_id)
	}

	pub(crate) fn snapshot(&self, screenshot: Option<String>) -> SessionSnapshot {
		SessionSnapshot {
			session_id: self.session_id.clone(),
			name: self.name.clone(),
			url: self.current_url.clone(),
			screenshot,
			participants: self.members.iter().map(|m| m.info.clone()).collect(),
			controller: self.arbiter.controller().map(str::to_string),
			recording: self.recording.snapshot(),
		}
	}

	/// Screenshot for mirroring. Runs inside the actor so it cannot
	/// interleave with an in-flight action on the shared page.
	async fn capture_screenshot(&mut self) -> Option<String> {
		match self.page.screenshot().await {
			Ok(bytes) => Some(cobrowse_protocol::encode_screenshot(&bytes)),
			Err(err) => {
				debug!(
					target = "cobrowse.session",
					session = %self.session_id,
					error = %err,
					"snapshot screenshot unavailable"
				);
				None
			}
		}
	}

	fn forward_page_event(&mut self, event: PageEvent) {
		let event = match event {
			PageEvent::Console(payload) => ServerEvent::PageConsole { payload },
			PageEvent::Network(payload) => ServerEvent::PageNetwork { payload },
			PageEvent::PageError(payload) => ServerEvent::PageError { payload },
		};
		self.broadcast(event);
	}

	pub(crate) fn broadcast(&self, event: ServerEvent) {
		for member in &self.members {
			let _ = member.events.send(event.clone());
		}
	}

	fn broadcast_except(&self, user_id: &str, event: ServerEvent) {
		for member in self.members.iter().filter(|m| m.info.user_id != user_id) {
			let _ = member.events.send(event.clone());
		}
	}

	fn send_to(&self, user_id: &str, event: ServerEvent) {
		if let Some(member) = self.members.iter().find(|m| m.info.user_id == user_id) {
			let _ = member.events.send(event);
		}
	}
}
