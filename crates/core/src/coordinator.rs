//! Entry point tying the store, directory, and session actors together.

use std::sync::Arc;

use cobrowse_protocol::{ActionPayload, AnnotationPayload, ParticipantInfo, SessionSnapshot};
use tokio::sync::oneshot;
use tracing::debug;

use crate::analysis::IssueAnalyzer;
use crate::directory::{Binding, ParticipantDirectory};
use crate::driver::BrowserDriver;
use crate::error::{CoreError, Result};
use crate::export::ExportSink;
use crate::ids;
use crate::session::{EventSender, SessionActor, SessionDeps, SessionMsg};
use crate::store::SessionStore;

/// Front door for the transport layer.
///
/// Resolves connection identity through the [`ParticipantDirectory`], looks
/// the session up by ID in the [`SessionStore`] per operation, and forwards
/// into the session's queue. Holds no per-session state itself.
#[derive(Clone)]
pub struct Coordinator {
	store: SessionStore,
	directory: ParticipantDirectory,
	driver: Arc<dyn BrowserDriver>,
	deps: SessionDeps,
}

impl Coordinator {
	pub fn new(
		driver: Arc<dyn BrowserDriver>,
		export: Arc<dyn ExportSink>,
		analyzer: Arc<dyn IssueAnalyzer>,
	) -> Self {
		let store = SessionStore::new();
		Self {
			deps: SessionDeps {
				store: store.clone(),
				export,
				analyzer,
			},
			store,
			directory: ParticipantDirectory::new(),
			driver,
		}
	}

	pub fn store(&self) -> &SessionStore {
		&self.store
	}

	/// Creates a session with the caller as creator and controller, returning
	/// the generated session ID. The `session-created` event (with the
	/// initial snapshot) arrives on `events`.
	pub async fn create_session(
		&self,
		name: &str,
		user_id: &str,
		user_name: &str,
		connection_id: &str,
		events: EventSender,
	) -> Result<String> {
		let session_id = ids::token();
		let page = self.driver.open_page().await?;

		let creator = ParticipantInfo {
			user_id: user_id.to_string(),
			display_name: user_name.to_string(),
		};
		SessionActor::spawn(
			&session_id,
			name,
			creator,
			connection_id,
			events,
			page,
			self.deps.clone(),
		)?;
		self.directory.bind(connection_id, user_id, &session_id);
		Ok(session_id)
	}

	/// Joins an existing session. The `session-joined` snapshot arrives on
	/// `events` before any subsequent broadcast of this session.
	pub async fn join_session(
		&self,
		session_id: &str,
		user_id: &str,
		user_name: &str,
		connection_id: &str,
		events: EventSender,
	) -> Result<()> {
		let handle = self.store.get(session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::Join {
			user_id: user_id.to_string(),
			user_name: user_name.to_string(),
			connection_id: connection_id.to_string(),
			events,
			reply,
		})?;
		rx.await.map_err(|_| CoreError::SessionClosed)??;
		self.directory.bind(connection_id, user_id, session_id);
		Ok(())
	}

	/// Read-only state snapshot, serialized with the session's other
	/// operations (the screenshot goes through the same queue as actions).
	pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
		let handle = self.store.get(session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::Snapshot { reply })?;
		rx.await.map_err(|_| CoreError::SessionClosed)?
	}

	pub async fn perform_action(
		&self,
		connection_id: &str,
		action: ActionPayload,
		force: bool,
	) -> Result<()> {
		let binding = self.resolve(connection_id)?;
		let handle = self.store.get(&binding.session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::Action {
			performer: binding.user_id,
			action,
			force,
			reply,
		})?;
		rx.await.map_err(|_| CoreError::SessionClosed)?
	}

	pub async fn add_annotation(
		&self,
		connection_id: &str,
		annotation: AnnotationPayload,
	) -> Result<()> {
		let binding = self.resolve(connection_id)?;
		let handle = self.store.get(&binding.session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::Annotate {
			author: binding.user_id,
			annotation,
			reply,
		})?;
		rx.await.map_err(|_| CoreError::SessionClosed)?
	}

	pub async fn add_comment(
		&self,
		connection_id: &str,
		text: &str,
		attached_to: Option<String>,
		is_issue: bool,
	) -> Result<()> {
		let binding = self.resolve(connection_id)?;
		let handle = self.store.get(&binding.session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::Comment {
			author: binding.user_id,
			text: text.to_string(),
			attached_to,
			is_issue,
			reply,
		})?;
		rx.await.map_err(|_| CoreError::SessionClosed)?
	}

	pub async fn request_control(&self, connection_id: &str) -> Result<()> {
		let binding = self.resolve(connection_id)?;
		let handle = self.store.get(&binding.session_id)?;
		let (reply, rx) = oneshot::channel();
		handle.send(SessionMsg::RequestControl {
			requester: binding.user_id,
			reply,
		})?;
		rx.await.map_err(|_| CoreError::SessionClosed)?
	}

	/// Transport-level disconnect. Unresolved connections are a no-op. An
	/// in-flight action is never cancelled; the leave is queued behind it.
	pub async fn disconnect(&self, connection_id: &str) {
		let Some(Binding {
			user_id,
			session_id,
		}) = self.directory.unbind(connection_id)
		else {
			return;
		};
		debug!(
			target = "cobrowse.session",
			connection = connection_id,
			user = %user_id,
			session = %session_id,
			"connection dropped"
		);
		if let Ok(handle) = self.store.get(&session_id) {
			let _ = handle.send(SessionMsg::Leave {
				user_id,
				connection_id: connection_id.to_string(),
			});
		}
	}

	fn resolve(&self, connection_id: &str) -> Result<Binding> {
		self.directory
			.resolve(connection_id)
			.ok_or_else(|| CoreError::SessionNotFound(format!("connection {connection_id}")))
	}
}
