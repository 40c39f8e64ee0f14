//! Control-transfer arbitration for one session.
//!
//! At most one participant holds control at any time. A contested
//! `request-control` notifies the holder and arms a cancellable deadline;
//! when it fires, control transfers only if the holder is still the exact
//! participant captured when the request was made. The timer alone is never
//! trusted: every fired deadline is revalidated against current state, which
//! closes the race where two requests against the same controller could
//! otherwise both transfer.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::SessionMsg;

/// How long an ignored control request waits before the auto-grant.
///
/// There is deliberately no decline path: an unresponsive controller cannot
/// block others indefinitely, at the cost of allowing a silent takeover.
pub const CONTROL_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct PendingRequest {
	expected_controller: String,
	generation: u64,
	timer: JoinHandle<()>,
}

/// Outcome of a `request-control` message.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestOutcome {
	/// No controller was set; control granted immediately.
	Granted,
	/// The requester already holds control.
	AlreadyController,
	/// A deadline was armed against the current controller; notify them.
	Deferred { controller: String },
	/// Duplicate request from the same participant; the existing deadline
	/// was reset and the holder was already notified.
	DeadlineReset,
}

pub struct ControlArbiter {
	session_id: String,
	controller: Option<String>,
	/// At most one unresolved request per requester.
	pending: HashMap<String, PendingRequest>,
	next_generation: u64,
	tx: mpsc::UnboundedSender<SessionMsg>,
}

impl ControlArbiter {
	pub fn new(
		session_id: &str,
		initial_controller: Option<String>,
		tx: mpsc::UnboundedSender<SessionMsg>,
	) -> Self {
		Self {
			session_id: session_id.to_string(),
			controller: initial_controller,
			pending: HashMap::new(),
			next_generation: 0,
			tx,
		}
	}

	pub fn controller(&self) -> Option<&str> {
		self.controller.as_deref()
	}

	pub fn is_controller(&self, user_id: &str) -> bool {
		self.controller.as_deref() == Some(user_id)
	}

	/// Direct grant. Any control change resolves every pending request.
	pub fn set_controller(&mut self, controller: Option<String>) {
		self.cancel_all();
		self.controller = controller;
	}

	pub fn request(&mut self, requester: &str) -> RequestOutcome {
		match self.controller.clone() {
			None => {
				self.set_controller(Some(requester.to_string()));
				RequestOutcome::Granted
			}
			Some(holder) if holder == requester => RequestOutcome::AlreadyController,
			Some(holder) => {
				let fresh = !self.pending.contains_key(requester);
				self.arm(requester, &holder);
				if fresh {
					RequestOutcome::Deferred { controller: holder }
				} else {
					RequestOutcome::DeadlineReset
				}
			}
		}
	}

	/// Handles a fired deadline. Returns true when the transfer happened.
	///
	/// The deadline message carries the generation and the controller it was
	/// armed against; both must still match, and the holder must not have
	/// changed since, otherwise the firing is stale and ignored.
	pub fn deadline_fired(&mut self, requester: &str, expected: &str, generation: u64) -> bool {
		let valid = self
			.pending
			.get(requester)
			.is_some_and(|p| p.generation == generation && p.expected_controller == expected);
		if !valid {
			debug!(
				target = "cobrowse.session",
				session = %self.session_id,
				requester,
				"stale control deadline ignored"
			);
			return false;
		}
		self.pending.remove(requester);

		if self.controller.as_deref() != Some(expected) {
			debug!(
				target = "cobrowse.session",
				session = %self.session_id,
				requester,
				"controller changed before deadline; no transfer"
			);
			return false;
		}

		self.set_controller(Some(requester.to_string()));
		true
	}

	/// Controller activity resolves outstanding requests: an active holder is
	/// not unresponsive, so armed takeovers are dropped.
	pub fn on_controller_action(&mut self) {
		if !self.pending.is_empty() {
			debug!(
				target = "cobrowse.session",
				session = %self.session_id,
				pending = self.pending.len(),
				"controller acted; resolving pending control requests"
			);
			self.cancel_all();
		}
	}

	/// Drops the pending request of a departing requester.
	pub fn cancel_for(&mut self, requester: &str) {
		if let Some(pending) = self.pending.remove(requester) {
			pending.timer.abort();
		}
	}

	pub fn cancel_all(&mut self) {
		for (_, pending) in self.pending.drain() {
			pending.timer.abort();
		}
	}

	/// Arms (or resets) the single deadline for `requester`. A duplicate
	/// request replaces the previous timer, so exactly one deadline and one
	/// eventual grant exist per requester.
	fn arm(&mut self, requester: &str, holder: &str) {
		self.next_generation += 1;
		let generation = self.next_generation;

		if let Some(previous) = self.pending.remove(requester) {
			previous.timer.abort();
		}

		let tx = self.tx.clone();
		let deadline_requester = requester.to_string();
		let deadline_holder = holder.to_string();
		let timer = tokio::spawn(async move {
			tokio::time::sleep(CONTROL_REQUEST_TIMEOUT).await;
			// The actor revalidates; a send after session close is moot.
			let _ = tx.send(SessionMsg::ControlDeadline {
				requester: deadline_requester,
				expected_controller: deadline_holder,
				generation,
			});
		});

		self.pending.insert(
			requester.to_string(),
			PendingRequest {
				expected_controller: holder.to_string(),
				generation,
				timer,
			},
		);
	}
}

impl Drop for ControlArbiter {
	fn drop(&mut self) {
		self.cancel_all();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn arbiter_with_controller(
		controller: &str,
	) -> (ControlArbiter, mpsc::UnboundedReceiver<SessionMsg>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let arbiter = ControlArbiter::new("s1", Some(controller.to_string()), tx);
		(arbiter, rx)
	}

	#[tokio::test(start_paused = true)]
	async fn uncontested_request_grants_immediately() {
		let (tx, _rx) = mpsc::unbounded_channel();
		let mut arbiter = ControlArbiter::new("s1", None, tx);

		assert_eq!(arbiter.request("u2"), RequestOutcome::Granted);
		assert_eq!(arbiter.controller(), Some("u2"));
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_fires_after_timeout_and_transfers() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		assert_eq!(
			arbiter.request("u2"),
			RequestOutcome::Deferred {
				controller: "u1".into()
			}
		);

		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		let msg = rx.recv().await.unwrap();
		let SessionMsg::ControlDeadline {
			requester,
			expected_controller,
			generation,
		} = msg
		else {
			panic!("expected control deadline");
		};

		assert!(arbiter.deadline_fired(&requester, &expected_controller, generation));
		assert_eq!(arbiter.controller(), Some("u2"));
	}

	#[tokio::test(start_paused = true)]
	async fn duplicate_request_resets_to_a_single_deadline() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		assert_eq!(
			arbiter.request("u2"),
			RequestOutcome::Deferred {
				controller: "u1".into()
			}
		);
		tokio::time::advance(Duration::from_secs(5)).await;
		// The duplicate only resets the deadline; the holder is not
		// notified again.
		assert_eq!(arbiter.request("u2"), RequestOutcome::DeadlineReset);

		// The first timer was aborted; only the reset one fires.
		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		let SessionMsg::ControlDeadline { generation, .. } = rx.recv().await.unwrap() else {
			panic!("expected control deadline");
		};
		assert_eq!(generation, 2);
		assert!(rx.try_recv().is_err());

		assert!(arbiter.deadline_fired("u2", "u1", generation));
		assert_eq!(arbiter.controller(), Some("u2"));
	}

	#[tokio::test(start_paused = true)]
	async fn control_change_before_deadline_invalidates_it() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		arbiter.request("u2");
		arbiter.set_controller(Some("u3".to_string()));

		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		// The timer was aborted; even if a message had been queued already,
		// revalidation rejects it.
		assert!(rx.try_recv().is_err());
		assert!(!arbiter.deadline_fired("u2", "u1", 1));
		assert_eq!(arbiter.controller(), Some("u3"));
	}

	#[tokio::test(start_paused = true)]
	async fn two_requests_against_same_controller_yield_one_transfer() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		arbiter.request("u2");
		arbiter.request("u3");

		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		let first = rx.recv().await.unwrap();
		let second = rx.recv().await.unwrap();

		let mut transfers = 0;
		for msg in [first, second] {
			let SessionMsg::ControlDeadline {
				requester,
				expected_controller,
				generation,
			} = msg
			else {
				panic!("expected control deadline");
			};
			if arbiter.deadline_fired(&requester, &expected_controller, generation) {
				transfers += 1;
			}
		}

		// Whichever deadline is processed first wins; the other is stale.
		assert_eq!(transfers, 1);
		assert_ne!(arbiter.controller(), Some("u1"));
	}

	#[tokio::test(start_paused = true)]
	async fn controller_action_resolves_pending_requests() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		arbiter.request("u2");
		arbiter.on_controller_action();

		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		assert!(rx.try_recv().is_err());
		assert_eq!(arbiter.controller(), Some("u1"));
	}

	#[tokio::test(start_paused = true)]
	async fn requester_disconnect_cancels_their_deadline() {
		let (mut arbiter, mut rx) = arbiter_with_controller("u1");

		arbiter.request("u2");
		arbiter.cancel_for("u2");

		tokio::time::advance(CONTROL_REQUEST_TIMEOUT).await;
		assert!(rx.try_recv().is_err());
		assert_eq!(arbiter.controller(), Some("u1"));
	}
}
