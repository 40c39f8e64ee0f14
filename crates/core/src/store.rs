//! In-memory registry of live sessions.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;

use crate::error::{CoreError, Result};
use crate::session::SessionMsg;

/// Mailbox for one live session's actor task.
///
/// This is the only way any component reaches a session: the handle is looked
/// up by ID per operation and holds no session state, so a closed session can
/// never be mutated through a stale reference.
#[derive(Clone, Debug)]
pub struct SessionHandle {
	tx: mpsc::UnboundedSender<SessionMsg>,
}

impl SessionHandle {
	pub fn new(tx: mpsc::UnboundedSender<SessionMsg>) -> Self {
		Self { tx }
	}

	/// Delivers a message to the session actor. A send after the actor has
	/// shut down means the session closed between lookup and delivery.
	pub fn send(&self, msg: SessionMsg) -> Result<()> {
		self.tx.send(msg).map_err(|_| CoreError::SessionClosed)
	}
}

/// Registry of live sessions keyed by session ID.
#[derive(Clone, Default)]
pub struct SessionStore {
	sessions: Arc<DashMap<String, SessionHandle>>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new session. Session IDs are caller-generated random
	/// tokens, so a collision is a hard error, not retried.
	pub fn create(&self, session_id: &str, handle: SessionHandle) -> Result<()> {
		match self.sessions.entry(session_id.to_string()) {
			Entry::Occupied(_) => Err(CoreError::DuplicateSession(session_id.to_string())),
			Entry::Vacant(slot) => {
				slot.insert(handle);
				Ok(())
			}
		}
	}

	pub fn get(&self, session_id: &str) -> Result<SessionHandle> {
		self.sessions
			.get(session_id)
			.map(|entry| entry.value().clone())
			.ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))
	}

	pub fn remove(&self, session_id: &str) {
		self.sessions.remove(session_id);
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle() -> SessionHandle {
		let (tx, _rx) = mpsc::unbounded_channel();
		SessionHandle::new(tx)
	}

	#[test]
	fn create_rejects_duplicate_ids() {
		let store = SessionStore::new();
		store.create("s1", handle()).unwrap();
		let err = store.create("s1", handle()).unwrap_err();
		assert!(matches!(err, CoreError::DuplicateSession(id) if id == "s1"));
	}

	#[test]
	fn get_after_remove_is_not_found() {
		let store = SessionStore::new();
		store.create("s1", handle()).unwrap();
		assert!(store.get("s1").is_ok());

		store.remove("s1");
		let err = store.get("s1").unwrap_err();
		assert!(matches!(err, CoreError::SessionNotFound(id) if id == "s1"));
	}

	#[test]
	fn send_to_dead_actor_reports_closed() {
		let (tx, rx) = mpsc::unbounded_channel();
		drop(rx);
		let handle = SessionHandle::new(tx);
		let err = handle
			.send(SessionMsg::Leave {
				user_id: "u1".into(),
				connection_id: "c1".into(),
			})
			.unwrap_err();
		assert!(matches!(err, CoreError::SessionClosed));
	}
}
