//! Connection identity resolution.

use std::sync::Arc;

use dashmap::DashMap;

/// What a live connection maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
	pub user_id: String,
	pub session_id: String,
}

/// Maps transport connection IDs to (participant, session).
///
/// Both directions of the connection/session/participant relationship are
/// stored as IDs and resolved per lookup; neither side holds a reference to
/// the other.
#[derive(Clone, Default)]
pub struct ParticipantDirectory {
	bindings: Arc<DashMap<String, Binding>>,
}

impl ParticipantDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds a connection. A user rejoining over a new connection gets a new
	/// binding; within a session there is one live connection per user at a
	/// time, enforced by the session actor on join.
	pub fn bind(&self, connection_id: &str, user_id: &str, session_id: &str) {
		self.bindings.insert(
			connection_id.to_string(),
			Binding {
				user_id: user_id.to_string(),
				session_id: session_id.to_string(),
			},
		);
	}

	pub fn resolve(&self, connection_id: &str) -> Option<Binding> {
		self.bindings.get(connection_id).map(|b| b.value().clone())
	}

	pub fn unbind(&self, connection_id: &str) -> Option<Binding> {
		self.bindings.remove(connection_id).map(|(_, b)| b)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_unknown_connection_is_none() {
		let directory = ParticipantDirectory::new();
		assert!(directory.resolve("nope").is_none());
	}

	#[test]
	fn unbind_returns_and_clears_binding() {
		let directory = ParticipantDirectory::new();
		directory.bind("c1", "u1", "s1");

		let binding = directory.unbind("c1").unwrap();
		assert_eq!(binding.user_id, "u1");
		assert_eq!(binding.session_id, "s1");
		assert!(directory.resolve("c1").is_none());
		assert!(directory.unbind("c1").is_none());
	}
}
