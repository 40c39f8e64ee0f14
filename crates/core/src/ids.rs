//! Token and timestamp helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Random opaque token for session, connection, and record IDs.
///
/// Collisions are treated as hard errors by [`crate::store::SessionStore`],
/// never retried.
pub fn token() -> String {
	Uuid::new_v4().to_string()
}

/// Unix milliseconds.
pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}
