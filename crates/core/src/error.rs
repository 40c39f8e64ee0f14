use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Error taxonomy for session coordination.
///
/// Structural errors are returned synchronously to the originating request
/// only; nothing here ever force-closes a session. Driver failures abort the
/// single action that hit them and leave the session usable.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("session not found: {0}")]
	SessionNotFound(String),

	#[error("session already exists: {0}")]
	DuplicateSession(String),

	#[error("participant {0} does not hold control")]
	NotController(String),

	#[error("unsupported action type: {0}")]
	UnsupportedAction(String),

	#[error("session is closed")]
	SessionClosed,

	#[error("comment attachment target not found: {0}")]
	InvalidAttachment(String),

	#[error("browser driver error: {0}")]
	Driver(String),

	/// Never surfaces to clients; issue analysis is best-effort.
	#[error("analysis service unavailable: {0}")]
	AnalysisUnavailable(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CoreError {
	/// Short machine-readable code carried in error events.
	pub fn code(&self) -> &'static str {
		match self {
			CoreError::SessionNotFound(_) => "session_not_found",
			CoreError::DuplicateSession(_) => "duplicate_session",
			CoreError::NotController(_) => "not_controller",
			CoreError::UnsupportedAction(_) => "unsupported_action",
			CoreError::SessionClosed => "session_closed",
			CoreError::InvalidAttachment(_) => "invalid_attachment",
			CoreError::Driver(_) => "driver_error",
			CoreError::AnalysisUnavailable(_) => "analysis_unavailable",
			CoreError::Json(_) => "internal_error",
			CoreError::Io(_) => "io_error",
		}
	}
}
