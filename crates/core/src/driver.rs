//! Browser automation collaborator traits.
//!
//! The coordinator never talks to a browser directly; it drives one page per
//! session through [`PageDriver`] and opens pages through [`BrowserDriver`].
//! The page is exclusively owned by its session actor, so implementations do
//! not need internal synchronization across sessions.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Console, network, and error traffic observed on a page.
///
/// Payloads are forwarded verbatim to participants.
#[derive(Debug, Clone)]
pub enum PageEvent {
	Console(Value),
	Network(Value),
	PageError(Value),
}

/// One automated page belonging to one session.
#[async_trait]
pub trait PageDriver: Send {
	async fn goto(&mut self, url: &str) -> Result<()>;

	async fn click(&mut self, selector: &str) -> Result<()>;

	async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

	async fn select_option(&mut self, selector: &str, value: &str) -> Result<()>;

	/// Captures the current viewport as PNG bytes.
	async fn screenshot(&mut self) -> Result<Vec<u8>>;

	async fn evaluate(&mut self, script: &str) -> Result<Value>;

	/// Takes the page event stream. Yields `None` after the first call; the
	/// session actor is the only consumer.
	fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PageEvent>>;

	/// Releases the page. Close failures are logged by the caller, not
	/// propagated; teardown must finish regardless.
	async fn close(&mut self);
}

/// Factory for session pages.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
	/// Opens a fresh page for a new session.
	async fn open_page(&self) -> Result<Box<dyn PageDriver>>;
}
