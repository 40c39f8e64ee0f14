//! Export collaborator trait.

use async_trait::async_trait;
use cobrowse_protocol::ExportDocument;

use crate::error::Result;

/// Destination for a closed session's export document.
///
/// Fire-and-forget from the coordinator's perspective, but [`write`] is
/// awaited before the session is removed from the store, so a sink may rely
/// on the session ID still resolving while it runs.
///
/// [`write`]: ExportSink::write
#[async_trait]
pub trait ExportSink: Send + Sync {
	async fn write(&self, session_id: &str, document: &ExportDocument) -> Result<()>;
}
