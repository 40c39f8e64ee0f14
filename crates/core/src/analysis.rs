//! Issue-analysis collaborator trait.

use async_trait::async_trait;
use cobrowse_protocol::IssueAnalysis;

use crate::error::Result;

/// Best-effort AI classification of issue comments.
///
/// Failures never surface to any client: the session actor logs them and
/// simply emits no `bug-detected` event.
#[async_trait]
pub trait IssueAnalyzer: Send + Sync {
	async fn analyze(
		&self,
		text: &str,
		screenshot: Option<&str>,
		session_id: &str,
	) -> Result<IssueAnalysis>;
}
