//! Filesystem export sink.

use std::path::PathBuf;

use async_trait::async_trait;
use cobrowse::error::Result;
use cobrowse::export::ExportSink;
use cobrowse_protocol::ExportDocument;
use tracing::info;

/// Writes one JSON document per closed session under the export directory.
pub struct FsExportSink {
	dir: PathBuf,
}

impl FsExportSink {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}
}

#[async_trait]
impl ExportSink for FsExportSink {
	async fn write(&self, session_id: &str, document: &ExportDocument) -> Result<()> {
		tokio::fs::create_dir_all(&self.dir).await?;
		let path = self.dir.join(format!("{session_id}.json"));
		let json = serde_json::to_vec_pretty(document)?;
		tokio::fs::write(&path, json).await?;
		info!(
			target = "cobrowse.export",
			session = session_id,
			path = %path.display(),
			cases = document.test_cases.len(),
			"session exported"
		);
		Ok(())
	}
}
