use std::sync::Arc;

use clap::Parser;
use cobrowse::Coordinator;
use cobrowse::analysis::IssueAnalyzer;
use tracing::info;

mod analysis;
mod cdp;
mod cli;
mod export;
mod logging;
mod ws;

use crate::analysis::{HttpAnalyzer, NoopAnalyzer};
use crate::cdp::CdpBrowser;
use crate::cli::Cli;
use crate::export::FsExportSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let analyzer: Arc<dyn IssueAnalyzer> = match &cli.analysis_url {
		Some(url) => Arc::new(HttpAnalyzer::new(url)),
		None => {
			info!(
				target = "cobrowse.analysis",
				"no analysis service configured; issue comments are stored without analysis"
			);
			Arc::new(NoopAnalyzer)
		}
	};

	let coordinator = Coordinator::new(
		Arc::new(CdpBrowser::new(&cli.cdp_endpoint)),
		Arc::new(FsExportSink::new(cli.export_dir)),
		analyzer,
	);

	ws::run_server(&cli.host, cli.port, coordinator).await
}
