use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cobrowsed")]
#[command(about = "Coordinator for collaborative shared-browser sessions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Address to listen on
	#[arg(long, default_value = "127.0.0.1")]
	pub host: String,

	/// Port for the client WebSocket endpoint
	#[arg(short, long, default_value_t = 8090)]
	pub port: u16,

	/// DevTools HTTP endpoint of a browser started with --remote-debugging-port
	#[arg(long, value_name = "URL", default_value = "http://127.0.0.1:9222")]
	pub cdp_endpoint: String,

	/// Directory session export documents are written to
	#[arg(long, value_name = "DIR", default_value = "exports")]
	pub export_dir: PathBuf,

	/// Base URL of the issue-analysis service; analysis is disabled when unset
	#[arg(long, value_name = "URL")]
	pub analysis_url: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_local() {
		let cli = Cli::parse_from(["cobrowsed"]);
		assert_eq!(cli.host, "127.0.0.1");
		assert_eq!(cli.port, 8090);
		assert!(cli.analysis_url.is_none());
	}

	#[test]
	fn verbosity_accumulates() {
		let cli = Cli::parse_from(["cobrowsed", "-vv"]);
		assert_eq!(cli.verbose, 2);
	}
}
