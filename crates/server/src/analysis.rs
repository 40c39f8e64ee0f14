//! Issue-analysis service client.

use async_trait::async_trait;
use cobrowse::analysis::IssueAnalyzer;
use cobrowse::error::{CoreError, Result};
use cobrowse_protocol::IssueAnalysis;
use serde_json::{Value, json};
use tracing::debug;

/// Talks to the external analysis service over HTTP.
pub struct HttpAnalyzer {
	base: String,
	client: reqwest::Client,
}

impl HttpAnalyzer {
	pub fn new(base: &str) -> Self {
		Self {
			base: base.trim_end_matches('/').to_string(),
			client: reqwest::Client::new(),
		}
	}
}

#[async_trait]
impl IssueAnalyzer for HttpAnalyzer {
	async fn analyze(
		&self,
		text: &str,
		screenshot: Option<&str>,
		session_id: &str,
	) -> Result<IssueAnalysis> {
		let body = json!({
			"comment": text,
			"screenshot": screenshot.unwrap_or(""),
		});
		let response: Value = self
			.client
			.post(format!("{}/analyze/issue", self.base))
			.json(&body)
			.send()
			.await
			.map_err(service_err)?
			.error_for_status()
			.map_err(service_err)?
			.json()
			.await
			.map_err(service_err)?;

		let verdict = parse_verdict(&response);
		debug!(
			target = "cobrowse.analysis",
			session = session_id,
			is_bug = verdict.is_bug,
			"issue analysis returned"
		);
		Ok(verdict)
	}
}

fn parse_verdict(response: &Value) -> IssueAnalysis {
	let is_bug = response
		.get("isBug")
		.and_then(Value::as_bool)
		.unwrap_or(false);
	let severity = response
		.get("severity")
		.and_then(Value::as_str)
		.unwrap_or("unknown");
	let category = response
		.get("category")
		.and_then(Value::as_str)
		.unwrap_or("unknown");
	IssueAnalysis {
		is_bug,
		analysis: format!("{severity} severity, {category}"),
		suggested_test_case: response.get("testCase").cloned(),
	}
}

fn service_err(err: reqwest::Error) -> CoreError {
	CoreError::AnalysisUnavailable(err.to_string())
}

/// Stand-in when no analysis service is configured; never flags a bug.
pub struct NoopAnalyzer;

#[async_trait]
impl IssueAnalyzer for NoopAnalyzer {
	async fn analyze(
		&self,
		_text: &str,
		_screenshot: Option<&str>,
		_session_id: &str,
	) -> Result<IssueAnalysis> {
		Ok(IssueAnalysis {
			is_bug: false,
			analysis: "analysis disabled".to_string(),
			suggested_test_case: None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verdict_is_parsed_from_service_fields() {
		let verdict = parse_verdict(&json!({
			"isBug": true,
			"severity": "high",
			"category": "functional",
			"testCase": {"name": "Verify reported issue is fixed"}
		}));
		assert!(verdict.is_bug);
		assert_eq!(verdict.analysis, "high severity, functional");
		assert!(verdict.suggested_test_case.is_some());
	}

	#[test]
	fn missing_fields_default_to_not_a_bug() {
		let verdict = parse_verdict(&json!({}));
		assert!(!verdict.is_bug);
		assert!(verdict.suggested_test_case.is_none());
	}

	#[tokio::test]
	async fn noop_analyzer_never_flags() {
		let verdict = NoopAnalyzer
			.analyze("everything is broken", None, "s1")
			.await
			.unwrap();
		assert!(!verdict.is_bug);
	}
}
