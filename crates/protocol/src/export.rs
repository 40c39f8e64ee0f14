use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ParticipantInfo;
use crate::recording::Recording;

/// A replayable test case synthesized from a session recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
	pub name: String,
	/// Ordered human-readable step descriptions.
	pub steps: Vec<String>,
	/// Assertion annotation payloads attached to this case.
	pub assertions: Vec<Value>,
}

/// Session metadata carried in the export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
	pub session_id: String,
	pub name: String,
	pub created_at: u64,
	pub closed_at: u64,
	/// Everyone who participated at any point, in join order.
	pub participants: Vec<ParticipantInfo>,
}

/// The document handed to the export sink when a session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
	pub meta: SessionMeta,
	pub recording: Recording,
	pub test_cases: Vec<TestCase>,
}
