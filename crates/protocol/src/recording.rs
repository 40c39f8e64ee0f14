use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One executed action in a session's recording.
///
/// Records are immutable once appended; their order in [`Recording::actions`]
/// is the execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Participant who performed the action.
	pub performed_by: String,
	/// Unix milliseconds.
	pub timestamp: u64,
	/// Index into [`Recording::screenshots`] for the post-action capture.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub screenshot: Option<usize>,
}

/// A participant-authored annotation (highlight, note, assertion, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub payload: Value,
	pub author: String,
	pub timestamp: u64,
}

/// A discussion comment, optionally attached to an action or annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	pub id: String,
	pub text: String,
	pub author: String,
	pub timestamp: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attached_to: Option<String>,
	#[serde(default)]
	pub is_issue: bool,
}

/// Append-only capture of everything that happened in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
	pub actions: Vec<ActionRecord>,
	/// Base64-encoded PNG captures, referenced by index from action records.
	pub screenshots: Vec<String>,
	pub annotations: Vec<Annotation>,
	pub comments: Vec<Comment>,
}

impl Recording {
	/// True when an action or annotation with `id` exists.
	pub fn contains_record(&self, id: &str) -> bool {
		self.actions.iter().any(|a| a.id == id) || self.annotations.iter().any(|a| a.id == id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn contains_record_checks_actions_and_annotations() {
		let mut recording = Recording::default();
		recording.actions.push(ActionRecord {
			id: "act-1".into(),
			kind: "click".into(),
			selector: Some("#go".into()),
			value: None,
			url: None,
			performed_by: "u1".into(),
			timestamp: 0,
			screenshot: None,
		});
		recording.annotations.push(Annotation {
			id: "ann-1".into(),
			kind: "note".into(),
			payload: serde_json::json!({"text": "hm"}),
			author: "u2".into(),
			timestamp: 1,
		});

		assert!(recording.contains_record("act-1"));
		assert!(recording.contains_record("ann-1"));
		assert!(!recording.contains_record("nope"));
	}

	#[test]
	fn action_record_serializes_camel_case() {
		let record = ActionRecord {
			id: "a".into(),
			kind: "fill".into(),
			selector: Some("#q".into()),
			value: Some("rust".into()),
			url: None,
			performed_by: "u1".into(),
			timestamp: 42,
			screenshot: Some(0),
		};
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["type"], "fill");
		assert_eq!(json["performedBy"], "u1");
		assert_eq!(json["screenshot"], 0);
	}
}
