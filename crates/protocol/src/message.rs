use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::ActionPayload;
use crate::recording::{ActionRecord, Annotation, Comment, Recording};

/// A participant as seen by other clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
	pub user_id: String,
	pub display_name: String,
}

/// Current session state returned to a joining participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	pub session_id: String,
	pub name: String,
	/// Current page URL, if any navigation happened yet.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Fresh base64 screenshot of the current page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub screenshot: Option<String>,
	pub participants: Vec<ParticipantInfo>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub controller: Option<String>,
	pub recording: Recording,
}

/// Annotation body as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPayload {
	#[serde(rename = "type")]
	pub kind: String,
	pub payload: Value,
}

/// Result of the best-effort AI issue analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAnalysis {
	pub is_bug: bool,
	pub analysis: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub suggested_test_case: Option<Value>,
}

/// Inbound messages, client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
	#[serde(rename_all = "camelCase")]
	CreateSession {
		name: String,
		user_id: String,
		user_name: String,
	},
	#[serde(rename_all = "camelCase")]
	JoinSession {
		session_id: String,
		user_id: String,
		user_name: String,
	},
	#[serde(rename_all = "camelCase")]
	Action {
		action: ActionPayload,
		#[serde(default)]
		force_control: bool,
	},
	Annotation {
		annotation: AnnotationPayload,
	},
	#[serde(rename_all = "camelCase")]
	Comment {
		text: String,
		#[serde(default)]
		attached_to: Option<String>,
		#[serde(default)]
		is_issue: bool,
	},
	RequestControl,
}

/// Outbound events, server to client.
///
/// For a given session every participant observes these in the same relative
/// order; the session actor is the single emitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
	#[serde(rename_all = "camelCase")]
	SessionCreated {
		session_id: String,
		snapshot: SessionSnapshot,
	},
	SessionJoined {
		snapshot: SessionSnapshot,
	},
	UserJoined {
		participant: ParticipantInfo,
	},
	#[serde(rename_all = "camelCase")]
	UserLeft {
		user_id: String,
	},
	ActionPerformed {
		record: ActionRecord,
		screenshot: String,
	},
	AnnotationAdded {
		annotation: Annotation,
	},
	CommentAdded {
		comment: Comment,
	},
	ControlRequested {
		requester: ParticipantInfo,
	},
	#[serde(rename_all = "camelCase")]
	ControlChanged {
		new_controller: Option<String>,
	},
	#[serde(rename_all = "camelCase")]
	BugDetected {
		comment_id: String,
		analysis: IssueAnalysis,
	},
	PageConsole {
		payload: Value,
	},
	PageNetwork {
		payload: Value,
	},
	PageError {
		payload: Value,
	},
	Error {
		code: String,
		message: String,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn client_message_tags_are_kebab_case() {
		let msg: ClientMessage = serde_json::from_str(
			r#"{"type":"create-session","name":"demo","userId":"u1","userName":"Ada"}"#,
		)
		.unwrap();
		match msg {
			ClientMessage::CreateSession { name, user_id, .. } => {
				assert_eq!(name, "demo");
				assert_eq!(user_id, "u1");
			}
			other => panic!("unexpected message: {other:?}"),
		}
	}

	#[test]
	fn action_message_defaults_force_to_false() {
		let msg: ClientMessage =
			serde_json::from_str(r##"{"type":"action","action":{"type":"click","selector":"#x"}}"##)
				.unwrap();
		match msg {
			ClientMessage::Action { force_control, .. } => assert!(!force_control),
			other => panic!("unexpected message: {other:?}"),
		}
	}

	#[test]
	fn control_changed_serializes_new_controller() {
		let event = ServerEvent::ControlChanged {
			new_controller: Some("u2".into()),
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "control-changed");
		assert_eq!(json["newController"], "u2");
	}

	#[test]
	fn request_control_has_empty_payload() {
		let msg: ClientMessage = serde_json::from_str(r#"{"type":"request-control"}"#).unwrap();
		assert!(matches!(msg, ClientMessage::RequestControl));
	}
}
