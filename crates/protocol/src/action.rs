use serde::{Deserialize, Serialize};

/// A browser action submitted by the current controller.
///
/// `kind` is deliberately an open string rather than an enum: unknown kinds
/// must reach the executor so it can reject them with a structured error
/// instead of failing deserialization at the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
	/// Action kind: `navigate`, `click`, `fill`, `select`, `screenshot`, `evaluate`.
	#[serde(rename = "type")]
	pub kind: String,
	/// CSS selector for element actions.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
	/// Value for `fill` and `select`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	/// Target URL for `navigate`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// JavaScript source for `evaluate`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub script: Option<String>,
}
