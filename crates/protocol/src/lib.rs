//! Wire types for the cobrowse session protocol.
//!
//! Everything in this crate crosses a process boundary: either the WebSocket
//! between clients and the server, or the export document handed to the
//! export sink. Serde attribute choices here define the JSON contract.

mod action;
mod export;
mod message;
mod recording;

pub use action::ActionPayload;
pub use export::{ExportDocument, SessionMeta, TestCase};
pub use message::{
	AnnotationPayload, ClientMessage, IssueAnalysis, ParticipantInfo, ServerEvent, SessionSnapshot,
};
pub use recording::{ActionRecord, Annotation, Comment, Recording};

use base64::Engine;

/// Encodes screenshot bytes for transport.
pub fn encode_screenshot(bytes: &[u8]) -> String {
	base64::prelude::BASE64_STANDARD.encode(bytes)
}

/// Decodes a transported screenshot back to raw bytes.
pub fn decode_screenshot(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
	base64::prelude::BASE64_STANDARD.decode(encoded)
}
