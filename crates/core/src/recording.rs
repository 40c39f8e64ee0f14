//! Append-only recording buffers for one session.

use cobrowse_protocol::{ActionPayload, ActionRecord, Annotation, Comment, Recording};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::ids;

/// Owns a session's recording. Only the session actor mutates it, and only
/// by appending; records are immutable once stored.
#[derive(Debug, Default)]
pub struct RecordingStore {
	recording: Recording,
}

impl RecordingStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an executed action and its post-action screenshot, returning
	/// the stored record. Append order is execution order.
	pub fn append_action(
		&mut self,
		action: &ActionPayload,
		performed_by: &str,
		screenshot: String,
	) -> ActionRecord {
		self.recording.screenshots.push(screenshot);
		let record = ActionRecord {
			id: ids::token(),
			kind: action.kind.clone(),
			selector: action.selector.clone(),
			value: action.value.clone(),
			url: action.url.clone(),
			performed_by: performed_by.to_string(),
			timestamp: ids::now_ms(),
			screenshot: Some(self.recording.screenshots.len() - 1),
		};
		self.recording.actions.push(record.clone());
		record
	}

	pub fn append_annotation(&mut self, kind: &str, payload: Value, author: &str) -> Annotation {
		let annotation = Annotation {
			id: ids::token(),
			kind: kind.to_string(),
			payload,
			author: author.to_string(),
			timestamp: ids::now_ms(),
		};
		self.recording.annotations.push(annotation.clone());
		annotation
	}

	/// Appends a comment. `attached_to` must reference an existing action or
	/// annotation.
	pub fn append_comment(
		&mut self,
		text: &str,
		author: &str,
		attached_to: Option<String>,
		is_issue: bool,
	) -> Result<Comment> {
		if let Some(target) = &attached_to {
			if !self.recording.contains_record(target) {
				return Err(CoreError::InvalidAttachment(target.clone()));
			}
		}
		let comment = Comment {
			id: ids::token(),
			text: text.to_string(),
			author: author.to_string(),
			timestamp: ids::now_ms(),
			attached_to,
			is_issue,
		};
		self.recording.comments.push(comment.clone());
		Ok(comment)
	}

	/// Most recent screenshot, used as context for issue analysis.
	pub fn latest_screenshot(&self) -> Option<&str> {
		self.recording.screenshots.last().map(String::as_str)
	}

	pub fn recording(&self) -> &Recording {
		&self.recording
	}

	pub fn snapshot(&self) -> Recording {
		self.recording.clone()
	}
}
