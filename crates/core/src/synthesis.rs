//! Batch synthesis of a finished recording into structured test cases.

use cobrowse_protocol::{ActionRecord, Recording, TestCase};

/// Annotation kind that becomes a test-case assertion.
const ASSERTION_KIND: &str = "assertion";

/// Annotations per case used by the position-based assertion bucketing.
const ASSERTION_BUCKET_SIZE: usize = 5;

/// Groups a recording into ordered test cases.
///
/// A `navigate` action starts a new case whenever the current case already
/// has at least one step; the first navigate never splits. Assertion
/// annotations are attached to case `annotation_index / 5`, a coarse
/// position-based bucketing that ignores actual case boundaries, clamped
/// to the last case.
pub fn synthesize(recording: &Recording) -> Vec<TestCase> {
	let mut cases: Vec<TestCase> = Vec::new();
	let mut current: Option<TestCase> = None;

	for action in &recording.actions {
		let should_split = action.kind == "navigate"
			&& current.as_ref().is_some_and(|case| !case.steps.is_empty());
		if should_split {
			cases.extend(current.take());
		}

		let case = current.get_or_insert_with(|| TestCase {
			name: format!("Test Case {}", cases.len() + 1),
			steps: Vec::new(),
			assertions: Vec::new(),
		});
		case.steps.push(describe(action));
	}

	if let Some(case) = current {
		cases.push(case);
	}

	if !cases.is_empty() {
		let last = cases.len() - 1;
		for (index, annotation) in recording.annotations.iter().enumerate() {
			if annotation.kind != ASSERTION_KIND {
				continue;
			}
			let bucket = (index / ASSERTION_BUCKET_SIZE).min(last);
			cases[bucket].assertions.push(annotation.payload.clone());
		}
	}

	cases
}

/// Human-readable step description derived from type and target/value.
fn describe(record: &ActionRecord) -> String {
	match record.kind.as_str() {
		"navigate" => format!("Navigate to {}", record.url.as_deref().unwrap_or("?")),
		"click" => format!("Click '{}'", record.selector.as_deref().unwrap_or("?")),
		"fill" => format!(
			"Fill '{}' with '{}'",
			record.selector.as_deref().unwrap_or("?"),
			record.value.as_deref().unwrap_or("")
		),
		"select" => format!(
			"Select '{}' in '{}'",
			record.value.as_deref().unwrap_or(""),
			record.selector.as_deref().unwrap_or("?")
		),
		"screenshot" => "Capture screenshot".to_string(),
		"evaluate" => "Evaluate script".to_string(),
		other => format!("Perform {other}"),
	}
}

#[cfg(test)]
mod tests {
	use cobrowse_protocol::Annotation;
	use serde_json::json;

	use super::*;

	fn action(kind: &str, selector: Option<&str>, value: Option<&str>, url: Option<&str>) -> ActionRecord {
		ActionRecord {
			id: format!("act-{kind}-{}", url.or(selector).unwrap_or("")),
			kind: kind.into(),
			selector: selector.map(Into::into),
			value: value.map(Into::into),
			url: url.map(Into::into),
			performed_by: "u1".into(),
			timestamp: 0,
			screenshot: None,
		}
	}

	fn assertion(index: usize) -> Annotation {
		Annotation {
			id: format!("ann-{index}"),
			kind: "assertion".into(),
			payload: json!({"expect": index}),
			author: "u1".into(),
			timestamp: 0,
		}
	}

	#[test]
	fn navigate_splits_cases_but_first_navigate_does_not() {
		let recording = Recording {
			actions: vec![
				action("navigate", None, None, Some("https://a.test")),
				action("click", Some("#x"), None, None),
				action("navigate", None, None, Some("https://b.test")),
				action("fill", Some("#y"), Some("v"), None),
			],
			..Default::default()
		};

		let cases = synthesize(&recording);
		assert_eq!(cases.len(), 2);
		assert_eq!(
			cases[0].steps,
			vec!["Navigate to https://a.test", "Click '#x'"]
		);
		assert_eq!(
			cases[1].steps,
			vec!["Navigate to https://b.test", "Fill '#y' with 'v'"]
		);
	}

	#[test]
	fn recording_without_navigate_yields_one_case() {
		let recording = Recording {
			actions: vec![
				action("click", Some("#a"), None, None),
				action("click", Some("#b"), None, None),
			],
			..Default::default()
		};

		let cases = synthesize(&recording);
		assert_eq!(cases.len(), 1);
		assert_eq!(cases[0].name, "Test Case 1");
		assert_eq!(cases[0].steps.len(), 2);
	}

	#[test]
	fn empty_recording_yields_no_cases() {
		assert!(synthesize(&Recording::default()).is_empty());
	}

	#[test]
	fn assertions_bucket_by_annotation_index() {
		let mut recording = Recording {
			actions: vec![
				action("navigate", None, None, Some("https://a.test")),
				action("click", Some("#x"), None, None),
				action("navigate", None, None, Some("https://b.test")),
			],
			..Default::default()
		};
		// Seven annotations: indexes 0-4 land in case 0, 5-6 in case 1.
		for index in 0..7 {
			recording.annotations.push(assertion(index));
		}

		let cases = synthesize(&recording);
		assert_eq!(cases[0].assertions.len(), 5);
		assert_eq!(cases[1].assertions.len(), 2);
	}

	#[test]
	fn assertion_bucket_clamps_to_last_case() {
		let mut recording = Recording {
			actions: vec![action("click", Some("#only"), None, None)],
			..Default::default()
		};
		for index in 0..12 {
			recording.annotations.push(assertion(index));
		}

		let cases = synthesize(&recording);
		assert_eq!(cases.len(), 1);
		assert_eq!(cases[0].assertions.len(), 12);
	}

	#[test]
	fn non_assertion_annotations_are_ignored_but_keep_their_index() {
		let mut recording = Recording {
			actions: vec![
				action("navigate", None, None, Some("https://a.test")),
				action("navigate", None, None, Some("https://b.test")),
			],
			..Default::default()
		};
		// Five notes shift the first assertion's index past the first bucket.
		for index in 0..5 {
			let mut note = assertion(index);
			note.kind = "note".into();
			recording.annotations.push(note);
		}
		recording.annotations.push(assertion(5));

		let cases = synthesize(&recording);
		assert_eq!(cases.len(), 2);
		assert!(cases[0].assertions.is_empty());
		assert_eq!(cases[1].assertions.len(), 1);
	}
}
