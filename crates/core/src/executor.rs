//! Action execution against a session's page.
//!
//! Runs inside the session actor, so actions for one session are strictly
//! serialized; actions across sessions are independent. On success exactly
//! one ActionRecord and one screenshot are appended and `action-performed`
//! is broadcast; on any failure nothing is recorded.

use cobrowse_protocol::{ActionPayload, ServerEvent, encode_screenshot};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::session::SessionState;

pub(crate) async fn execute(
	state: &mut SessionState,
	performer: &str,
	action: &ActionPayload,
	force: bool,
) -> Result<()> {
	// `force` bypasses the controller check for this one action without
	// changing the controller. Administrative callers only.
	if !force && !state.arbiter.is_controller(performer) {
		return Err(CoreError::NotController(performer.to_string()));
	}

	apply(state, action).await?;
	let screenshot = encode_screenshot(&state.page.screenshot().await?);

	let record = state
		.recording
		.append_action(action, performer, screenshot.clone());
	debug!(
		target = "cobrowse.session",
		session = %state.session_id,
		kind = %action.kind,
		performer,
		"action recorded"
	);
	state.broadcast(ServerEvent::ActionPerformed { record, screenshot });

	// An acting controller is not unresponsive; outstanding control
	// requests against them are resolved.
	if state.arbiter.is_controller(performer) {
		state.arbiter.on_controller_action();
	}
	Ok(())
}

async fn apply(state: &mut SessionState, action: &ActionPayload) -> Result<()> {
	match action.kind.as_str() {
		"navigate" => {
			let url = required(action, action.url.as_deref(), "url")?;
			state.page.goto(url).await?;
			state.current_url = Some(url.to_string());
		}
		"click" => {
			let selector = required(action, action.selector.as_deref(), "selector")?;
			state.page.click(selector).await?;
		}
		"fill" => {
			let selector = required(action, action.selector.as_deref(), "selector")?;
			let value = required(action, action.value.as_deref(), "value")?;
			state.page.fill(selector, value).await?;
		}
		"select" => {
			let selector = required(action, action.selector.as_deref(), "selector")?;
			let value = required(action, action.value.as_deref(), "value")?;
			state.page.select_option(selector, value).await?;
		}
		// The post-action capture below is the screenshot.
		"screenshot" => {}
		"evaluate" => {
			let script = required(action, action.script.as_deref(), "script")?;
			state.page.evaluate(script).await?;
		}
		other => return Err(CoreError::UnsupportedAction(other.to_string())),
	}
	Ok(())
}

fn required<'a>(action: &ActionPayload, field: Option<&'a str>, name: &str) -> Result<&'a str> {
	field.ok_or_else(|| CoreError::UnsupportedAction(format!("{}: missing {name}", action.kind)))
}
