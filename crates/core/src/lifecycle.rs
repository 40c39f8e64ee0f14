//! Session close: synthesize, export, tear down.

use cobrowse_protocol::{ExportDocument, SessionMeta};
use tracing::{error, info};

use crate::ids;
use crate::session::{SessionDeps, SessionState};
use crate::synthesis;

/// Session lifecycle phases.
///
/// `Active -> Closing` fires exactly once, triggered only by the participant
/// set becoming empty; the session actor processes messages serially and
/// stops consuming its queue after the transition, so no second trigger can
/// ever be observed. `Closing` and `Closed` sessions reject every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
	Active,
	Closing,
	Closed,
}

/// Runs the close sequence for an emptied session.
///
/// Export is written before the session leaves the store, so the sink can
/// still resolve the session ID. Export failure is logged and teardown
/// continues; a session is never left half-closed.
pub(crate) async fn close(state: &mut SessionState, deps: &SessionDeps) {
	state.phase = LifecyclePhase::Closing;
	info!(
		target = "cobrowse.session",
		session = %state.session_id,
		actions = state.recording.recording().actions.len(),
		"last participant left; closing session"
	);

	let recording = state.recording.snapshot();
	let test_cases = synthesis::synthesize(&recording);
	let document = ExportDocument {
		meta: SessionMeta {
			session_id: state.session_id.clone(),
			name: state.name.clone(),
			created_at: state.created_at,
			closed_at: ids::now_ms(),
			participants: state.roster.clone(),
		},
		recording,
		test_cases,
	};

	if let Err(err) = deps.export.write(&state.session_id, &document).await {
		error!(
			target = "cobrowse.export",
			session = %state.session_id,
			error = %err,
			"export failed; tearing session down anyway"
		);
	}

	state.arbiter.cancel_all();
	state.page.close().await;
	deps.store.remove(&state.session_id);
	state.phase = LifecyclePhase::Closed;
	info!(
		target = "cobrowse.session",
		session = %state.session_id,
		"session closed"
	);
}
