use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use br_protocol::{Ack, ConsoleEntry, ConsoleKind, ConsoleQuery, HistoryEntry};

use crate::daemon::Daemon;
use crate::daemon::router::{ApiError, ApiResult};

/// `GET /console` — filtered view of the ring, optionally clearing the
/// entries it returned.
pub async fn read(
	State(daemon): State<Arc<Daemon>>,
	Query(query): Query<ConsoleQuery>,
) -> ApiResult<Json<Vec<ConsoleEntry>>> {
	let kinds = match &query.kind {
		Some(csv) => Some(parse_kinds(csv)?),
		None => None,
	};

	let mut state = daemon.state.lock().await;
	let entries: Vec<ConsoleEntry> = state
		.console()
		.filter(|entry| kinds.as_ref().is_none_or(|ks| ks.contains(&entry.kind)))
		.filter(|entry| query.tab.is_none_or(|tab| entry.tab == tab))
		.cloned()
		.collect();

	if query.clear.unwrap_or(false) {
		state.drop_console_matching(kinds.as_deref(), query.tab);
	}

	Ok(Json(entries))
}

/// `POST /console/clear`
pub async fn clear(State(daemon): State<Arc<Daemon>>) -> Json<Ack> {
	let mut state = daemon.state.lock().await;
	state.clear_console();
	Json(Ack::ok())
}

/// `GET /history`
pub async fn history(State(daemon): State<Arc<Daemon>>) -> Json<Vec<HistoryEntry>> {
	let state = daemon.state.lock().await;
	Json(state.history().to_vec())
}

/// `POST /history/clear`
pub async fn history_clear(State(daemon): State<Arc<Daemon>>) -> Json<Ack> {
	let mut state = daemon.state.lock().await;
	state.clear_history();
	Json(Ack::ok())
}

fn parse_kinds(csv: &str) -> ApiResult<Vec<ConsoleKind>> {
	csv.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| s.parse::<ConsoleKind>().map_err(ApiError::bad_request))
		.collect()
}
