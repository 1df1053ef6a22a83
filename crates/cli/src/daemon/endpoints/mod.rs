//! Endpoint handlers, grouped the way the CLI groups its subcommands.

pub mod console;
pub mod content;
pub mod control;
pub mod download;
pub mod export;
pub mod interact;
pub mod navigation;
pub mod query;
pub mod scripting;
pub mod tabs;
pub mod waits;

use std::sync::Arc;

use chromiumoxide::Page;

use crate::browser::selector::{self, Selector};
use crate::daemon::Daemon;
use crate::daemon::router::{ApiError, ApiResult};

/// Reconcile the tab list, then hand back the active tab. An empty tab
/// list is a recoverable caller-visible condition, not a crash.
pub async fn active_page(daemon: &Arc<Daemon>) -> ApiResult<(Page, usize)> {
	daemon.sync_tabs().await?;
	let state = daemon.state.lock().await;
	state
		.active_tab()
		.ok_or_else(|| ApiError::bad_request("no open tabs"))
}

/// Classify a selector token against the current id→xpath map.
pub async fn classify(daemon: &Arc<Daemon>, token: &str) -> ApiResult<Selector> {
	if token.trim().is_empty() {
		return Err(ApiError::bad_request("selector must not be empty"));
	}
	let state = daemon.state.lock().await;
	selector::classify(token, state.id_xpath()).map_err(|err| ApiError::bad_request(err.message()))
}

/// Append a history entry for a completed side-effecting operation.
/// Selectors stay in their original agent form; secrets never pass
/// through here.
pub async fn record(daemon: &Arc<Daemon>, action: &str, args: serde_json::Value) {
	let mut state = daemon.state.lock().await;
	state.append_history(action, args);
}
