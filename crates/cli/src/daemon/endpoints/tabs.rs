use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::{Ack, SwitchTabRequest, TabInfo};
use serde_json::json;

use crate::daemon::Daemon;
use crate::daemon::endpoints::record;
use crate::daemon::router::{ApiError, ApiResult};

/// `GET /tabs`
pub async fn list(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Vec<TabInfo>>> {
	daemon.sync_tabs().await?;

	let pages: Vec<_> = {
		let state = daemon.state.lock().await;
		state.tabs.iter().map(|tab| tab.page.clone()).collect()
	};

	let mut titles = Vec::with_capacity(pages.len());
	let mut urls = Vec::with_capacity(pages.len());
	for (index, page) in pages.iter().enumerate() {
		let url = page.url().await.ok().flatten().unwrap_or_default();
		let title = page.get_title().await.ok().flatten().unwrap_or_default();
		daemon.note_tab_url(index, url.clone()).await;
		titles.push(title);
		urls.push(url);
	}

	let state = daemon.state.lock().await;
	Ok(Json(state.tab_infos(&titles, &urls)))
}

/// `POST /tabs/switch`
pub async fn switch(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<SwitchTabRequest>,
) -> ApiResult<Json<Ack>> {
	daemon.sync_tabs().await?;

	let switched = {
		let mut state = daemon.state.lock().await;
		state.set_active_tab(body.index)
	};
	if !switched {
		return Err(ApiError::bad_request(format!("tab index out of range: {}", body.index)));
	}

	record(&daemon, "tabs/switch", json!({ "index": body.index })).await;
	Ok(Json(Ack::ok()))
}
