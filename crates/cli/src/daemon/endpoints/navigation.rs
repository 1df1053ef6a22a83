use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::{Ack, GotoRequest, ReloadRequest, UrlResponse};
use serde_json::json;

use crate::browser::driver::NAV_TIMEOUT_MS;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, record};
use crate::daemon::router::ApiResult;
use crate::daemon::state::maybe_delay;

/// Human-like bracket around navigations, in milliseconds.
const NAV_DELAY: (u64, u64) = (250, 1200);

/// `POST /goto`
pub async fn goto(State(daemon): State<Arc<Daemon>>, Json(body): Json<GotoRequest>) -> ApiResult<Json<UrlResponse>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, index) = active_page(&daemon).await?;

	maybe_delay(daemon.config.humanlike, NAV_DELAY.0, NAV_DELAY.1).await;
	daemon.driver.goto(&page, &body.url, NAV_TIMEOUT_MS).await?;
	maybe_delay(daemon.config.humanlike, NAV_DELAY.0, NAV_DELAY.1).await;

	let url = page.url().await.ok().flatten().unwrap_or_else(|| body.url.clone());
	daemon.note_tab_url(index, url.clone()).await;

	// Console output from the previous document is no longer relevant.
	{
		let mut state = daemon.state.lock().await;
		state.drop_console_for_tab(index);
	}

	record(&daemon, "goto", json!({ "url": body.url })).await;
	Ok(Json(UrlResponse { url }))
}

/// `POST /back`
pub async fn back(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<UrlResponse>> {
	history_move(daemon, -1, "back").await
}

/// `POST /forward`
pub async fn forward(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<UrlResponse>> {
	history_move(daemon, 1, "forward").await
}

async fn history_move(daemon: Arc<Daemon>, delta: i64, action: &str) -> ApiResult<Json<UrlResponse>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, index) = active_page(&daemon).await?;

	daemon.driver.history_move(&page, delta).await?;

	let url = page.url().await.ok().flatten().unwrap_or_default();
	daemon.note_tab_url(index, url.clone()).await;
	record(&daemon, action, json!({})).await;
	Ok(Json(UrlResponse { url }))
}

/// `POST /reload`
pub async fn reload(State(daemon): State<Arc<Daemon>>, Json(body): Json<ReloadRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	daemon.driver.reload(&page, body.hard).await?;

	record(&daemon, "reload", json!({ "hard": body.hard })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /clear-cache`
pub async fn clear_cache(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	daemon.driver.clear_cache(&page).await?;

	record(&daemon, "clear-cache", json!({})).await;
	Ok(Json(Ack::ok()))
}
