use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use br_protocol::{Ack, WaitRequest};

use crate::browser::driver::{NAV_TIMEOUT_MS, truthy};
use crate::browser::js;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, classify};
use crate::daemon::router::{ApiError, ApiResult};

/// Quiet window for DOM-stable and network-idle detection.
const QUIET_MS: u64 = 500;

/// `POST /wait` — visible-state wait on a selector, default 30 s.
pub async fn wait_selector(State(daemon): State<Arc<Daemon>>, Json(body): Json<WaitRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let timeout_ms = body.timeout.unwrap_or(NAV_TIMEOUT_MS);
	daemon.driver.poll_until(&page, &js::visible_js(&sel), timeout_ms).await?;
	Ok(Json(Ack::ok()))
}

/// `POST /wait-load`
pub async fn wait_load(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	daemon.driver.poll_until(&page, js::LOAD_COMPLETE_JS, NAV_TIMEOUT_MS).await?;
	Ok(Json(Ack::ok()))
}

/// `POST /wait-stable` — MutationObserver quiet window, capped by a
/// safety timeout. Hitting the cap is reported as `ok: false`, not an
/// error: the cap is a valve, not a failure.
pub async fn wait_stable(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	in_page_wait(daemon, js::dom_stable_js(QUIET_MS, NAV_TIMEOUT_MS)).await
}

/// `POST /wait-idle` — network-idle approximation, same cap semantics.
pub async fn wait_idle(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	in_page_wait(daemon, js::network_idle_js(QUIET_MS, NAV_TIMEOUT_MS)).await
}

async fn in_page_wait(daemon: Arc<Daemon>, script: String) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	// The promise resolves itself at the cap; the outer timeout only
	// guards against the page never answering at all.
	let budget = Duration::from_millis(NAV_TIMEOUT_MS + 5_000);
	let value = tokio::time::timeout(budget, daemon.driver.evaluate(&page, &script))
		.await
		.map_err(|_| ApiError::internal("wait did not settle"))??;

	Ok(Json(Ack { ok: truthy(&value) }))
}
