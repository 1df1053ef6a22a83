use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::{
	Ack, FillRequest, FillSearchRequest, FillSecretRequest, MatchedSelector, PressRequest, ScrollToRequest,
	SelectRequest, SelectorRequest, TypeRequest, ValueResult,
};
use serde_json::json;

use crate::browser::driver::truthy;
use crate::browser::js;
use crate::browser::selector::{self, Selector};
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, classify, record};
use crate::daemon::router::{ApiError, ApiResult};
use crate::daemon::state::maybe_delay;

/// Lead-in before a human-like click, in milliseconds.
const CLICK_DELAY: (u64, u64) = (120, 450);

/// Per-character pause for human-like typing, in milliseconds.
const TYPE_DELAY: (u64, u64) = (30, 80);

/// `POST /scroll-into-view`
pub async fn scroll_into_view(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<SelectorRequest>,
) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let scrolled = daemon.driver.evaluate(&page, &js::scroll_into_view_js(&sel)).await?;
	if !truthy(&scrolled) {
		return Err(ApiError::bad_request(selector::not_found_message(&body.selector)));
	}

	record(&daemon, "scroll-into-view", json!({ "selector": body.selector })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /scroll-to`
pub async fn scroll_to(State(daemon): State<Arc<Daemon>>, Json(body): Json<ScrollToRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let pct = body.percentage.clamp(0.0, 100.0);
	daemon.driver.evaluate(&page, &js::scroll_to_js(pct)).await?;

	record(&daemon, "scroll-to", json!({ "percentage": pct })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /next-chunk`
pub async fn next_chunk(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	scroll_chunk(daemon, 1, "next-chunk").await
}

/// `POST /prev-chunk`
pub async fn prev_chunk(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<Ack>> {
	scroll_chunk(daemon, -1, "prev-chunk").await
}

async fn scroll_chunk(daemon: Arc<Daemon>, delta: i32, action: &str) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	daemon.driver.evaluate(&page, &js::scroll_chunk_js(delta)).await?;

	record(&daemon, action, json!({})).await;
	Ok(Json(Ack::ok()))
}

/// `POST /fill`
pub async fn fill(State(daemon): State<Arc<Daemon>>, Json(body): Json<FillRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	daemon.driver.fill(&page, node, &body.text).await?;

	record(&daemon, "fill", json!({ "selector": body.selector, "text": body.text })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /fill-secret` — like `/fill`, but the value joins the mask set
/// and stays out of the history entry.
pub async fn fill_secret(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<FillSecretRequest>,
) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	daemon.driver.fill(&page, node, &body.secret).await?;

	{
		let mut state = daemon.state.lock().await;
		state.add_secret(body.secret);
	}

	record(&daemon, "fill-secret", json!({ "selector": body.selector })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /type`
pub async fn type_text(State(daemon): State<Arc<Daemon>>, Json(body): Json<TypeRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	let pacing = daemon.config.humanlike.then_some(TYPE_DELAY);
	daemon.driver.type_text(&page, node, &body.text, pacing).await?;

	record(&daemon, "type", json!({ "selector": body.selector, "text": body.text })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /press`
pub async fn press(State(daemon): State<Arc<Daemon>>, Json(body): Json<PressRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	daemon.driver.press(&page, &body.key).await?;

	record(&daemon, "press", json!({ "key": body.key })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /click`
pub async fn click(State(daemon): State<Arc<Daemon>>, Json(body): Json<SelectorRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	maybe_delay(daemon.config.humanlike, CLICK_DELAY.0, CLICK_DELAY.1).await;
	daemon.driver.click(&page, node).await?;

	record(&daemon, "click", json!({ "selector": body.selector })).await;
	Ok(Json(Ack::ok()))
}

/// `POST /fill-search` — fill an explicit or discovered search input,
/// then submit with Enter. Returns the selector that was used.
pub async fn fill_search(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<FillSearchRequest>,
) -> ApiResult<Json<MatchedSelector>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let (token, sel) = match &body.selector {
		Some(token) => (token.clone(), classify(&daemon, token).await?),
		None => {
			let found = daemon.driver.evaluate(&page, &js::search_scan_js()).await?;
			let Some(candidate) = found.as_str().map(str::to_string) else {
				return Err(ApiError::bad_request("no search input found on this page"));
			};
			(candidate.clone(), Selector::Css(candidate))
		}
	};

	let node = daemon.driver.resolve_node(&page, &sel, &token).await?;
	daemon.driver.fill(&page, node, &body.query).await?;
	daemon.driver.press(&page, "Enter").await?;

	record(&daemon, "fill-search", json!({ "selector": token, "query": body.query })).await;
	Ok(Json(MatchedSelector { selector: token }))
}

/// `POST /select`
pub async fn select_value(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<SelectRequest>,
) -> ApiResult<Json<ValueResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	let value = daemon
		.driver
		.call_on_node(&page, node, js::on_element::SELECT_VALUE, Some(body.value.clone().into()))
		.await?;

	record(&daemon, "select", json!({ "selector": body.selector, "value": body.value })).await;
	Ok(Json(ValueResult {
		value: value.as_str().map(str::to_string).unwrap_or(body.value),
	}))
}

/// `POST /submit`
pub async fn submit(State(daemon): State<Arc<Daemon>>, Json(body): Json<SelectorRequest>) -> ApiResult<Json<Ack>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let node = daemon.driver.resolve_node(&page, &sel, &body.selector).await?;
	let submitted = daemon.driver.call_on_node(&page, node, js::on_element::SUBMIT_FORM, None).await?;
	if !truthy(&submitted) {
		return Err(ApiError::bad_request(format!("no enclosing form for selector: {}", body.selector)));
	}

	record(&daemon, "submit", json!({ "selector": body.selector })).await;
	Ok(Json(Ack::ok()))
}
