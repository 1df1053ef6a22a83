use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::{AttrRequest, BoolResult, CountResult, SelectorRequest, ValueResult};

use crate::browser::driver::truthy;
use crate::browser::js;
use crate::browser::selector;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, classify};
use crate::daemon::router::{ApiError, ApiResult};

/// `POST /exists` — negative results are 200 with `result: false`; the
/// CLI maps them to exit 1.
pub async fn exists(State(daemon): State<Arc<Daemon>>, Json(body): Json<SelectorRequest>) -> ApiResult<Json<BoolResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let value = daemon.driver.evaluate(&page, &js::exists_js(&sel)).await?;
	Ok(Json(BoolResult { result: truthy(&value) }))
}

/// `POST /visible`
pub async fn visible(State(daemon): State<Arc<Daemon>>, Json(body): Json<SelectorRequest>) -> ApiResult<Json<BoolResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let value = daemon.driver.evaluate(&page, &js::visible_js(&sel)).await?;
	Ok(Json(BoolResult { result: truthy(&value) }))
}

/// `POST /count`
pub async fn count(State(daemon): State<Arc<Daemon>>, Json(body): Json<SelectorRequest>) -> ApiResult<Json<CountResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let value = daemon.driver.evaluate(&page, &js::count_js(&sel)).await?;
	let count = value.as_u64().unwrap_or(0) as usize;
	Ok(Json(CountResult { count }))
}

/// `POST /attr` — 400 when the element is missing and 400 when the
/// attribute is absent, with distinct messages.
pub async fn attr(State(daemon): State<Arc<Daemon>>, Json(body): Json<AttrRequest>) -> ApiResult<Json<ValueResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let value = daemon.driver.evaluate(&page, &js::attr_js(&sel, &body.attribute)).await?;

	let element_present = value.get("element").map(truthy).unwrap_or(false);
	if !element_present {
		return Err(ApiError::bad_request(selector::not_found_message(&body.selector)));
	}

	match value.get("value").and_then(|v| v.as_str()) {
		Some(attr_value) => Ok(Json(ValueResult {
			value: attr_value.to_string(),
		})),
		None => Err(ApiError::bad_request(format!(
			"attribute '{}' not present on element: {}",
			body.attribute, body.selector
		))),
	}
}
