use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use br_protocol::{ExtractTextRequest, HtmlQuery, TextResult, TreeResponse};

use crate::browser::js;
use crate::browser::tree;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, classify};
use crate::daemon::router::{ApiError, ApiResult};

/// Match-list cap for `/extract-text`.
const EXTRACT_MAX_ELEMENTS: usize = 1000;

/// Wall-clock cap for `/extract-text`.
const EXTRACT_BUDGET: Duration = Duration::from_secs(5);

/// `GET /html` — page source with every secret masked. Plain text.
pub async fn html(State(daemon): State<Arc<Daemon>>, Query(query): Query<HtmlQuery>) -> ApiResult<Response> {
	let _gate = daemon.op_gate.lock().await;
	daemon.sync_tabs().await?;

	let page = {
		let state = daemon.state.lock().await;
		match query.page {
			Some(index) => state
				.tab_at(index)
				.ok_or_else(|| ApiError::bad_request(format!("tab index out of range: {index}")))?,
			None => state.active_tab().ok_or_else(|| ApiError::bad_request("no open tabs"))?.0,
		}
	};

	let value = daemon.driver.evaluate(&page, "document.documentElement.outerHTML").await?;
	let raw = value.as_str().unwrap_or_default().to_string();

	let masked = {
		let state = daemon.state.lock().await;
		state.mask_secrets(&raw)
	};

	Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], masked).into_response())
}

/// `GET /tree` — the joined accessibility/DOM view. Replaces the
/// id→xpath map as a side effect; numeric selector tokens resolve
/// against this snapshot until the next call.
pub async fn tree(State(daemon): State<Arc<Daemon>>) -> ApiResult<Json<TreeResponse>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let joined = tree::build(&daemon.driver, &page).await?;

	{
		let mut state = daemon.state.lock().await;
		state.replace_id_xpath_map(joined.id_xpath);
	}

	Ok(Json(TreeResponse { tree: joined.tree }))
}

/// `POST /extract-text` — visible text of the matched elements (or the
/// whole body). Caps at 1000 elements and 5 s wall time.
pub async fn extract_text(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<ExtractTextRequest>,
) -> ApiResult<Json<TextResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let sel = match &body.selector {
		Some(token) => Some(classify(&daemon, token).await?),
		None => None,
	};

	// Cap overruns are operational failures, not caller mistakes: the
	// request was well-formed, the page was just too big or too slow.
	let script = js::extract_text_js(sel.as_ref(), EXTRACT_MAX_ELEMENTS);
	let value = tokio::time::timeout(EXTRACT_BUDGET, daemon.driver.evaluate(&page, &script))
		.await
		.map_err(|_| ApiError::internal("text extraction exceeded the 5s budget"))??;

	let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
	if !ok {
		let count = value.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
		return Err(ApiError::internal(format!(
			"too many elements matched ({count}, cap {EXTRACT_MAX_ELEMENTS}); narrow the selector"
		)));
	}

	let text = value.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
	Ok(Json(TextResult { text }))
}
