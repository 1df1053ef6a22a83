//! HTTP surface.
//!
//! Every endpoint is synchronous from the caller's point of view: the
//! response is sent only after the operation completed or failed.
//! Status mapping: 200 success (including negative check results),
//! 400 plain text for caller errors (bad selector, missing element,
//! tab out of range), 500 plain text for driver failures.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::browser::driver::DriverError;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{console, content, control, download, export, interact, navigation, query, scripting, tabs, waits};

/// Endpoint failure with its wire status.
#[derive(Debug)]
pub enum ApiError {
	/// Caller error: 400 with a plain-text explanation.
	BadRequest(String),
	/// Operational failure: 500 with the driver message.
	Internal(String),
}

impl ApiError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		ApiError::BadRequest(message.into())
	}

	pub fn internal(message: impl Into<String>) -> Self {
		ApiError::Internal(message.into())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
			ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
		}
	}
}

impl From<DriverError> for ApiError {
	fn from(err: DriverError) -> Self {
		match err {
			DriverError::ElementNotFound(message) => ApiError::BadRequest(message),
			other => ApiError::Internal(other.to_string()),
		}
	}
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn build(daemon: Arc<Daemon>) -> Router {
	Router::new()
		.route("/health", get(control::health))
		.route("/shutdown", post(control::shutdown))
		.route("/tabs", get(tabs::list))
		.route("/tabs/switch", post(tabs::switch))
		.route("/goto", post(navigation::goto))
		.route("/back", post(navigation::back))
		.route("/forward", post(navigation::forward))
		.route("/reload", post(navigation::reload))
		.route("/clear-cache", post(navigation::clear_cache))
		.route("/scroll-into-view", post(interact::scroll_into_view))
		.route("/scroll-to", post(interact::scroll_to))
		.route("/next-chunk", post(interact::next_chunk))
		.route("/prev-chunk", post(interact::prev_chunk))
		.route("/fill", post(interact::fill))
		.route("/fill-secret", post(interact::fill_secret))
		.route("/type", post(interact::type_text))
		.route("/press", post(interact::press))
		.route("/click", post(interact::click))
		.route("/fill-search", post(interact::fill_search))
		.route("/select", post(interact::select_value))
		.route("/submit", post(interact::submit))
		.route("/exists", post(query::exists))
		.route("/visible", post(query::visible))
		.route("/count", post(query::count))
		.route("/attr", post(query::attr))
		.route("/wait", post(waits::wait_selector))
		.route("/wait-load", post(waits::wait_load))
		.route("/wait-stable", post(waits::wait_stable))
		.route("/wait-idle", post(waits::wait_idle))
		.route("/html", get(content::html))
		.route("/tree", get(content::tree))
		.route("/extract-text", post(content::extract_text))
		.route("/screenshot", get(export::screenshot))
		.route("/pdf", get(export::pdf))
		.route("/download", post(download::download))
		.route("/eval", post(scripting::eval))
		.route("/assert", post(scripting::assert_script))
		.route("/console", get(console::read))
		.route("/console/clear", post(console::clear))
		.route("/history", get(console::history))
		.route("/history/clear", post(console::history_clear))
		.with_state(daemon)
}
