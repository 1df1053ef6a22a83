//! Request bodies and query strings accepted by the daemon.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `POST /tabs/switch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchTabRequest {
	/// 0-based position in the current tab list.
	pub index: usize,
}

/// `POST /goto`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotoRequest {
	pub url: String,
}

/// `POST /reload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadRequest {
	/// Hard reload: `Page.reload` with `ignoreCache: true`.
	#[serde(default)]
	pub hard: bool,
}

/// Body for every endpoint that takes a bare selector token
/// (`/click`, `/scroll-into-view`, `/exists`, `/visible`, `/count`, `/submit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorRequest {
	/// Agent selector token: numeric AX id, XPath, or CSS.
	pub selector: String,
}

/// `POST /scroll-to`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollToRequest {
	/// Scroll position as a percentage of `body.scrollHeight`, clamped to `[0, 100]`.
	pub percentage: f64,
}

/// `POST /fill`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRequest {
	pub selector: String,
	pub text: String,
}

/// `POST /fill-secret`
///
/// The secret joins the instance's mask set; it never appears in history
/// entries or `/html` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSecretRequest {
	pub selector: String,
	pub secret: String,
}

/// `POST /type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRequest {
	pub selector: String,
	pub text: String,
}

/// `POST /press`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressRequest {
	pub key: String,
}

/// `POST /fill-search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSearchRequest {
	pub query: String,
	/// Explicit target; when absent the daemon scans a fixed list of
	/// search-input candidates and uses the first that exists.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
}

/// `POST /select`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
	pub selector: String,
	pub value: String,
}

/// `POST /attr`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrRequest {
	pub selector: String,
	pub attribute: String,
}

/// `POST /wait`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitRequest {
	pub selector: String,
	/// Milliseconds; defaults to 30 000 when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout: Option<u64>,
}

/// `POST /extract-text`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractTextRequest {
	/// When absent, the whole `body` is extracted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
}

/// `POST /download`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
	pub selector: String,
	/// Target path; inferred from the URL when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output: Option<PathBuf>,
}

/// `POST /eval`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
	pub script: String,
}

/// `POST /assert`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertRequest {
	pub script: String,
	/// When supplied the assertion passes iff the stringified result is
	/// string-equal; otherwise it passes iff the result is truthy.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// Query string for `GET /html`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HtmlQuery {
	/// Tab index; defaults to the active tab.
	#[serde(default)]
	pub page: Option<usize>,
}

/// Query string for `GET /screenshot`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotQuery {
	#[serde(default)]
	pub full_page: Option<bool>,
	#[serde(default)]
	pub path: Option<PathBuf>,
}

/// Query string for `GET /pdf`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfQuery {
	/// Paper format name; defaults to `Letter`.
	#[serde(default)]
	pub format: Option<String>,
	#[serde(default)]
	pub path: Option<PathBuf>,
}

/// Query string for `GET /console`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleQuery {
	/// Comma-separated kind filter (`error,warning`).
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	/// Tab index filter.
	#[serde(default)]
	pub tab: Option<usize>,
	/// Clear matching entries after reading.
	#[serde(default)]
	pub clear: Option<bool>,
}
