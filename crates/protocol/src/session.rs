//! Response bodies and session state views.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Generic acknowledgement for side-effecting endpoints with no richer payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
	pub ok: bool,
}

impl Ack {
	pub fn ok() -> Self {
		Self { ok: true }
	}
}

/// One entry of `GET /tabs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
	/// 0-based position in insertion order.
	pub index: usize,
	pub title: String,
	pub url: String,
	pub is_active: bool,
}

/// `{url}` payload returned by navigation moves (`/goto`, `/back`, `/forward`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
	pub url: String,
}

/// `{result}` payload of `/exists` and `/visible`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolResult {
	pub result: bool,
}

/// `{count}` payload of `/count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResult {
	pub count: usize,
}

/// `{value}` payload of `/attr` and `/select`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResult {
	pub value: String,
}

/// `{selector}` payload of `/fill-search`: the candidate that matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedSelector {
	pub selector: String,
}

/// `{text}` payload of `/extract-text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResult {
	pub text: String,
}

/// `{result}` payload of `/eval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
	pub result: serde_json::Value,
}

/// Payload of `/assert`. Always served with status 200; the CLI maps
/// `pass = false` to exit code 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertOutcome {
	pub pass: bool,
	/// Stringified evaluation result (objects pretty-printed as JSON).
	pub actual: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// Payload of `/download`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
	pub path: PathBuf,
	/// Bytes written.
	pub size: u64,
	/// Fully resolved source URL.
	pub url: String,
}

/// Console entry kind. `pageerror` covers uncaught page exceptions;
/// the rest mirror the console API methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
	Log,
	Warning,
	Error,
	Info,
	Debug,
	Pageerror,
}

impl ConsoleKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ConsoleKind::Log => "log",
			ConsoleKind::Warning => "warning",
			ConsoleKind::Error => "error",
			ConsoleKind::Info => "info",
			ConsoleKind::Debug => "debug",
			ConsoleKind::Pageerror => "pageerror",
		}
	}
}

impl std::str::FromStr for ConsoleKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"log" => Ok(ConsoleKind::Log),
			"warning" | "warn" => Ok(ConsoleKind::Warning),
			"error" => Ok(ConsoleKind::Error),
			"info" => Ok(ConsoleKind::Info),
			"debug" => Ok(ConsoleKind::Debug),
			"pageerror" => Ok(ConsoleKind::Pageerror),
			other => Err(format!("unknown console kind: {other}")),
		}
	}
}

/// One captured console message or page error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
	#[serde(rename = "type")]
	pub kind: ConsoleKind,
	pub text: String,
	/// ISO-8601.
	pub timestamp: String,
	/// URL of the tab at capture time.
	pub url: String,
	/// 0-based index of the originating tab.
	pub tab: usize,
}

/// One action history entry. Selectors are recorded in their original
/// agent form so a transcript can be replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
	pub action: String,
	pub args: serde_json::Value,
	/// ISO-8601.
	pub timestamp: String,
}

/// One node of the joined accessibility/DOM tree returned by `GET /tree`.
///
/// `id` is the accessibility node id; it doubles as a selector token for
/// any interaction endpoint until the next tree view replaces the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
	pub id: u64,
	pub role: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Backing DOM tag wrapped in angle brackets (`"<button>"`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tag: Option<String>,
	/// Document-rooted XPath of the backing DOM element.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub xpath: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<TreeNode>,
}

/// Payload of `GET /tree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
	pub tree: TreeNode,
}
