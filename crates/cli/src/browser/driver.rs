//! Thin capability layer over the CDP driver.
//!
//! Everything the daemon does to a page goes through here; nothing else
//! in the crate imports chromiumoxide. Element interaction runs through
//! CDP node ids so CSS and XPath selectors behave identically once
//! resolved: querySelector / performSearch to find the node,
//! scrollIntoViewIfNeeded + getBoxModel + dispatchMouseEvent to click,
//! focus + insertText to type, callFunctionOn for value setting.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::{
	DiscardSearchResultsParams, FocusParams, GetBoxModelParams, GetDocumentParams, GetSearchResultsParams, NodeId,
	PerformSearchParams, QuerySelectorParams, ResolveNodeParams, ScrollIntoViewIfNeededParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
	DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams,
	MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCacheParams;
use chromiumoxide::cdp::browser_protocol::page::{
	CaptureScreenshotFormat, GetNavigationHistoryParams, NavigateToHistoryEntryParams, PrintToPdfParams, ReloadParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{CallArgument, CallFunctionOnParams, EvaluateParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::browser::js;
use crate::browser::selector::{self, Selector};

/// Default ceiling for navigation and waits.
pub const NAV_TIMEOUT_MS: u64 = 30_000;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Driver failures, split so the router can map selector misses to the
/// 400 class and everything else to 500.
#[derive(Debug, Error)]
pub enum DriverError {
	#[error("{0}")]
	ElementNotFound(String),

	#[error("{0}")]
	Eval(String),

	#[error("timed out after {ms}ms waiting for {what}")]
	Timeout { ms: u64, what: String },

	#[error(transparent)]
	Cdp(#[from] chromiumoxide::error::CdpError),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl DriverError {
	fn not_found(token: &str) -> Self {
		DriverError::ElementNotFound(selector::not_found_message(token))
	}
}

/// Launch options computed by the supervisor.
#[derive(Debug, Clone)]
pub struct DriverConfig {
	pub headless: bool,
	pub viewport: (u32, u32),
	pub user_data_dir: PathBuf,
}

/// Owns the browser process and its CDP event pump. Dropping without
/// [`Driver::close`] leaves profile cleanup to the OS; the user-data
/// directory survives on purpose.
pub struct Driver {
	browser: Mutex<Browser>,
}

impl Driver {
	/// Launch a persistent context. The returned receiver flips to `true`
	/// when the CDP event pump ends, i.e. the browser went away.
	pub async fn launch(config: &DriverConfig) -> DriverResult<(Self, watch::Receiver<bool>)> {
		let (width, height) = config.viewport;
		let mut builder = BrowserConfig::builder()
			.no_sandbox()
			.arg("--disable-gpu")
			.user_data_dir(&config.user_data_dir)
			.window_size(width, height)
			.viewport(Viewport {
				width,
				height,
				device_scale_factor: Some(1.0),
				emulating_mobile: false,
				is_landscape: true,
				has_touch: false,
			});
		if config.headless {
			builder = builder.new_headless_mode();
		} else {
			builder = builder.with_head();
		}
		let browser_config = builder.build().map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?;

		let (browser, mut handler) = Browser::launch(browser_config).await?;

		let (gone_tx, gone_rx) = watch::channel(false);
		tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if let Err(err) = event {
					debug!(target = "br.driver", error = %err, "cdp handler error");
				}
			}
			let _ = gone_tx.send(true);
		});

		Ok((Self { browser: Mutex::new(browser) }, gone_rx))
	}

	pub async fn new_page(&self) -> DriverResult<Page> {
		let browser = self.browser.lock().await;
		Ok(browser.new_page("about:blank").await?)
	}

	pub async fn pages(&self) -> DriverResult<Vec<Page>> {
		let browser = self.browser.lock().await;
		Ok(browser.pages().await?)
	}

	pub async fn close(&self) {
		let mut browser = self.browser.lock().await;
		if let Err(err) = browser.close().await {
			warn!(target = "br.driver", error = %err, "error closing browser");
		}
		let _ = browser.wait().await;
	}

	/// Navigate and wait for `domcontentloaded`, bounded by `timeout_ms`.
	pub async fn goto(&self, page: &Page, url: &str, timeout_ms: u64) -> DriverResult<()> {
		let nav = async {
			page.goto(url).await?;
			self.poll_until(page, js::DOM_CONTENT_LOADED_JS, timeout_ms).await
		};
		match tokio::time::timeout(Duration::from_millis(timeout_ms), nav).await {
			Ok(result) => result,
			Err(_) => Err(DriverError::Timeout {
				ms: timeout_ms,
				what: format!("navigation to {url}"),
			}),
		}
	}

	/// Evaluate an expression, awaiting promises, returning the value.
	pub async fn evaluate(&self, page: &Page, script: &str) -> DriverResult<serde_json::Value> {
		let params = EvaluateParams::builder()
			.expression(script)
			.await_promise(true)
			.return_by_value(true)
			.build()
			.map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?;
		let result = page.evaluate(params).await.map_err(|e| DriverError::Eval(e.to_string()))?;
		Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
	}

	/// Resolve a classified selector to a DOM node id.
	pub async fn resolve_node(&self, page: &Page, sel: &Selector, token: &str) -> DriverResult<NodeId> {
		// getDocument also (re)enables the DOM agent, which performSearch needs.
		let doc = page.execute(GetDocumentParams::default()).await?;

		if sel.is_xpath() {
			let search = page.execute(PerformSearchParams::new(sel.query())).await?;
			let search_id = search.result.search_id.clone();
			if search.result.result_count < 1 {
				let _ = page.execute(DiscardSearchResultsParams::new(search_id)).await;
				return Err(DriverError::not_found(token));
			}
			let results = page.execute(GetSearchResultsParams::new(search_id.clone(), 0, 1)).await?;
			let _ = page.execute(DiscardSearchResultsParams::new(search_id)).await;
			results
				.result
				.node_ids
				.first()
				.cloned()
				.ok_or_else(|| DriverError::not_found(token))
		} else {
			let found = page.execute(QuerySelectorParams::new(doc.result.root.node_id, sel.query())).await?;
			let node_id = found.result.node_id;
			if *node_id.inner() == 0 {
				return Err(DriverError::not_found(token));
			}
			Ok(node_id)
		}
	}

	/// Scroll the node into view and click its content-box center with a
	/// real mouse event sequence.
	pub async fn click(&self, page: &Page, node_id: NodeId) -> DriverResult<()> {
		page.execute(ScrollIntoViewIfNeededParams::builder().node_id(node_id.clone()).build()).await?;

		let boxed = page.execute(GetBoxModelParams::builder().node_id(node_id).build()).await?;
		let quad = boxed.result.model.content.inner().clone();
		if quad.len() < 8 {
			return Err(DriverError::Other(anyhow::anyhow!("degenerate box model")));
		}
		let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
		let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;

		self.dispatch_mouse(page, DispatchMouseEventType::MouseMoved, x, y, 0).await?;
		self.dispatch_mouse(page, DispatchMouseEventType::MousePressed, x, y, 1).await?;
		self.dispatch_mouse(page, DispatchMouseEventType::MouseReleased, x, y, 1).await?;
		Ok(())
	}

	async fn dispatch_mouse(
		&self,
		page: &Page,
		kind: DispatchMouseEventType,
		x: f64,
		y: f64,
		click_count: i64,
	) -> DriverResult<()> {
		let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
		if click_count > 0 {
			builder = builder.button(MouseButton::Left).click_count(click_count);
		}
		let params = builder.build().map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?;
		page.execute(params).await?;
		Ok(())
	}

	/// Set a value through the native setter plus input/change events so
	/// framework-bound inputs observe the edit.
	pub async fn fill(&self, page: &Page, node_id: NodeId, text: &str) -> DriverResult<()> {
		self.call_on_node(page, node_id, js::on_element::FILL, Some(text.into())).await?;
		Ok(())
	}

	/// Focus the node and type. `per_char_delay` switches to one
	/// insertText per character with a jittered pause between them.
	pub async fn type_text(
		&self,
		page: &Page,
		node_id: NodeId,
		text: &str,
		per_char_delay: Option<(u64, u64)>,
	) -> DriverResult<()> {
		page.execute(FocusParams::builder().node_id(node_id).build()).await?;

		match per_char_delay {
			Some((lo, hi)) => {
				for ch in text.chars() {
					page.execute(InsertTextParams::new(ch.to_string())).await?;
					let ms = {
						use rand::Rng;
						rand::thread_rng().gen_range(lo..=hi)
					};
					tokio::time::sleep(Duration::from_millis(ms)).await;
				}
			}
			None => {
				page.execute(InsertTextParams::new(text.to_string())).await?;
			}
		}
		Ok(())
	}

	/// Dispatch a key down/up pair for a named key.
	pub async fn press(&self, page: &Page, key: &str) -> DriverResult<()> {
		let spec = KeySpec::lookup(key);

		let mut down = DispatchKeyEventParams::builder()
			.r#type(DispatchKeyEventType::KeyDown)
			.key(spec.key.clone())
			.code(spec.code.clone())
			.windows_virtual_key_code(spec.vk)
			.native_virtual_key_code(spec.vk);
		if let Some(text) = &spec.text {
			down = down.text(text.clone());
		}
		page.execute(down.build().map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?).await?;

		let up = DispatchKeyEventParams::builder()
			.r#type(DispatchKeyEventType::KeyUp)
			.key(spec.key)
			.code(spec.code)
			.windows_virtual_key_code(spec.vk)
			.native_virtual_key_code(spec.vk)
			.build()
			.map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?;
		page.execute(up).await?;
		Ok(())
	}

	/// Poll an expression until truthy. Used for selector waits and load
	/// states; chromiumoxide has no built-in waitForSelector.
	pub async fn poll_until(&self, page: &Page, expr: &str, timeout_ms: u64) -> DriverResult<()> {
		let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
		loop {
			if let Ok(value) = self.evaluate(page, expr).await {
				if truthy(&value) {
					return Ok(());
				}
			}
			if tokio::time::Instant::now() >= deadline {
				return Err(DriverError::Timeout {
					ms: timeout_ms,
					what: expr.chars().take(80).collect(),
				});
			}
			tokio::time::sleep(POLL_INTERVAL).await;
		}
	}

	pub async fn screenshot(&self, page: &Page, full_page: bool) -> DriverResult<Vec<u8>> {
		let params = ScreenshotParams::builder()
			.format(CaptureScreenshotFormat::Png)
			.full_page(full_page)
			.build();
		Ok(page.screenshot(params).await?)
	}

	pub async fn pdf(&self, page: &Page, format: PaperFormat) -> DriverResult<Vec<u8>> {
		let (width, height) = format.inches();
		let params = PrintToPdfParams {
			paper_width: Some(width),
			paper_height: Some(height),
			print_background: Some(true),
			..Default::default()
		};
		Ok(page.pdf(params).await?)
	}

	/// Move through session history. `delta` is -1 for back, +1 for forward.
	pub async fn history_move(&self, page: &Page, delta: i64) -> DriverResult<()> {
		let history = page.execute(GetNavigationHistoryParams::default()).await?;
		let target = history.result.current_index + delta;
		let Some(entry) = usize::try_from(target).ok().and_then(|idx| history.result.entries.get(idx)) else {
			// Nowhere to go; mirror browser behavior and stay put.
			return Ok(());
		};
		page.execute(NavigateToHistoryEntryParams::new(entry.id)).await?;
		self.poll_until(page, js::DOM_CONTENT_LOADED_JS, NAV_TIMEOUT_MS).await
	}

	pub async fn reload(&self, page: &Page, hard: bool) -> DriverResult<()> {
		page.execute(ReloadParams::builder().ignore_cache(hard).build()).await?;
		self.poll_until(page, js::DOM_CONTENT_LOADED_JS, NAV_TIMEOUT_MS).await
	}

	pub async fn clear_cache(&self, page: &Page) -> DriverResult<()> {
		page.execute(ClearBrowserCacheParams::default()).await?;
		Ok(())
	}

	/// Run an element-scoped function via `Runtime.callFunctionOn`.
	pub async fn call_on_node(
		&self,
		page: &Page,
		node_id: NodeId,
		function: &str,
		argument: Option<serde_json::Value>,
	) -> DriverResult<serde_json::Value> {
		let resolved = page.execute(ResolveNodeParams::builder().node_id(node_id).build()).await?;
		let object_id = resolved
			.result
			.object
			.object_id
			.ok_or_else(|| DriverError::Other(anyhow::anyhow!("could not resolve element to a remote object")))?;

		let mut builder = CallFunctionOnParams::builder()
			.function_declaration(function)
			.object_id(object_id)
			.return_by_value(true);
		if let Some(value) = argument {
			builder = builder.argument(CallArgument::builder().value(value).build());
		}
		let params = builder.build().map_err(|e| DriverError::Other(anyhow::anyhow!(e)))?;

		let response = page.execute(params).await?;
		if let Some(details) = &response.result.exception_details {
			return Err(DriverError::Eval(details.text.clone()));
		}
		Ok(response.result.result.value.clone().unwrap_or(serde_json::Value::Null))
	}
}

/// JS truthiness of a JSON value.
pub fn truthy(value: &serde_json::Value) -> bool {
	match value {
		serde_json::Value::Null => false,
		serde_json::Value::Bool(b) => *b,
		serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
		serde_json::Value::String(s) => !s.is_empty(),
		serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
	}
}

/// PDF paper sizes in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperFormat {
	Letter,
	Legal,
	Tabloid,
	A3,
	A4,
}

impl PaperFormat {
	pub fn parse(name: &str) -> Option<Self> {
		match name.to_ascii_lowercase().as_str() {
			"letter" => Some(PaperFormat::Letter),
			"legal" => Some(PaperFormat::Legal),
			"tabloid" => Some(PaperFormat::Tabloid),
			"a3" => Some(PaperFormat::A3),
			"a4" => Some(PaperFormat::A4),
			_ => None,
		}
	}

	fn inches(self) -> (f64, f64) {
		match self {
			PaperFormat::Letter => (8.5, 11.0),
			PaperFormat::Legal => (8.5, 14.0),
			PaperFormat::Tabloid => (11.0, 17.0),
			PaperFormat::A3 => (11.69, 16.54),
			PaperFormat::A4 => (8.27, 11.69),
		}
	}
}

/// Key event description for `Input.dispatchKeyEvent`.
struct KeySpec {
	key: String,
	code: String,
	text: Option<String>,
	vk: i64,
}

impl KeySpec {
	fn lookup(name: &str) -> Self {
		let named = |key: &str, code: &str, text: Option<&str>, vk: i64| KeySpec {
			key: key.to_string(),
			code: code.to_string(),
			text: text.map(str::to_string),
			vk,
		};
		match name {
			"Enter" => named("Enter", "Enter", Some("\r"), 13),
			"Tab" => named("Tab", "Tab", Some("\t"), 9),
			"Escape" => named("Escape", "Escape", None, 27),
			"Backspace" => named("Backspace", "Backspace", None, 8),
			"Delete" => named("Delete", "Delete", None, 46),
			"ArrowUp" => named("ArrowUp", "ArrowUp", None, 38),
			"ArrowDown" => named("ArrowDown", "ArrowDown", None, 40),
			"ArrowLeft" => named("ArrowLeft", "ArrowLeft", None, 37),
			"ArrowRight" => named("ArrowRight", "ArrowRight", None, 39),
			"Home" => named("Home", "Home", None, 36),
			"End" => named("End", "End", None, 35),
			"PageUp" => named("PageUp", "PageUp", None, 33),
			"PageDown" => named("PageDown", "PageDown", None, 34),
			"Space" | " " => named(" ", "Space", Some(" "), 32),
			other => {
				// Single printable character; anything longer goes through as-is
				// and lets the browser make sense of it.
				let vk = other
					.chars()
					.next()
					.map(|c| c.to_ascii_uppercase() as i64)
					.unwrap_or(0);
				KeySpec {
					key: other.to_string(),
					code: String::new(),
					text: Some(other.to_string()),
					vk,
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truthiness_matches_js() {
		use serde_json::json;
		assert!(!truthy(&json!(null)));
		assert!(!truthy(&json!(false)));
		assert!(!truthy(&json!(0)));
		assert!(!truthy(&json!("")));
		assert!(truthy(&json!("x")));
		assert!(truthy(&json!(2)));
		assert!(truthy(&json!([])));
		assert!(truthy(&json!({})));
	}

	#[test]
	fn paper_formats_parse_case_insensitively() {
		assert_eq!(PaperFormat::parse("letter"), Some(PaperFormat::Letter));
		assert_eq!(PaperFormat::parse("A4"), Some(PaperFormat::A4));
		assert_eq!(PaperFormat::parse("tabloid"), Some(PaperFormat::Tabloid));
		assert!(PaperFormat::parse("postcard").is_none());
	}

	#[test]
	fn enter_key_carries_text() {
		let spec = KeySpec::lookup("Enter");
		assert_eq!(spec.vk, 13);
		assert_eq!(spec.text.as_deref(), Some("\r"));
	}

	#[test]
	fn plain_character_falls_through() {
		let spec = KeySpec::lookup("a");
		assert_eq!(spec.key, "a");
		assert_eq!(spec.vk, 'A' as i64);
	}
}
