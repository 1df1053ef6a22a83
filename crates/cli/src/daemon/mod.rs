//! Daemon lifecycle.
//!
//! One daemon owns one persistent browser profile and serves the HTTP
//! surface for it. Configuration arrives through `BR_*` environment
//! variables (the CLI `start` command sets them on the spawned child),
//! the instance registers itself in the registry, and the process exits
//! when asked to shut down, on SIGINT/SIGTERM, or when the browser goes
//! away on its own.

pub mod endpoints;
pub mod router;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use br_protocol::ConsoleKind;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::browser::adblock::Adblocker;
use crate::browser::driver::{Driver, DriverConfig, DriverResult};
use crate::registry::Registry;
use state::{InstanceState, Tab};

/// Launch options resolved from the environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
	pub name: String,
	pub port: Option<u16>,
	pub headless: bool,
	pub viewport: (u32, u32),
	pub adblock: bool,
	pub adblock_base: String,
	pub adblock_lists: Vec<String>,
	pub humanlike: bool,
}

impl DaemonConfig {
	/// Read the `BR_*` variables the CLI sets on the daemon child.
	pub fn from_env() -> Self {
		let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
		Self {
			name: env("BR_INSTANCE").unwrap_or_else(|| crate::registry::DEFAULT_INSTANCE.to_string()),
			port: env("BR_PORT").and_then(|v| v.parse().ok()),
			headless: env_flag("BR_HEADLESS"),
			viewport: (
				env("BR_VIEWPORT_WIDTH").and_then(|v| v.parse().ok()).unwrap_or(1280),
				env("BR_VIEWPORT_HEIGHT").and_then(|v| v.parse().ok()).unwrap_or(720),
			),
			adblock: env_flag("BR_ADBLOCK"),
			adblock_base: env("BR_ADBLOCK_BASE").unwrap_or_else(|| "adsandtrackers".to_string()),
			adblock_lists: env("BR_ADBLOCK_LISTS")
				.map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
				.unwrap_or_default(),
			humanlike: env_flag("BR_HUMANLIKE"),
		}
	}
}

fn env_flag(key: &str) -> bool {
	std::env::var(key)
		.map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
		.unwrap_or(false)
}

/// A console message or page error on its way from a listener task to
/// the state bag. The tab is identified, never indexed: indices shift
/// when tabs close.
#[derive(Debug)]
pub struct ConsoleEvent {
	pub target_id: TargetId,
	pub kind: ConsoleKind,
	pub text: String,
}

/// Everything the router needs, shared as one `Arc`.
pub struct Daemon {
	pub config: DaemonConfig,
	pub driver: Driver,
	/// The state bag; hold briefly, mutate under it only.
	pub state: Mutex<InstanceState>,
	/// Serializes browser operations so per-tab ordering is defined.
	pub op_gate: Mutex<()>,
	pub adblocker: Adblocker,
	pub shutdown_tx: watch::Sender<bool>,
	console_tx: mpsc::UnboundedSender<ConsoleEvent>,
}

impl Daemon {
	/// Attach console/exception listeners to a page and register it in
	/// the tab list. New pages become the active tab.
	pub async fn adopt_page(self: &Arc<Self>, page: Page) {
		let target_id = page.target_id().clone();

		{
			let mut state = self.state.lock().await;
			if state.tab_index_of(&target_id).is_some() {
				return;
			}
			state.tabs.push(Tab {
				target_id: target_id.clone(),
				page: page.clone(),
				url: String::new(),
			});
			state.active = state.tabs.len() - 1;
		}

		if self.config.adblock {
			if let Err(err) = self.adblocker.apply(&page).await {
				warn!(target = "br.daemon", error = %err, "ad-block activation failed");
			}
		}

		spawn_console_listeners(page, target_id, self.console_tx.clone());
	}

	/// Reconcile the tab list against the driver's live pages: adopt new
	/// ones, drop closed ones, keep the active tab stable by identity.
	pub async fn sync_tabs(self: &Arc<Self>) -> DriverResult<()> {
		let pages = self.driver.pages().await?;
		let live_ids: Vec<TargetId> = pages.iter().map(|p| p.target_id().clone()).collect();

		let new_pages: Vec<Page> = {
			let mut state = self.state.lock().await;
			let active_id = state.tabs.get(state.active).map(|t| t.target_id.clone());
			state.tabs.retain(|tab| live_ids.contains(&tab.target_id));
			state.active = active_id
				.and_then(|id| state.tab_index_of(&id))
				.unwrap_or_else(|| state.tabs.len().saturating_sub(1));

			pages
				.into_iter()
				.filter(|p| state.tab_index_of(p.target_id()).is_none())
				.collect()
		};

		for page in new_pages {
			self.adopt_page(page).await;
		}
		Ok(())
	}

	/// Record the URL the daemon last saw for a tab (console entries
	/// report it).
	pub async fn note_tab_url(&self, index: usize, url: String) {
		let mut state = self.state.lock().await;
		if let Some(tab) = state.tabs.get_mut(index) {
			tab.url = url;
		}
	}
}

/// Run the daemon to completion. Exit code semantics: `Ok` covers both
/// requested shutdown and the browser going away on its own.
pub async fn run(config: DaemonConfig) -> Result<()> {
	let registry = Registry::open_default()?;
	let port = match config.port {
		Some(port) => port,
		None => registry.allocate_port(&config.name)?,
	};

	let adblocker = if config.adblock {
		Adblocker::build(&config.adblock_base, &config.adblock_lists).await?
	} else {
		Adblocker::default()
	};

	let driver_config = DriverConfig {
		headless: config.headless,
		viewport: config.viewport,
		user_data_dir: profile_dir(&config.name),
	};
	let (driver, mut browser_gone) = Driver::launch(&driver_config)
		.await
		.map_err(|e| anyhow::anyhow!("browser launch failed: {e}"))?;

	let (console_tx, console_rx) = mpsc::unbounded_channel();
	let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

	let daemon = Arc::new(Daemon {
		config,
		driver,
		state: Mutex::new(InstanceState::default()),
		op_gate: Mutex::new(()),
		adblocker,
		shutdown_tx,
		console_tx,
	});

	tokio::spawn(collect_console(Arc::clone(&daemon), console_rx));

	let initial = daemon.driver.new_page().await.map_err(|e| anyhow::anyhow!("initial tab failed: {e}"))?;
	daemon.adopt_page(initial).await;

	registry.register(&daemon.config.name, port, std::process::id())?;

	let app = router::build(Arc::clone(&daemon));
	let addr = format!("127.0.0.1:{port}");
	let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
	info!(target = "br.daemon", port, instance = %daemon.config.name, "running on port {port}");

	let mut serve_rx = daemon.shutdown_tx.subscribe();
	let server = tokio::spawn(async move {
		axum::serve(listener, app)
			.with_graceful_shutdown(async move {
				let _ = serve_rx.wait_for(|v| *v).await;
			})
			.await
	});

	let browser_quit = wait_for_exit(&daemon, &mut shutdown_rx, &mut browser_gone).await;

	if browser_quit {
		info!(target = "br.daemon", "browser disconnected, exiting");
	} else {
		daemon.driver.close().await;
	}
	let _ = daemon.shutdown_tx.send(true);
	let _ = server.await;
	registry.unregister(&daemon.config.name)?;
	Ok(())
}

/// Block until a shutdown reason arrives. Returns true when the browser
/// vanished on its own.
async fn wait_for_exit(
	daemon: &Arc<Daemon>,
	shutdown_rx: &mut watch::Receiver<bool>,
	browser_gone: &mut watch::Receiver<bool>,
) -> bool {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(s) => s,
			Err(err) => {
				warn!(target = "br.daemon", error = %err, "failed to install SIGTERM handler");
				return wait_without_signals(shutdown_rx, browser_gone).await;
			}
		};
		let mut sigint = match signal(SignalKind::interrupt()) {
			Ok(s) => s,
			Err(err) => {
				warn!(target = "br.daemon", error = %err, "failed to install SIGINT handler");
				return wait_without_signals(shutdown_rx, browser_gone).await;
			}
		};

		tokio::select! {
			_ = shutdown_rx.wait_for(|v| *v) => {
				info!(target = "br.daemon", instance = %daemon.config.name, "shutdown requested");
				false
			}
			_ = sigterm.recv() => {
				info!(target = "br.daemon", "received SIGTERM, shutting down");
				false
			}
			_ = sigint.recv() => {
				info!(target = "br.daemon", "received SIGINT, shutting down");
				false
			}
			_ = browser_gone.wait_for(|v| *v) => true,
		}
	}

	#[cfg(not(unix))]
	{
		tokio::select! {
			_ = shutdown_rx.wait_for(|v| *v) => {
				info!(target = "br.daemon", instance = %daemon.config.name, "shutdown requested");
				false
			}
			_ = tokio::signal::ctrl_c() => {
				info!(target = "br.daemon", "received Ctrl+C, shutting down");
				false
			}
			_ = browser_gone.wait_for(|v| *v) => true,
		}
	}
}

async fn wait_without_signals(shutdown_rx: &mut watch::Receiver<bool>, browser_gone: &mut watch::Receiver<bool>) -> bool {
	tokio::select! {
		_ = shutdown_rx.wait_for(|v| *v) => false,
		_ = browser_gone.wait_for(|v| *v) => true,
	}
}

/// Drain listener events into the console ring. Index resolution happens
/// here, at append time, so entries survive tab-list compaction with the
/// index the tab had when the message arrived.
async fn collect_console(daemon: Arc<Daemon>, rx: mpsc::UnboundedReceiver<ConsoleEvent>) {
	let mut events = UnboundedReceiverStream::new(rx);
	while let Some(event) = events.next().await {
		let mut state = daemon.state.lock().await;
		let Some(index) = state.tab_index_of(&event.target_id) else {
			continue;
		};
		let url = state.tabs.get(index).map(|t| t.url.clone()).unwrap_or_default();
		state.push_console(event.kind, event.text, url, index);
	}
}

/// One task per event kind per page; each ends when its page closes.
fn spawn_console_listeners(page: Page, target_id: TargetId, tx: mpsc::UnboundedSender<ConsoleEvent>) {
	let console_page = page.clone();
	let console_target = target_id.clone();
	let console_tx = tx.clone();
	tokio::spawn(async move {
		let mut events = match console_page.event_listener::<EventConsoleApiCalled>().await {
			Ok(events) => events,
			Err(err) => {
				debug!(target = "br.daemon", error = %err, "console listener attach failed");
				return;
			}
		};
		while let Some(event) = events.next().await {
			let entry = ConsoleEvent {
				target_id: console_target.clone(),
				kind: console_kind(&event.r#type),
				text: console_text(&event),
			};
			if console_tx.send(entry).is_err() {
				break;
			}
		}
	});

	tokio::spawn(async move {
		let mut events = match page.event_listener::<EventExceptionThrown>().await {
			Ok(events) => events,
			Err(err) => {
				debug!(target = "br.daemon", error = %err, "exception listener attach failed");
				return;
			}
		};
		while let Some(event) = events.next().await {
			let details = &event.exception_details;
			let text = details
				.exception
				.as_ref()
				.and_then(|obj| obj.description.clone())
				.unwrap_or_else(|| details.text.clone());
			let entry = ConsoleEvent {
				target_id: target_id.clone(),
				kind: ConsoleKind::Pageerror,
				text,
			};
			if tx.send(entry).is_err() {
				break;
			}
		}
	});
}

fn console_kind(kind: &ConsoleApiCalledType) -> ConsoleKind {
	match kind {
		ConsoleApiCalledType::Log => ConsoleKind::Log,
		ConsoleApiCalledType::Warning => ConsoleKind::Warning,
		ConsoleApiCalledType::Error => ConsoleKind::Error,
		ConsoleApiCalledType::Info => ConsoleKind::Info,
		ConsoleApiCalledType::Debug => ConsoleKind::Debug,
		_ => ConsoleKind::Log,
	}
}

fn console_text(event: &EventConsoleApiCalled) -> String {
	event
		.args
		.iter()
		.map(|arg| {
			if let Some(value) = &arg.value {
				match value {
					serde_json::Value::String(s) => s.clone(),
					other => other.to_string(),
				}
			} else if let Some(description) = &arg.description {
				description.clone()
			} else if let Some(unserializable) = &arg.unserializable_value {
				unserializable.inner().clone()
			} else {
				String::from("undefined")
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Per-instance browser profile. Never cleaned on exit: a profile from a
/// crashed run is useful for debugging.
fn profile_dir(name: &str) -> PathBuf {
	let epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
	std::env::temp_dir().join("br_cli").join(format!("profile-{name}-{epoch}"))
}

/// Directory for screenshots, PDFs, and downloads.
pub fn output_dir() -> PathBuf {
	std::env::temp_dir().join("br_cli")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn env_flag_accepts_common_truthy_spellings() {
		// Key chosen to avoid colliding with real configuration.
		unsafe { std::env::set_var("BR_TEST_FLAG_X", "true") };
		assert!(env_flag("BR_TEST_FLAG_X"));
		unsafe { std::env::set_var("BR_TEST_FLAG_X", "1") };
		assert!(env_flag("BR_TEST_FLAG_X"));
		unsafe { std::env::set_var("BR_TEST_FLAG_X", "0") };
		assert!(!env_flag("BR_TEST_FLAG_X"));
		unsafe { std::env::remove_var("BR_TEST_FLAG_X") };
		assert!(!env_flag("BR_TEST_FLAG_X"));
	}

	#[test]
	fn profile_dirs_are_per_instance() {
		let a = profile_dir("default");
		assert!(a.to_string_lossy().contains("profile-default-"));
		assert!(a.starts_with(std::env::temp_dir().join("br_cli")));
	}
}
