//! Subcommand dispatch: CLI → daemon HTTP → printed output → exit code.
//!
//! Exit codes are the CLI's contract: 0 success (including `result:
//! true` checks), 1 for negative checks (`exists`/`visible` false,
//! `assert` fail), 2 for everything that stops a command (no daemon,
//! bad input, daemon-side failure).

use std::process::Stdio;
use std::time::Duration;

use br_protocol::{
	Ack, AssertOutcome, AssertRequest, AttrRequest, BoolResult, ConsoleEntry, CountResult, DownloadRequest,
	DownloadResult, EvalRequest, EvalResult, FillRequest, FillSearchRequest, FillSecretRequest, GotoRequest,
	HistoryEntry, MatchedSelector, PressRequest, ReloadRequest, ScrollToRequest, SelectRequest, SelectorRequest,
	SwitchTabRequest, TabInfo, TextResult, TreeResponse, TypeRequest, UrlResponse, ValueResult, WaitRequest,
};
use serde_json::json;
use tracing::error;

use crate::cli::{AdblockBase, Cli, Commands, TabsAction, parse_viewport};
use crate::client::DaemonClient;
use crate::daemon::{self, DaemonConfig};
use crate::error::{BrError, Result};
use crate::output;
use crate::registry::Registry;

/// How long `start` waits for the daemon to come up (browser launch
/// included) before giving up.
const START_PROBE_ATTEMPTS: u32 = 60;
const START_PROBE_INTERVAL: Duration = Duration::from_millis(250);

pub async fn dispatch(cli: Cli) -> Result<i32> {
	match cli.command {
		Commands::Start {
			headless,
			viewport,
			adblock,
			adblock_base,
			adblock_lists,
			foreground,
			humanlike,
		} => {
			start(
				&cli.name,
				headless,
				&viewport,
				adblock,
				adblock_base,
				adblock_lists.as_deref(),
				foreground,
				humanlike,
			)
			.await
		}
		Commands::Stop { all } => stop(&cli.name, all).await,
		Commands::List => list(),
		Commands::Daemon => match daemon::run(DaemonConfig::from_env()).await {
			Ok(()) => Ok(0),
			Err(err) => {
				error!(target = "br.daemon", error = %err, "daemon exited with error");
				Ok(1)
			}
		},
		command => {
			let registry = Registry::open_default()?;
			let client = DaemonClient::connect(&registry, &cli.name)?;
			run_daemon_command(command, &client, cli.json).await
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn start(
	name: &str,
	headless: bool,
	viewport: &str,
	adblock: bool,
	adblock_base: AdblockBase,
	adblock_lists: Option<&str>,
	foreground: bool,
	humanlike: bool,
) -> Result<i32> {
	let (width, height) = parse_viewport(viewport).map_err(BrError::InvalidInput)?;

	let lists: Vec<String> = adblock_lists
		.map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
		.unwrap_or_default();
	for entry in &lists {
		let is_url = entry.starts_with("http://") || entry.starts_with("https://");
		if !is_url && !std::path::Path::new(entry).exists() {
			return Err(BrError::InvalidInput(format!("adblock list not found: {entry}")));
		}
	}

	let registry = Registry::open_default()?;
	if let Some(record) = registry.read()?.get(name) {
		output::print_status(&format!("instance '{name}' already running on port {}", record.port));
		return Ok(0);
	}

	let port = registry.allocate_port(name)?;

	if foreground {
		let config = DaemonConfig {
			name: name.to_string(),
			port: Some(port),
			headless,
			viewport: (width, height),
			adblock,
			adblock_base: adblock_base.as_str().to_string(),
			adblock_lists: lists,
			humanlike,
		};
		return match daemon::run(config).await {
			Ok(()) => Ok(0),
			Err(err) => {
				error!(target = "br.daemon", error = %err, "daemon exited with error");
				Ok(1)
			}
		};
	}

	let exe = std::env::current_exe()?;
	let mut child = std::process::Command::new(exe)
		.arg("daemon")
		.env("BR_INSTANCE", name)
		.env("BR_PORT", port.to_string())
		.env("BR_HEADLESS", if headless { "1" } else { "0" })
		.env("BR_VIEWPORT_WIDTH", width.to_string())
		.env("BR_VIEWPORT_HEIGHT", height.to_string())
		.env("BR_ADBLOCK", if adblock { "1" } else { "0" })
		.env("BR_ADBLOCK_BASE", adblock_base.as_str())
		.env("BR_ADBLOCK_LISTS", lists.join(","))
		.env("BR_HUMANLIKE", if humanlike { "1" } else { "0" })
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()?;

	let client = DaemonClient::for_port(port)?;
	for _ in 0..START_PROBE_ATTEMPTS {
		if client.is_healthy().await {
			output::print_status(&format!("instance '{name}' running on port {port}"));
			return Ok(0);
		}
		if let Some(status) = child.try_wait()? {
			return Err(BrError::StartFailed(format!("daemon exited early with {status}")));
		}
		tokio::time::sleep(START_PROBE_INTERVAL).await;
	}

	Err(BrError::StartFailed(format!("no health response on port {port}")))
}

async fn stop(name: &str, all: bool) -> Result<i32> {
	let registry = Registry::open_default()?;
	let map = registry.read()?;

	if all {
		if map.is_empty() {
			output::print_line("no running instances");
			return Ok(0);
		}
		for (instance, record) in &map {
			shutdown_instance(&registry, instance, record.port).await?;
		}
		return Ok(0);
	}

	let record = map.get(name).ok_or(BrError::DaemonNotRunning)?;
	shutdown_instance(&registry, name, record.port).await?;
	Ok(0)
}

async fn shutdown_instance(registry: &Registry, name: &str, port: u16) -> Result<()> {
	let client = DaemonClient::for_port(port)?;
	match client.post_json::<_, Ack>("/shutdown", &json!({})).await {
		Ok(_) | Err(BrError::DaemonNotRunning) => {}
		Err(err) => return Err(err),
	}
	registry.unregister(name)?;
	output::print_status(&format!("stopped instance '{name}'"));
	Ok(())
}

fn list() -> Result<i32> {
	let registry = Registry::open_default()?;
	let map = registry.read()?;
	if map.is_empty() {
		output::print_line("no running instances");
		return Ok(0);
	}
	for (index, (name, record)) in map.iter().enumerate() {
		output::print_instance_row(name, record.port, record.pid, index == 0);
	}
	Ok(0)
}

async fn run_daemon_command(command: Commands, client: &DaemonClient, json: bool) -> Result<i32> {
	match command {
		Commands::Goto { url } => {
			let response: UrlResponse = client.post_json("/goto", &GotoRequest { url }).await?;
			print_payload(&response, json, &response.url);
			Ok(0)
		}
		Commands::Back => {
			let response: UrlResponse = client.post_json("/back", &json!({})).await?;
			print_payload(&response, json, &response.url);
			Ok(0)
		}
		Commands::Forward => {
			let response: UrlResponse = client.post_json("/forward", &json!({})).await?;
			print_payload(&response, json, &response.url);
			Ok(0)
		}
		Commands::Reload { hard } => {
			let _: Ack = client.post_json("/reload", &ReloadRequest { hard }).await?;
			output::print_status("reloaded");
			Ok(0)
		}
		Commands::ClearCache => {
			let _: Ack = client.post_json("/clear-cache", &json!({})).await?;
			output::print_status("cache cleared");
			Ok(0)
		}
		Commands::Tabs { action } => match action {
			Some(TabsAction::Switch { index }) => {
				let _: Ack = client.post_json("/tabs/switch", &SwitchTabRequest { index }).await?;
				output::print_status(&format!("switched to tab {index}"));
				Ok(0)
			}
			None => {
				let tabs: Vec<TabInfo> = client.get_json("/tabs", &[]).await?;
				if json {
					output::print_json(&tabs);
				} else {
					for tab in &tabs {
						let marker = if tab.is_active { "*" } else { " " };
						output::print_line(&format!("{marker} [{}] {} — {}", tab.index, tab.title, tab.url));
					}
				}
				Ok(0)
			}
		},
		Commands::Click { selector } => {
			let _: Ack = client.post_json("/click", &SelectorRequest { selector: selector.clone() }).await?;
			output::print_status(&format!("clicked {selector}"));
			Ok(0)
		}
		Commands::Fill { selector, text } => {
			let _: Ack = client.post_json("/fill", &FillRequest { selector: selector.clone(), text }).await?;
			output::print_status(&format!("filled {selector}"));
			Ok(0)
		}
		Commands::FillSecret { selector, secret } => {
			let _: Ack = client
				.post_json("/fill-secret", &FillSecretRequest { selector: selector.clone(), secret })
				.await?;
			output::print_status(&format!("filled {selector} (masked)"));
			Ok(0)
		}
		Commands::Type { selector, text } => {
			let _: Ack = client.post_json("/type", &TypeRequest { selector: selector.clone(), text }).await?;
			output::print_status(&format!("typed into {selector}"));
			Ok(0)
		}
		Commands::Press { key } => {
			let _: Ack = client.post_json("/press", &PressRequest { key: key.clone() }).await?;
			output::print_status(&format!("pressed {key}"));
			Ok(0)
		}
		Commands::ScrollIntoView { selector } => {
			let _: Ack = client.post_json("/scroll-into-view", &SelectorRequest { selector }).await?;
			output::print_status("scrolled into view");
			Ok(0)
		}
		Commands::ScrollTo { percentage } => {
			let _: Ack = client.post_json("/scroll-to", &ScrollToRequest { percentage }).await?;
			output::print_status(&format!("scrolled to {percentage}%"));
			Ok(0)
		}
		Commands::NextChunk => {
			let _: Ack = client.post_json("/next-chunk", &json!({})).await?;
			output::print_status("scrolled down one viewport");
			Ok(0)
		}
		Commands::PrevChunk => {
			let _: Ack = client.post_json("/prev-chunk", &json!({})).await?;
			output::print_status("scrolled up one viewport");
			Ok(0)
		}
		Commands::FillSearch { query, selector } => {
			let response: MatchedSelector = client.post_json("/fill-search", &FillSearchRequest { query, selector }).await?;
			print_payload(&response, json, &response.selector);
			Ok(0)
		}
		Commands::Select { selector, value } => {
			let response: ValueResult = client.post_json("/select", &SelectRequest { selector, value }).await?;
			print_payload(&response, json, &response.value);
			Ok(0)
		}
		Commands::Submit { selector } => {
			let _: Ack = client.post_json("/submit", &SelectorRequest { selector }).await?;
			output::print_status("submitted");
			Ok(0)
		}
		Commands::Exists { selector } => {
			let response: BoolResult = client.post_json("/exists", &SelectorRequest { selector }).await?;
			print_payload(&response, json, if response.result { "true" } else { "false" });
			Ok(if response.result { 0 } else { 1 })
		}
		Commands::Visible { selector } => {
			let response: BoolResult = client.post_json("/visible", &SelectorRequest { selector }).await?;
			print_payload(&response, json, if response.result { "true" } else { "false" });
			Ok(if response.result { 0 } else { 1 })
		}
		Commands::Count { selector } => {
			let response: CountResult = client.post_json("/count", &SelectorRequest { selector }).await?;
			print_payload(&response, json, &response.count.to_string());
			Ok(0)
		}
		Commands::Attr { selector, attribute } => {
			let response: ValueResult = client.post_json("/attr", &AttrRequest { selector, attribute }).await?;
			print_payload(&response, json, &response.value);
			Ok(0)
		}
		Commands::Wait { selector, timeout } => {
			let _: Ack = client.post_json("/wait", &WaitRequest { selector, timeout }).await?;
			output::print_status("condition met");
			Ok(0)
		}
		Commands::WaitLoad => {
			let _: Ack = client.post_json("/wait-load", &json!({})).await?;
			output::print_status("load complete");
			Ok(0)
		}
		Commands::WaitStable => {
			let ack: Ack = client.post_json("/wait-stable", &json!({})).await?;
			output::print_status(if ack.ok { "dom stable" } else { "dom still busy (safety cap)" });
			Ok(0)
		}
		Commands::WaitIdle => {
			let ack: Ack = client.post_json("/wait-idle", &json!({})).await?;
			output::print_status(if ack.ok { "network idle" } else { "network still busy (safety cap)" });
			Ok(0)
		}
		Commands::Html { page } => {
			let mut query = Vec::new();
			if let Some(page) = page {
				query.push(("page", page.to_string()));
			}
			let html = client.get_text("/html", &query).await?;
			output::print_line(&html);
			Ok(0)
		}
		Commands::Tree => {
			let response: TreeResponse = client.get_json("/tree", &[]).await?;
			output::print_json(&response.tree);
			Ok(0)
		}
		Commands::ExtractText { selector } => {
			let response: TextResult = client.post_json("/extract-text", &json!({ "selector": selector })).await?;
			print_payload(&response, json, &response.text);
			Ok(0)
		}
		Commands::Screenshot { full_page, path } => {
			let mut query = vec![("fullPage", full_page.to_string())];
			if let Some(path) = path {
				query.push(("path", path.to_string_lossy().into_owned()));
			}
			let saved = client.get_text("/screenshot", &query).await?;
			output::print_line(&saved);
			Ok(0)
		}
		Commands::Pdf { format, path } => {
			let mut query = Vec::new();
			if let Some(format) = format {
				query.push(("format", format));
			}
			if let Some(path) = path {
				query.push(("path", path.to_string_lossy().into_owned()));
			}
			let saved = client.get_text("/pdf", &query).await?;
			output::print_line(&saved);
			Ok(0)
		}
		Commands::Download { selector, output: target } => {
			let response: DownloadResult = client
				.post_json("/download", &DownloadRequest { selector, output: target })
				.await?;
			if json {
				output::print_json(&response);
			} else {
				output::print_line(&format!("{} ({} bytes)", response.path.display(), response.size));
			}
			Ok(0)
		}
		Commands::Eval { script } => {
			let response: EvalResult = client.post_json("/eval", &EvalRequest { script }).await?;
			match &response.result {
				serde_json::Value::String(s) if !json => output::print_line(s),
				other => output::print_json(other),
			}
			Ok(0)
		}
		Commands::Assert { script, expected, message } => {
			let outcome: AssertOutcome = client
				.post_json("/assert", &AssertRequest { script, expected, message })
				.await?;
			if json {
				output::print_json(&outcome);
			} else if outcome.pass {
				output::print_status(&format!("pass: {}", outcome.actual));
			} else {
				let detail = match &outcome.expected {
					Some(expected) => format!("fail: expected {expected:?}, got {:?}", outcome.actual),
					None => format!("fail: result not truthy ({:?})", outcome.actual),
				};
				match &outcome.message {
					Some(message) => output::print_line(&format!("{detail} — {message}")),
					None => output::print_line(&detail),
				}
			}
			Ok(if outcome.pass { 0 } else { 1 })
		}
		Commands::Console { kind, tab, clear } => {
			let mut query = Vec::new();
			if let Some(kind) = kind {
				query.push(("type", kind));
			}
			if let Some(tab) = tab {
				query.push(("tab", tab.to_string()));
			}
			if clear {
				query.push(("clear", "true".to_string()));
			}
			let entries: Vec<ConsoleEntry> = client.get_json("/console", &query).await?;
			if json {
				output::print_json(&entries);
			} else {
				for entry in &entries {
					output::print_line(&format!(
						"[{}] tab {} {} — {}",
						entry.kind.as_str(),
						entry.tab,
						entry.timestamp,
						entry.text
					));
				}
			}
			Ok(0)
		}
		Commands::History { clear } => {
			if clear {
				let _: Ack = client.post_json("/history/clear", &json!({})).await?;
				output::print_status("history cleared");
				return Ok(0);
			}
			let entries: Vec<HistoryEntry> = client.get_json("/history", &[]).await?;
			if json {
				output::print_json(&entries);
			} else {
				for entry in &entries {
					output::print_line(&format!("{} {} {}", entry.timestamp, entry.action, entry.args));
				}
			}
			Ok(0)
		}
		Commands::Start { .. } | Commands::Stop { .. } | Commands::List | Commands::Daemon => {
			unreachable!("handled before daemon dispatch")
		}
	}
}

fn print_payload<T: serde::Serialize>(payload: &T, json: bool, human: &str) {
	if json {
		output::print_json(payload);
	} else {
		output::print_line(human);
	}
}
