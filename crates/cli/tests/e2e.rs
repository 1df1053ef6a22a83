//! End-to-end tests against a live daemon.
//!
//! These tests launch real headless browser instances and use `data:`
//! URLs to avoid network dependencies. Each test gets its own scratch
//! HOME (so registries never collide) and daemons run one at a time
//! behind a lock, stopped again by the guard's Drop.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Mutex;

use br_cli::client::DaemonClient;
use br_cli::error::BrError;
use br_cli::registry::Registry;
use br_protocol::{Ack, AssertOutcome, BoolResult, DownloadResult, EvalResult, TreeNode, TreeResponse, UrlResponse};
use serde_json::json;
use tempfile::TempDir;

static DAEMON_LOCK: Mutex<()> = Mutex::new(());

fn lock_daemon() -> std::sync::MutexGuard<'static, ()> {
	DAEMON_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn br_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("br");
	path
}

/// One running daemon in a scratch HOME, stopped on drop.
struct DaemonGuard {
	home: TempDir,
	port: u16,
}

impl DaemonGuard {
	fn client(&self) -> DaemonClient {
		DaemonClient::for_port(self.port).unwrap()
	}

	fn run_cli(&self, args: &[&str]) -> Output {
		Command::new(br_binary())
			.args(args)
			.env("HOME", self.home.path())
			.output()
			.expect("failed to execute br")
	}
}

impl Drop for DaemonGuard {
	fn drop(&mut self) {
		let _ = Command::new(br_binary()).arg("stop").env("HOME", self.home.path()).output();
	}
}

fn start_daemon() -> DaemonGuard {
	let home = TempDir::new().unwrap();
	let output = Command::new(br_binary())
		.args(["start", "--headless"])
		.env("HOME", home.path())
		.output()
		.expect("failed to execute br");
	assert!(
		output.status.success(),
		"start failed: {}",
		String::from_utf8_lossy(&output.stderr)
	);

	let registry = Registry::new(home.path().join(".br"));
	let record = registry
		.read()
		.unwrap()
		.get("default")
		.copied()
		.expect("daemon did not register itself");
	DaemonGuard { home, port: record.port }
}

async fn goto(client: &DaemonClient, html: &str) {
	let _: UrlResponse = client
		.post_json("/goto", &json!({ "url": format!("data:text/html,{html}") }))
		.await
		.expect("navigation failed");
}

#[tokio::test]
async fn started_instance_registers_and_answers_health() {
	let _lock = lock_daemon();
	let daemon = start_daemon();

	assert!(daemon.port >= 3030);

	let health = daemon.client().get_text("/health", &[]).await.unwrap();
	assert_eq!(health, "ok");

	let output = daemon.run_cli(&["list"]);
	assert!(output.status.success());
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("default"), "stdout: {stdout}");
	assert!(stdout.contains(&daemon.port.to_string()), "stdout: {stdout}");
}

#[tokio::test]
async fn download_decodes_a_base64_data_href() {
	let _lock = lock_daemon();
	let daemon = start_daemon();
	let client = daemon.client();

	goto(
		&client,
		r#"<html><body><a id="dl-link" href="data:text/plain;base64,SGVsbG8gV29ybGQ=">x</a></body></html>"#,
	)
	.await;

	let target = daemon.home.path().join("dl.txt");
	let result: DownloadResult = client
		.post_json("/download", &json!({ "selector": "#dl-link", "output": target }))
		.await
		.unwrap();

	assert_eq!(result.size, 11);
	assert_eq!(result.url, "data:text/plain;base64,SGVsbG8gV29ybGQ=");
	let content = std::fs::read_to_string(&result.path).unwrap();
	assert_eq!(content, "Hello World");
}

#[tokio::test]
async fn download_without_href_or_src_is_a_400() {
	let _lock = lock_daemon();
	let daemon = start_daemon();
	let client = daemon.client();

	goto(&client, r#"<span id="no-href">x</span>"#).await;

	let err = client
		.post_json::<_, DownloadResult>("/download", &json!({ "selector": "#no-href" }))
		.await
		.unwrap_err();
	match err {
		BrError::Daemon { status, message } => {
			assert_eq!(status, 400);
			assert!(message.contains("no href or src"), "message: {message}");
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn fill_secret_is_masked_in_html_and_history() {
	let _lock = lock_daemon();
	let daemon = start_daemon();
	let client = daemon.client();

	goto(&client, r#"<form><input id="pwd" type="password"></form>"#).await;

	let _: Ack = client
		.post_json("/fill-secret", &json!({ "selector": "#pwd", "secret": "hunter2" }))
		.await
		.unwrap();

	// Reflect the live value into the markup, as pages that mirror
	// their inputs do; the mask must cover the reflected copy.
	let _: EvalResult = client
		.post_json(
			"/eval",
			&json!({ "script": "document.querySelector('#pwd').setAttribute('value', document.querySelector('#pwd').value)" }),
		)
		.await
		.unwrap();

	let html = client.get_text("/html", &[]).await.unwrap();
	assert!(html.contains("value=\"***\""), "html: {html}");
	assert!(!html.contains("hunter2"), "secret leaked into html");

	let history = client.get_text("/history", &[]).await.unwrap();
	assert!(!history.contains("hunter2"), "secret leaked into history");
}

fn find_by_xpath<'a>(node: &'a TreeNode, xpath: &str) -> Option<&'a TreeNode> {
	if node.xpath.as_deref() == Some(xpath) {
		return Some(node);
	}
	node.children.iter().find_map(|child| find_by_xpath(child, xpath))
}

#[tokio::test]
async fn tree_indexes_same_tag_siblings_and_ids_resolve() {
	let _lock = lock_daemon();
	let daemon = start_daemon();
	let client = daemon.client();

	goto(&client, "<ul><li>a</li><li>b</li></ul>").await;

	let response: TreeResponse = client.get_json("/tree", &[]).await.unwrap();
	let serialized = serde_json::to_string(&response.tree).unwrap();
	assert!(serialized.contains("/html/body/ul/li[1]"), "tree: {serialized}");
	assert!(serialized.contains("/html/body/ul/li[2]"), "tree: {serialized}");

	// The AX id doubles as a selector token until the next tree view.
	let first = find_by_xpath(&response.tree, "/html/body/ul/li[1]").expect("li[1] missing from tree");
	let by_id: BoolResult = client
		.post_json("/exists", &json!({ "selector": first.id.to_string() }))
		.await
		.unwrap();
	assert!(by_id.result);

	let by_xpath: BoolResult = client
		.post_json("/exists", &json!({ "selector": "/html/body/ul/li[1]" }))
		.await
		.unwrap();
	assert!(by_xpath.result);
}

#[tokio::test]
async fn assert_passes_and_fails_with_matching_exit_codes() {
	let _lock = lock_daemon();
	let daemon = start_daemon();
	let client = daemon.client();

	goto(&client, "<p>x</p>").await;

	let pass: AssertOutcome = client
		.post_json("/assert", &json!({ "script": "1+1", "expected": "2" }))
		.await
		.unwrap();
	assert!(pass.pass);
	assert_eq!(pass.actual, "2");
	assert_eq!(pass.expected.as_deref(), Some("2"));

	let fail: AssertOutcome = client
		.post_json("/assert", &json!({ "script": "1+1", "expected": "3" }))
		.await
		.unwrap();
	assert!(!fail.pass);
	assert_eq!(fail.actual, "2");

	let output = daemon.run_cli(&["assert", "1+1", "--expected", "2"]);
	assert_eq!(output.status.code(), Some(0));

	let output = daemon.run_cli(&["assert", "1+1", "--expected", "3"]);
	assert_eq!(output.status.code(), Some(1));
}
