//! Integration tests that exercise the `br` binary without a daemon.
//!
//! Each test gets a scratch HOME so the registry under `~/.br` starts
//! empty and nothing leaks between tests or into the real user profile.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn br_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("br");
	path
}

fn run(home: &TempDir, args: &[&str]) -> Output {
	Command::new(br_binary())
		.args(args)
		.env("HOME", home.path())
		.output()
		.expect("failed to execute br")
}

#[test]
fn exists_without_daemon_exits_2() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["exists", "#missing"]);

	assert_eq!(output.status.code(), Some(2));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Daemon is not running"), "stderr: {stderr}");
}

#[test]
fn stop_unknown_instance_exits_2() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["--name", "ghost", "stop"]);

	assert_eq!(output.status.code(), Some(2));
}

#[test]
fn list_on_empty_registry_prints_nothing_running() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["list"]);

	assert_eq!(output.status.code(), Some(0));
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("no running instances"), "stdout: {stdout}");
}

#[test]
fn list_prunes_dead_registry_entries() {
	let home = TempDir::new().unwrap();
	let dir = home.path().join(".br");
	std::fs::create_dir_all(&dir).unwrap();
	std::fs::write(
		dir.join("instances.json"),
		// A pid far past any real pid table.
		r#"{"stale":{"port":3030,"pid":4000000}}"#,
	)
	.unwrap();

	let output = run(&home, &["list"]);
	assert_eq!(output.status.code(), Some(0));
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("no running instances"), "stdout: {stdout}");

	let rewritten = std::fs::read_to_string(dir.join("instances.json")).unwrap();
	assert!(!rewritten.contains("stale"));
}

#[test]
fn start_rejects_malformed_viewport() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["start", "--viewport", "huge"]);

	assert_eq!(output.status.code(), Some(2));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("viewport"), "stderr: {stderr}");
}

#[test]
fn start_rejects_missing_adblock_list_file() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["start", "--adblock", "--adblock-lists", "/does/not/exist.txt"]);

	assert_eq!(output.status.code(), Some(2));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("adblock list not found"), "stderr: {stderr}");
}

#[test]
fn goto_without_daemon_exits_2() {
	let home = TempDir::new().unwrap();
	let output = run(&home, &["goto", "https://example.com"]);

	assert_eq!(output.status.code(), Some(2));
}
