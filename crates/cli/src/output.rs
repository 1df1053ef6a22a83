//! CLI output helpers.
//!
//! Human output is plain lines; `--json` prints the daemon's payload
//! re-serialized pretty. Writes ignore errors so a closed stdout pipe
//! (`br tabs | head`) never turns into a crash.

use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;

pub fn print_line(text: &str) {
	let mut stdout = io::stdout().lock();
	let _ = writeln!(stdout, "{text}");
}

pub fn print_json<T: Serialize>(value: &T) {
	if let Ok(json) = serde_json::to_string_pretty(value) {
		print_line(&json);
	}
}

/// One row of `br list`.
pub fn print_instance_row(name: &str, port: u16, pid: u32, header: bool) {
	let mut stdout = io::stdout().lock();
	if header {
		let _ = writeln!(stdout, "{:<16} {:>6}  {:>8}", "NAME".bold(), "PORT".bold(), "PID".bold());
	}
	let _ = writeln!(stdout, "{:<16} {:>6}  {:>8}", name.cyan(), port, pid);
}

pub fn print_status(text: &str) {
	let mut stdout = io::stdout().lock();
	let _ = writeln!(stdout, "{} {text}", "✓".green());
}
