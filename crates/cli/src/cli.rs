use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::styles::cli_styles;

/// Base filter level for the ad-blocker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AdblockBase {
	/// No built-in lists; only `--adblock-lists` entries apply.
	None,
	/// Ads and trackers (default).
	#[default]
	Adsandtrackers,
	/// Everything: ads, trackers, annoyances.
	Full,
	/// Ads only.
	Ads,
}

impl AdblockBase {
	pub fn as_str(self) -> &'static str {
		match self {
			AdblockBase::None => "none",
			AdblockBase::Adsandtrackers => "adsandtrackers",
			AdblockBase::Full => "full",
			AdblockBase::Ads => "ads",
		}
	}
}

impl std::str::FromStr for AdblockBase {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"none" => Ok(AdblockBase::None),
			"adsandtrackers" => Ok(AdblockBase::Adsandtrackers),
			"full" => Ok(AdblockBase::Full),
			"ads" => Ok(AdblockBase::Ads),
			other => Err(format!("unknown adblock base: {other}")),
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "br")]
#[command(about = "Browser automation daemon and CLI")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Target instance name
	#[arg(long, global = true, default_value = "default", value_name = "NAME")]
	pub name: String,

	/// Print raw JSON responses instead of human-readable text
	#[arg(long, global = true)]
	pub json: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Start a daemon for the named instance
	Start {
		/// Run the browser headless
		#[arg(long)]
		headless: bool,
		/// Viewport size as WxH
		#[arg(long, default_value = "1280x720", value_name = "WxH")]
		viewport: String,
		/// Enable the ad-blocker
		#[arg(long)]
		adblock: bool,
		/// Built-in filter set to start from
		#[arg(long, value_enum, default_value = "adsandtrackers")]
		adblock_base: AdblockBase,
		/// Extra filter lists (comma-separated URLs or file paths)
		#[arg(long, value_name = "CSV")]
		adblock_lists: Option<String>,
		/// Stay in the foreground instead of detaching
		#[arg(long)]
		foreground: bool,
		/// Human-like pacing: delays around navigation, clicks, and typing
		#[arg(long)]
		humanlike: bool,
	},

	/// Stop the named instance's daemon
	Stop {
		/// Stop every registered instance
		#[arg(long)]
		all: bool,
	},

	/// List registered instances
	#[command(alias = "ls")]
	List,

	/// Run the daemon in this process (used internally by `start`)
	#[command(hide = true)]
	Daemon,

	/// Navigate the active tab
	Goto {
		url: String,
	},

	/// Go back in history
	Back,

	/// Go forward in history
	Forward,

	/// Reload the active tab
	Reload {
		/// Bypass the cache
		#[arg(long)]
		hard: bool,
	},

	/// Clear the browser cache
	ClearCache,

	/// List tabs, or switch with `tabs switch <index>`
	Tabs {
		#[command(subcommand)]
		action: Option<TabsAction>,
	},

	/// Click an element
	Click {
		selector: String,
	},

	/// Fill an input with text
	Fill {
		selector: String,
		text: String,
	},

	/// Fill an input with a secret that will be masked in HTML output
	FillSecret {
		selector: String,
		secret: String,
	},

	/// Type text into an element (per-character in human-like mode)
	Type {
		selector: String,
		text: String,
	},

	/// Press a key on the active page
	Press {
		key: String,
	},

	/// Scroll an element into view
	ScrollIntoView {
		selector: String,
	},

	/// Scroll to a percentage of the page height
	ScrollTo {
		percentage: f64,
	},

	/// Scroll down one viewport height
	NextChunk,

	/// Scroll up one viewport height
	PrevChunk,

	/// Fill the page's search input and submit
	FillSearch {
		query: String,
		/// Explicit input selector (skips the candidate scan)
		#[arg(short, long, value_name = "SELECTOR")]
		selector: Option<String>,
	},

	/// Set a select/input value and fire a change event
	Select {
		selector: String,
		value: String,
	},

	/// Submit the form enclosing an element
	Submit {
		selector: String,
	},

	/// Check whether a selector matches (exit 1 when absent)
	Exists {
		selector: String,
	},

	/// Check whether a selector matches a visible element (exit 1 when not)
	Visible {
		selector: String,
	},

	/// Count elements matching a selector
	Count {
		selector: String,
	},

	/// Read an attribute from an element
	Attr {
		selector: String,
		attribute: String,
	},

	/// Wait for a selector to become visible
	Wait {
		selector: String,
		/// Timeout in milliseconds
		#[arg(long, value_name = "MS")]
		timeout: Option<u64>,
	},

	/// Wait for the load event
	WaitLoad,

	/// Wait for the DOM to stop mutating
	WaitStable,

	/// Wait for the network to go idle
	WaitIdle,

	/// Print page HTML (secrets masked)
	Html {
		/// Tab index (defaults to active)
		#[arg(long)]
		page: Option<usize>,
	},

	/// Print the joined accessibility/DOM tree
	#[command(alias = "view-tree")]
	Tree,

	/// Extract visible text
	ExtractText {
		selector: Option<String>,
	},

	/// Capture a screenshot
	#[command(alias = "ss")]
	Screenshot {
		/// Capture the full scrollable page
		#[arg(long)]
		full_page: bool,
		/// Output file path
		#[arg(short, long, value_name = "FILE")]
		path: Option<PathBuf>,
	},

	/// Export the page as PDF
	Pdf {
		/// Paper format (Letter, Legal, A4, A3, Tabloid)
		#[arg(long, value_name = "FORMAT")]
		format: Option<String>,
		/// Output file path
		#[arg(short, long, value_name = "FILE")]
		path: Option<PathBuf>,
	},

	/// Download the resource behind an element's href/src
	Download {
		selector: String,
		/// Output file path
		#[arg(short, long, value_name = "FILE")]
		output: Option<PathBuf>,
	},

	/// Evaluate JavaScript in the active tab
	Eval {
		script: String,
	},

	/// Evaluate JavaScript and assert on the result (exit 1 on failure)
	Assert {
		script: String,
		/// Expected stringified value; without it, pass iff truthy
		#[arg(long)]
		expected: Option<String>,
		/// Message echoed with the outcome
		#[arg(long)]
		message: Option<String>,
	},

	/// Show captured console output
	Console {
		/// Kind filter, comma-separated (log,warning,error,info,debug,pageerror)
		#[arg(long = "type", value_name = "KINDS")]
		kind: Option<String>,
		/// Tab index filter
		#[arg(long)]
		tab: Option<usize>,
		/// Clear after reading
		#[arg(long)]
		clear: bool,
	},

	/// Show action history
	History {
		/// Clear instead of printing
		#[arg(long)]
		clear: bool,
	},
}

#[derive(Subcommand, Debug)]
pub enum TabsAction {
	/// Make the tab at the given index active
	Switch {
		index: usize,
	},
}

/// Parse a `WxH` viewport string.
pub fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
	let (w, h) = s
		.split_once(['x', 'X'])
		.ok_or_else(|| format!("viewport must be WxH, got: {s}"))?;
	let width = w.trim().parse::<u32>().map_err(|_| format!("bad viewport width: {w}"))?;
	let height = h.trim().parse::<u32>().map_err(|_| format!("bad viewport height: {h}"))?;
	if width == 0 || height == 0 {
		return Err(format!("viewport dimensions must be non-zero: {s}"));
	}
	Ok((width, height))
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[test]
	fn parses_default_name() {
		let cli = Cli::parse_from(["br", "list"]);
		assert_eq!(cli.name, "default");
	}

	#[test]
	fn parses_named_instance() {
		let cli = Cli::parse_from(["br", "--name", "work", "goto", "https://example.com"]);
		assert_eq!(cli.name, "work");
		match cli.command {
			Commands::Goto { url } => assert_eq!(url, "https://example.com"),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn tabs_switch_takes_index() {
		let cli = Cli::parse_from(["br", "tabs", "switch", "2"]);
		match cli.command {
			Commands::Tabs {
				action: Some(TabsAction::Switch { index }),
			} => assert_eq!(index, 2),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn viewport_parses() {
		assert_eq!(parse_viewport("1280x720").unwrap(), (1280, 720));
		assert_eq!(parse_viewport("1920X1080").unwrap(), (1920, 1080));
		assert!(parse_viewport("1280").is_err());
		assert!(parse_viewport("0x720").is_err());
	}

	#[test]
	fn adblock_base_round_trips() {
		for base in ["none", "adsandtrackers", "full", "ads"] {
			assert_eq!(base.parse::<AdblockBase>().unwrap().as_str(), base);
		}
	}
}
