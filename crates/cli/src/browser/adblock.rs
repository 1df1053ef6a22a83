//! Opaque ad-block filter activator.
//!
//! Real filter-engine semantics live outside this crate; the daemon only
//! needs "given a level and some lists, stop matching requests on every
//! page". Patterns are applied per page through `Network.setBlockedURLs`
//! when the supervisor sees the page.

use std::path::Path;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use tracing::{debug, warn};

/// Ad-serving hosts blocked at every level except `none`.
const ADS_PATTERNS: &[&str] = &[
	"*doubleclick.net*",
	"*googlesyndication.com*",
	"*googleadservices.com*",
	"*adservice.google.*",
	"*amazon-adsystem.com*",
	"*adnxs.com*",
	"*criteo.com*",
	"*taboola.com*",
	"*outbrain.com*",
];

/// Tracker hosts added by `adsandtrackers` and `full`.
const TRACKER_PATTERNS: &[&str] = &[
	"*google-analytics.com*",
	"*googletagmanager.com*",
	"*hotjar.com*",
	"*segment.io*",
	"*mixpanel.com*",
	"*scorecardresearch.com*",
	"*quantserve.com*",
	"*facebook.net/en_US/fbevents.js*",
];

/// Annoyance sources added only by `full`.
const ANNOYANCE_PATTERNS: &[&str] = &[
	"*onesignal.com*",
	"*pushwoosh.com*",
	"*intercom.io*",
	"*drift.com*",
];

/// Compiled pattern set, ready to arm on any page.
#[derive(Debug, Clone, Default)]
pub struct Adblocker {
	patterns: Vec<String>,
}

impl Adblocker {
	/// Build from a base level plus extra filter lists (file paths or
	/// URLs). List lines use a loose filter syntax: blank lines and
	/// `!`/`#` comments are skipped, `||host^` anchors become host
	/// wildcards, anything else passes through as a URL pattern.
	pub async fn build(base: &str, extra_lists: &[String]) -> Result<Self> {
		let mut patterns: Vec<String> = Vec::new();

		match base {
			"none" => {}
			"ads" => patterns.extend(ADS_PATTERNS.iter().map(|p| p.to_string())),
			"full" => {
				patterns.extend(ADS_PATTERNS.iter().map(|p| p.to_string()));
				patterns.extend(TRACKER_PATTERNS.iter().map(|p| p.to_string()));
				patterns.extend(ANNOYANCE_PATTERNS.iter().map(|p| p.to_string()));
			}
			// "adsandtrackers" and anything unrecognized get the default set.
			_ => {
				patterns.extend(ADS_PATTERNS.iter().map(|p| p.to_string()));
				patterns.extend(TRACKER_PATTERNS.iter().map(|p| p.to_string()));
			}
		}

		for source in extra_lists {
			match load_list(source).await {
				Ok(content) => patterns.extend(parse_list(&content)),
				Err(err) => warn!(target = "br.daemon", source = %source, error = %err, "skipping filter list"),
			}
		}

		patterns.sort();
		patterns.dedup();
		Ok(Self { patterns })
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	pub fn pattern_count(&self) -> usize {
		self.patterns.len()
	}

	/// Arm the pattern set on one page.
	pub async fn apply(&self, page: &Page) -> Result<()> {
		if self.patterns.is_empty() {
			return Ok(());
		}
		page.execute(EnableParams::default()).await.context("enabling network domain")?;
		page.execute(SetBlockedUrLsParams {
			urls: self.patterns.clone(),
		})
		.await
		.context("setting blocked url patterns")?;
		debug!(target = "br.daemon", patterns = self.patterns.len(), "ad-block armed on page");
		Ok(())
	}
}

async fn load_list(source: &str) -> Result<String> {
	if source.starts_with("http://") || source.starts_with("https://") {
		let response = reqwest::get(source).await.with_context(|| format!("fetching {source}"))?;
		Ok(response.text().await?)
	} else {
		std::fs::read_to_string(Path::new(source)).with_context(|| format!("reading {source}"))
	}
}

/// Translate list lines into `Network.setBlockedURLs` wildcards.
pub fn parse_list(content: &str) -> Vec<String> {
	content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('!') && !line.starts_with('#') && !line.starts_with('['))
		.map(|line| {
			if let Some(host) = line.strip_prefix("||") {
				format!("*{}*", host.trim_end_matches('^'))
			} else if line.contains('*') {
				line.to_string()
			} else {
				format!("*{line}*")
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn list_parsing_skips_comments_and_anchors_hosts() {
		let content = "! comment\n# other comment\n[Adblock Plus 2.0]\n\n||ads.example.com^\n*tracking.js*\nbanner.example.net\n";
		let patterns = parse_list(content);
		assert_eq!(
			patterns,
			vec!["*ads.example.com*", "*tracking.js*", "*banner.example.net*"]
		);
	}

	#[tokio::test]
	async fn base_levels_grow_monotonically() {
		let none = Adblocker::build("none", &[]).await.unwrap();
		let ads = Adblocker::build("ads", &[]).await.unwrap();
		let default = Adblocker::build("adsandtrackers", &[]).await.unwrap();
		let full = Adblocker::build("full", &[]).await.unwrap();

		assert!(none.is_empty());
		assert!(ads.pattern_count() > 0);
		assert!(default.pattern_count() > ads.pattern_count());
		assert!(full.pattern_count() > default.pattern_count());
	}

	#[tokio::test]
	async fn file_lists_merge_into_the_set() {
		let tmp = tempfile::TempDir::new().unwrap();
		let list = tmp.path().join("extra.txt");
		std::fs::write(&list, "||custom.example^\n").unwrap();

		let blocker = Adblocker::build("none", &[list.to_string_lossy().into_owned()]).await.unwrap();
		assert_eq!(blocker.pattern_count(), 1);
	}
}
