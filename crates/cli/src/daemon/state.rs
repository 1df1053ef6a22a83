//! Per-instance mutable state.
//!
//! Everything a daemon accumulates over its life sits in one bag behind
//! one lock: the tab list, action history, console ring, secret mask
//! set, and the id→xpath map from the last tree view. Endpoint handlers
//! take the lock briefly for mutation; browser operations themselves are
//! serialized separately by the daemon's op gate.

use std::collections::{HashMap, VecDeque};

use br_protocol::{ConsoleEntry, ConsoleKind, HistoryEntry, TabInfo};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::target::TargetId;

/// Console ring bound; oldest entries drop first on overflow.
pub const CONSOLE_RING_CAPACITY: usize = 1000;

/// Replacement token for masked secrets.
pub const SECRET_MASK: &str = "***";

/// One tab: a stable identity plus the driver page handle. The handle is
/// a cheap clone of the driver's connection, not an owning reference;
/// the tab's position in [`InstanceState::tabs`] is its public index.
#[derive(Clone)]
pub struct Tab {
	pub target_id: TargetId,
	pub page: Page,
	/// Last URL observed by the daemon, used for console entries.
	pub url: String,
}

/// The state bag. Single-writer discipline: mutate only while holding
/// the daemon's state lock.
#[derive(Default)]
pub struct InstanceState {
	pub tabs: Vec<Tab>,
	pub active: usize,
	history: Vec<HistoryEntry>,
	console: VecDeque<ConsoleEntry>,
	secrets: Vec<String>,
	id_xpath: HashMap<u64, String>,
}

impl InstanceState {
	/// Active tab handle plus its index. `None` when no tabs are open,
	/// which every tab-dependent endpoint reports as a recoverable error.
	pub fn active_tab(&self) -> Option<(Page, usize)> {
		self.tabs.get(self.active).map(|tab| (tab.page.clone(), self.active))
	}

	pub fn tab_at(&self, index: usize) -> Option<Page> {
		self.tabs.get(index).map(|tab| tab.page.clone())
	}

	pub fn set_active_tab(&mut self, index: usize) -> bool {
		if index < self.tabs.len() {
			self.active = index;
			true
		} else {
			false
		}
	}

	pub fn tab_index_of(&self, target_id: &TargetId) -> Option<usize> {
		self.tabs.iter().position(|tab| &tab.target_id == target_id)
	}

	pub fn tab_infos(&self, titles: &[String], urls: &[String]) -> Vec<TabInfo> {
		self.tabs
			.iter()
			.enumerate()
			.map(|(index, _)| TabInfo {
				index,
				title: titles.get(index).cloned().unwrap_or_default(),
				url: urls.get(index).cloned().unwrap_or_default(),
				is_active: index == self.active,
			})
			.collect()
	}

	pub fn append_history(&mut self, action: &str, args: serde_json::Value) {
		self.history.push(HistoryEntry {
			action: action.to_string(),
			args,
			timestamp: now_iso(),
		});
	}

	pub fn history(&self) -> &[HistoryEntry] {
		&self.history
	}

	pub fn clear_history(&mut self) {
		self.history.clear();
	}

	pub fn push_console(&mut self, kind: ConsoleKind, text: String, url: String, tab: usize) {
		if self.console.len() >= CONSOLE_RING_CAPACITY {
			self.console.pop_front();
		}
		self.console.push_back(ConsoleEntry {
			kind,
			text,
			timestamp: now_iso(),
			url,
			tab,
		});
	}

	pub fn console(&self) -> impl Iterator<Item = &ConsoleEntry> {
		self.console.iter()
	}

	pub fn clear_console(&mut self) {
		self.console.clear();
	}

	/// Navigation of a tab invalidates that tab's captured output only.
	pub fn drop_console_for_tab(&mut self, tab: usize) {
		self.console.retain(|entry| entry.tab != tab);
	}

	/// Remove console entries matching a kind/tab filter, as `GET
	/// /console?clear=true` does after reading.
	pub fn drop_console_matching(&mut self, kinds: Option<&[ConsoleKind]>, tab: Option<usize>) {
		self.console.retain(|entry| {
			let kind_hit = kinds.is_none_or(|ks| ks.contains(&entry.kind));
			let tab_hit = tab.is_none_or(|t| entry.tab == t);
			!(kind_hit && tab_hit)
		});
	}

	/// Secrets only ever accumulate; there is no unmask.
	pub fn add_secret(&mut self, secret: String) {
		if !secret.is_empty() && !self.secrets.contains(&secret) {
			self.secrets.push(secret);
		}
	}

	/// Replace every known secret in page HTML with the mask token.
	pub fn mask_secrets(&self, html: &str) -> String {
		let mut out = html.to_string();
		for secret in &self.secrets {
			out = out.replace(secret.as_str(), SECRET_MASK);
		}
		out
	}

	pub fn replace_id_xpath_map(&mut self, map: HashMap<u64, String>) {
		self.id_xpath = map;
	}

	pub fn id_xpath(&self) -> &HashMap<u64, String> {
		&self.id_xpath
	}
}

/// ISO-8601 timestamp for history and console entries.
pub fn now_iso() -> String {
	chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Human-like pacing: sleep a jittered interval when the mode is on.
/// All three human-like effects (navigation brackets, click lead-in,
/// per-character typing) route through here.
pub async fn maybe_delay(enabled: bool, lo_ms: u64, hi_ms: u64) {
	if !enabled {
		return;
	}
	let ms = {
		use rand::Rng;
		rand::thread_rng().gen_range(lo_ms..=hi_ms)
	};
	tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn console_ring_drops_oldest_past_capacity() {
		let mut state = InstanceState::default();
		for i in 0..1500 {
			state.push_console(ConsoleKind::Log, format!("msg {i}"), String::new(), 0);
		}
		let entries: Vec<_> = state.console().collect();
		assert_eq!(entries.len(), CONSOLE_RING_CAPACITY);
		// The 500 oldest are gone; the survivors start at msg 500.
		assert_eq!(entries[0].text, "msg 500");
		assert_eq!(entries.last().unwrap().text, "msg 1499");
	}

	#[test]
	fn navigation_clears_only_the_navigated_tab() {
		let mut state = InstanceState::default();
		state.push_console(ConsoleKind::Log, "tab0".into(), String::new(), 0);
		state.push_console(ConsoleKind::Error, "tab1".into(), String::new(), 1);
		state.drop_console_for_tab(0);

		let entries: Vec<_> = state.console().collect();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].text, "tab1");
	}

	#[test]
	fn filtered_clear_respects_kind_and_tab() {
		let mut state = InstanceState::default();
		state.push_console(ConsoleKind::Log, "keep".into(), String::new(), 0);
		state.push_console(ConsoleKind::Error, "drop".into(), String::new(), 0);
		state.push_console(ConsoleKind::Error, "other tab".into(), String::new(), 1);

		state.drop_console_matching(Some(&[ConsoleKind::Error]), Some(0));

		let texts: Vec<_> = state.console().map(|e| e.text.as_str()).collect();
		assert_eq!(texts, vec!["keep", "other tab"]);
	}

	#[test]
	fn secrets_mask_every_occurrence() {
		let mut state = InstanceState::default();
		state.add_secret("hunter2".into());
		let html = "<input value=\"hunter2\"><p>hunter2 said hunter2</p>";
		let masked = state.mask_secrets(html);
		assert!(!masked.contains("hunter2"));
		assert_eq!(masked.matches(SECRET_MASK).count(), 3);
	}

	#[test]
	fn secrets_accumulate_without_duplicates() {
		let mut state = InstanceState::default();
		state.add_secret("a".into());
		state.add_secret("a".into());
		state.add_secret("b".into());
		state.add_secret(String::new());
		let masked = state.mask_secrets("a b");
		assert_eq!(masked, "*** ***");
	}

	#[test]
	fn history_appends_in_order_and_clears() {
		let mut state = InstanceState::default();
		state.append_history("goto", serde_json::json!({"url": "https://example.com"}));
		state.append_history("click", serde_json::json!({"selector": "#go"}));

		assert_eq!(state.history().len(), 2);
		assert_eq!(state.history()[0].action, "goto");
		assert!(!state.history()[0].timestamp.is_empty());

		state.clear_history();
		assert!(state.history().is_empty());
	}

	#[test]
	fn active_tab_is_none_when_empty() {
		let state = InstanceState::default();
		assert!(state.active_tab().is_none());
		assert!(!InstanceState::default().set_active_tab(0));
	}
}
