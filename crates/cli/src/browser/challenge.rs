//! Bot-check interstitial detection and modal dismissal.
//!
//! Both are best-effort helpers on the screenshot/pdf path: a capture of
//! a Cloudflare spinner or a cookie wall is rarely what the caller
//! wanted. Interactive commands never wait on these.

use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;

use crate::browser::driver::{Driver, DriverResult, truthy};

/// Default bypass budget in seconds.
pub const BYPASS_MAX_SECONDS: u64 = 8;

const DETECT_POLL: Duration = Duration::from_millis(100);
const MODAL_SWEEP_MS: u64 = 2_500;

/// Close-button affordances worth trying, most specific first.
const CLOSE_SELECTORS: &[&str] = &[
	"[aria-label='Close']",
	"[aria-label='close']",
	"button.close",
	".modal.show .btn-close",
	".modal [data-dismiss='modal']",
	".modal [data-bs-dismiss='modal']",
	".popup-close",
	".overlay-close",
	"[class*='modal'] [class*='close']",
];

/// In-page check for known challenge screens. Returns the vendor tag or null.
fn detect_js() -> &'static str {
	r#"(() => {
		const title = document.title || '';
		if (title === 'Just a moment...') return 'cloudflare';
		if (window._cf_chl_opt) return 'cloudflare';
		for (const s of document.querySelectorAll('script[src]')) {
			if (s.src.includes('/cdn-cgi/challenge-platform/')) return 'cloudflare';
		}
		const refresh = document.querySelector('meta[http-equiv="refresh" i]');
		if (refresh && title.includes('moment')) return 'cloudflare';
		if (title === 'Robot Challenge Screen') return 'siteground';
		if (window.sgchallenge) return 'siteground';
		for (const s of document.querySelectorAll('script:not([src])')) {
			if (s.textContent && s.textContent.includes('sgchallenge')) return 'siteground';
		}
		return null;
	})()"#
}

/// Identify the challenge vendor on the current page, if any.
pub async fn detect_challenge(driver: &Driver, page: &Page) -> DriverResult<Option<String>> {
	let value = driver.evaluate(page, detect_js()).await?;
	Ok(value.as_str().map(str::to_string))
}

/// Poll until the challenge clears or the budget runs out. Returns true
/// when the page came back clean.
pub async fn wait_for_bypass(driver: &Driver, page: &Page, max_seconds: u64) -> bool {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(max_seconds);
	loop {
		match detect_challenge(driver, page).await {
			Ok(None) => return true,
			Ok(Some(vendor)) => {
				debug!(target = "br.daemon", vendor = %vendor, "waiting out challenge screen");
			}
			Err(_) => return true,
		}
		if tokio::time::Instant::now() >= deadline {
			return false;
		}
		tokio::time::sleep(DETECT_POLL).await;
	}
}

/// Fire Escape, then sweep the close-button list for up to 2.5 s,
/// clicking anything visible. Click failures are ignored.
pub async fn dismiss_modals(driver: &Driver, page: &Page) {
	let _ = driver.press(page, "Escape").await;

	let selectors = serde_json::to_string(CLOSE_SELECTORS).unwrap_or_else(|_| "[]".to_string());
	let sweep = format!(
		"(() => {{
			for (const candidate of {selectors}) {{
				for (const el of document.querySelectorAll(candidate)) {{
					const rect = el.getBoundingClientRect();
					if (rect.width > 0 && rect.height > 0) {{
						try {{ el.click(); }} catch (_) {{}}
						return true;
					}}
				}}
			}}
			return false;
		}})()"
	);

	let deadline = tokio::time::Instant::now() + Duration::from_millis(MODAL_SWEEP_MS);
	loop {
		match driver.evaluate(page, &sweep).await {
			Ok(value) if truthy(&value) => {}
			_ => return,
		}
		if tokio::time::Instant::now() >= deadline {
			return;
		}
		tokio::time::sleep(DETECT_POLL).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detect_script_names_both_vendors() {
		let js = detect_js();
		assert!(js.contains("Just a moment..."));
		assert!(js.contains("_cf_chl_opt"));
		assert!(js.contains("/cdn-cgi/challenge-platform/"));
		assert!(js.contains("Robot Challenge Screen"));
		assert!(js.contains("sgchallenge"));
	}

	#[test]
	fn close_selector_list_covers_bootstrap_and_aria() {
		assert!(CLOSE_SELECTORS.iter().any(|s| s.contains("aria-label")));
		assert!(CLOSE_SELECTORS.iter().any(|s| s.contains("data-bs-dismiss")));
	}
}
