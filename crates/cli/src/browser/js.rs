//! In-page JavaScript builders.
//!
//! Every query uses the primitive matching the selector classification:
//! `document.querySelector(All)` for CSS, `document.evaluate` for XPath.
//! Snippets are IIFEs returning JSON-serializable values so the results
//! come back through `Runtime.evaluate` without extra plumbing.

use crate::browser::selector::Selector;

/// Quote a Rust string as a JS string literal.
pub fn js_string(value: &str) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Expression evaluating to the first matching element or `null`.
pub fn first_match_expr(selector: &Selector) -> String {
	let quoted = js_string(selector.query());
	if selector.is_xpath() {
		format!(
			"document.evaluate({quoted}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
		)
	} else {
		format!("document.querySelector({quoted})")
	}
}

/// Expression evaluating to an array of all matching elements.
pub fn all_matches_expr(selector: &Selector) -> String {
	let quoted = js_string(selector.query());
	if selector.is_xpath() {
		format!(
			"(() => {{
				const snap = document.evaluate({quoted}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
				const out = [];
				for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
				return out;
			}})()"
		)
	} else {
		format!("Array.from(document.querySelectorAll({quoted}))")
	}
}

pub fn exists_js(selector: &Selector) -> String {
	format!("(() => {{ return {} !== null; }})()", first_match_expr(selector))
}

pub fn visible_js(selector: &Selector) -> String {
	let target = first_match_expr(selector);
	format!(
		"(() => {{
			const el = {target};
			if (!el) return false;
			const rect = el.getBoundingClientRect();
			if (rect.width <= 0 || rect.height <= 0) return false;
			const style = window.getComputedStyle(el);
			return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0';
		}})()"
	)
}

pub fn count_js(selector: &Selector) -> String {
	format!("(() => {{ return {}.length; }})()", all_matches_expr(selector))
}

/// Returns `{element: bool, value: string|null}`; a present element with
/// a null value means the attribute is absent.
pub fn attr_js(selector: &Selector, attribute: &str) -> String {
	let target = first_match_expr(selector);
	let attr = js_string(attribute);
	format!(
		"(() => {{
			const el = {target};
			if (!el) return {{ element: false, value: null }};
			return {{ element: true, value: el.getAttribute({attr}) }};
		}})()"
	)
}

pub fn scroll_into_view_js(selector: &Selector) -> String {
	let target = first_match_expr(selector);
	format!(
		"(() => {{
			const el = {target};
			if (!el) return false;
			el.scrollIntoView({{ block: 'center' }});
			return true;
		}})()"
	)
}

/// Scroll to `pct`% of `body.scrollHeight`. The caller clamps.
pub fn scroll_to_js(pct: f64) -> String {
	format!("(() => {{ window.scrollTo(0, document.body.scrollHeight * {pct} / 100); return window.scrollY; }})()")
}

/// `delta` in viewport heights: +1 next chunk, -1 previous.
pub fn scroll_chunk_js(delta: i32) -> String {
	format!("(() => {{ window.scrollBy(0, window.innerHeight * {delta}); return window.scrollY; }})()")
}

/// Reads href then src off the first match, resolved against `baseURI`.
/// Returns `{found: bool, url: string|null}`.
pub fn href_or_src_js(selector: &Selector) -> String {
	let target = first_match_expr(selector);
	format!(
		"(() => {{
			const el = {target};
			if (!el) return {{ found: false, url: null }};
			const raw = el.getAttribute('href') ?? el.getAttribute('src');
			if (raw === null) return {{ found: true, url: null }};
			return {{ found: true, url: new URL(raw, document.baseURI).href }};
		}})()"
	)
}

/// Fetch a URL from inside the page (cookies and auth apply) and hand the
/// body back base64-encoded. Returns `{ok, status, base64}`.
pub fn fetch_base64_js(url: &str) -> String {
	let quoted = js_string(url);
	format!(
		"(async () => {{
			const resp = await fetch({quoted});
			if (!resp.ok) return {{ ok: false, status: resp.status, base64: null }};
			const buf = await resp.arrayBuffer();
			const bytes = new Uint8Array(buf);
			let binary = '';
			const chunk = 0x8000;
			for (let i = 0; i < bytes.length; i += chunk) {{
				binary += String.fromCharCode.apply(null, bytes.subarray(i, i + chunk));
			}}
			return {{ ok: true, status: resp.status, base64: btoa(binary) }};
		}})()"
	)
}

/// Visible text of matching elements (or `body` when `selector` is
/// `None`). Caps the match list; returns `{ok, count, text}` with
/// `ok: false` when the cap was exceeded.
pub fn extract_text_js(selector: Option<&Selector>, cap: usize) -> String {
	let collect = match selector {
		Some(sel) => all_matches_expr(sel),
		None => "[document.body]".to_string(),
	};
	format!(
		"(() => {{
			const els = {collect};
			if (els.length > {cap}) return {{ ok: false, count: els.length, text: '' }};
			const text = els.map(el => el.innerText ?? el.textContent ?? '').join('\\n');
			return {{ ok: true, count: els.length, text }};
		}})()"
	)
}

/// Ordered candidates for the search-input scan of `/fill-search`.
pub const SEARCH_INPUT_CANDIDATES: &[&str] = &[
	"input[type=search]",
	"input[name=q]",
	"input[name=query]",
	"input[name=search]",
	"input[placeholder*='search' i]",
	"input[placeholder*='find' i]",
	"[role=searchbox]",
];

/// First candidate selector with a match on the page, or `null`.
pub fn search_scan_js() -> String {
	let list = serde_json::to_string(SEARCH_INPUT_CANDIDATES).unwrap_or_else(|_| "[]".to_string());
	format!(
		"(() => {{
			for (const candidate of {list}) {{
				if (document.querySelector(candidate)) return candidate;
			}}
			return null;
		}})()"
	)
}

/// `document.readyState` has left 'loading'.
pub const DOM_CONTENT_LOADED_JS: &str = "document.readyState !== 'loading'";

/// Full load event fired.
pub const LOAD_COMPLETE_JS: &str = "document.readyState === 'complete'";

/// Resolves once no DOM mutations happen for `quiet_ms`, capped at
/// `timeout_ms`. Resolves `true` on quiet, `false` on cap.
pub fn dom_stable_js(quiet_ms: u64, timeout_ms: u64) -> String {
	format!(
		"new Promise(resolve => {{
			let timer = null;
			const done = (value) => {{ observer.disconnect(); clearTimeout(cap); resolve(value); }};
			const observer = new MutationObserver(() => {{
				clearTimeout(timer);
				timer = setTimeout(() => done(true), {quiet_ms});
			}});
			observer.observe(document.documentElement, {{ childList: true, subtree: true, attributes: true, characterData: true }});
			timer = setTimeout(() => done(true), {quiet_ms});
			const cap = setTimeout(() => done(false), {timeout_ms});
		}})"
	)
}

/// Network-idle approximation: load event done, then no new resource
/// timing entries for `quiet_ms`. Resolves `true` on idle, `false` on cap.
pub fn network_idle_js(quiet_ms: u64, timeout_ms: u64) -> String {
	format!(
		"new Promise(resolve => {{
			const start = Date.now();
			let last = performance.getEntriesByType('resource').length;
			let lastChange = Date.now();
			const tick = setInterval(() => {{
				const now = performance.getEntriesByType('resource').length;
				if (now !== last) {{ last = now; lastChange = Date.now(); }}
				const loaded = document.readyState === 'complete';
				if (loaded && Date.now() - lastChange >= {quiet_ms}) {{ clearInterval(tick); resolve(true); }}
				if (Date.now() - start >= {timeout_ms}) {{ clearInterval(tick); resolve(false); }}
			}}, 100);
		}})"
	)
}

/// Element-scoped function declarations for `Runtime.callFunctionOn`.
pub mod on_element {
	/// Set a value the way a user would: native setter (framework change
	/// trackers hook the prototype), then input+change events.
	pub const FILL: &str = "function(value) {
		const proto = this instanceof HTMLTextAreaElement
			? HTMLTextAreaElement.prototype
			: this instanceof HTMLSelectElement
				? HTMLSelectElement.prototype
				: HTMLInputElement.prototype;
		const desc = Object.getOwnPropertyDescriptor(proto, 'value');
		if (desc && desc.set) { desc.set.call(this, value); } else { this.value = value; }
		this.dispatchEvent(new Event('input', { bubbles: true }));
		this.dispatchEvent(new Event('change', { bubbles: true }));
	}";

	/// `/select`: assign and fire a bubbling change event.
	pub const SELECT_VALUE: &str = "function(value) {
		this.value = value;
		this.dispatchEvent(new Event('change', { bubbles: true }));
		return this.value;
	}";

	/// `/submit`: walk to the enclosing form (or self) and submit.
	/// Returns false when there is no form.
	pub const SUBMIT_FORM: &str = "function() {
		const form = this.tagName === 'FORM' ? this : this.closest('form');
		if (!form) return false;
		form.submit();
		return true;
	}";
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::browser::selector::Selector;

	#[test]
	fn css_uses_query_selector() {
		let sel = Selector::Css("button.go".into());
		assert!(first_match_expr(&sel).contains("document.querySelector(\"button.go\")"));
		assert!(!first_match_expr(&sel).contains("evaluate"));
	}

	#[test]
	fn xpath_uses_document_evaluate() {
		let sel = Selector::XPath("//button[1]".into());
		assert!(first_match_expr(&sel).contains("document.evaluate"));
	}

	#[test]
	fn quoting_survives_embedded_quotes() {
		let sel = Selector::Css("a[title=\"it's\"]".into());
		let expr = first_match_expr(&sel);
		assert!(expr.contains("a[title="));
		// The embedded double quote must arrive escaped, not raw.
		assert!(expr.contains("\\\""));
	}

	#[test]
	fn extract_text_defaults_to_body() {
		let js = extract_text_js(None, 1000);
		assert!(js.contains("[document.body]"));
	}
}
