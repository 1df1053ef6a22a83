//! Selector token classification.
//!
//! Callers address elements three ways: numeric accessibility ids from
//! the last tree view, XPath expressions, and CSS selectors. The
//! classification is deterministic and first-match-wins, so an agent can
//! predict exactly how a token will be interpreted.

use std::collections::HashMap;

/// A classified selector token. Numeric ids resolve through the current
/// id→xpath map at classification time and carry the resolved XPath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
	/// Accessibility node id plus the XPath it resolved to.
	AxId(u64, String),
	XPath(String),
	Css(String),
}

impl Selector {
	/// The effective query string sent to the page.
	pub fn query(&self) -> &str {
		match self {
			Selector::AxId(_, xpath) => xpath,
			Selector::XPath(xpath) => xpath,
			Selector::Css(css) => css,
		}
	}

	/// True when the query must run through `document.evaluate`.
	pub fn is_xpath(&self) -> bool {
		matches!(self, Selector::AxId(..) | Selector::XPath(_))
	}
}

/// Classification failure: a numeric token without a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAxId {
	pub token: String,
	pub id: u64,
}

impl UnknownAxId {
	/// 400-class message carrying the token and the accepted forms.
	pub fn message(&self) -> String {
		format!(
			"XPath not found for ID {}. Selectors may be a numeric id from the last tree view, \
			 an XPath (starting with xpath=, / or (), or a CSS selector",
			self.id
		)
	}
}

/// Classify a token against the current id→xpath map.
///
/// Order matters: a decimal token that happens to be a known AX id is an
/// id even if it would also parse as CSS; `xpath=`/`/`/`(` prefixes win
/// over CSS; everything else is CSS.
pub fn classify(token: &str, id_xpath: &HashMap<u64, String>) -> Result<Selector, UnknownAxId> {
	let trimmed = token.trim();

	if let Ok(id) = trimmed.parse::<u64>() {
		return match id_xpath.get(&id) {
			Some(xpath) => Ok(Selector::AxId(id, xpath.clone())),
			None => Err(UnknownAxId {
				token: token.to_string(),
				id,
			}),
		};
	}

	if let Some(rest) = trimmed.strip_prefix("xpath=") {
		return Ok(Selector::XPath(rest.to_string()));
	}
	if trimmed.starts_with('/') || trimmed.starts_with('(') {
		return Ok(Selector::XPath(trimmed.to_string()));
	}

	Ok(Selector::Css(trimmed.to_string()))
}

/// Hint appended to "element not found" responses.
pub fn not_found_message(token: &str) -> String {
	format!(
		"Element not found for selector: {token}. Selectors may be a numeric id from the last \
		 tree view, an XPath (starting with xpath=, / or (), or a CSS selector"
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn map_with(id: u64, xpath: &str) -> HashMap<u64, String> {
		let mut map = HashMap::new();
		map.insert(id, xpath.to_string());
		map
	}

	#[test]
	fn known_numeric_id_resolves_to_xpath() {
		let map = map_with(42, "/html/body");
		match classify("42", &map) {
			Ok(Selector::AxId(42, xpath)) => assert_eq!(xpath, "/html/body"),
			other => panic!("unexpected: {other:?}"),
		}
	}

	#[test]
	fn unknown_numeric_id_is_an_error() {
		let err = classify("42", &HashMap::new()).unwrap_err();
		assert_eq!(err.id, 42);
		assert!(err.message().contains("XPath not found for ID 42"));
	}

	#[test]
	fn css_token_is_css() {
		let sel = classify("button.submit", &HashMap::new()).unwrap();
		assert_eq!(sel, Selector::Css("button.submit".into()));
		assert!(!sel.is_xpath());
	}

	#[test]
	fn slash_prefix_is_xpath() {
		let sel = classify("//button[1]", &HashMap::new()).unwrap();
		assert_eq!(sel, Selector::XPath("//button[1]".into()));
		assert!(sel.is_xpath());
	}

	#[test]
	fn paren_prefix_is_xpath() {
		let sel = classify("(//a)[2]", &HashMap::new()).unwrap();
		assert_eq!(sel, Selector::XPath("(//a)[2]".into()));
	}

	#[test]
	fn explicit_xpath_prefix_is_stripped() {
		let sel = classify("xpath=//div[@id='x']", &HashMap::new()).unwrap();
		assert_eq!(sel, Selector::XPath("//div[@id='x']".into()));
	}

	#[test]
	fn numeric_id_wins_over_css_tag_lookalike() {
		// "42" could be a (useless) CSS selector; a populated map claims it first.
		let map = map_with(42, "/html/body/ul/li[1]");
		assert!(matches!(classify("42", &map), Ok(Selector::AxId(42, _))));
	}
}
