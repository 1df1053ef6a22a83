use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::{AssertRequest, AssertOutcome, EvalRequest, EvalResult};
use serde_json::json;

use crate::browser::driver::truthy;
use crate::daemon::Daemon;
use crate::daemon::endpoints::{active_page, record};
use crate::daemon::router::ApiResult;

/// `POST /eval`
pub async fn eval(State(daemon): State<Arc<Daemon>>, Json(body): Json<EvalRequest>) -> ApiResult<Json<EvalResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let result = daemon.driver.evaluate(&page, &body.script).await?;

	record(&daemon, "eval", json!({ "script": body.script })).await;
	Ok(Json(EvalResult { result }))
}

/// `POST /assert` — always 200; the CLI maps `pass: false` to exit 1.
/// With `expected`, pass iff the stringified result is string-equal;
/// without it, pass iff the result is truthy.
pub async fn assert_script(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<AssertRequest>,
) -> ApiResult<Json<AssertOutcome>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let result = daemon.driver.evaluate(&page, &body.script).await?;
	let actual = stringify(&result);

	let pass = match &body.expected {
		Some(expected) => &actual == expected,
		None => truthy(&result),
	};

	Ok(Json(AssertOutcome {
		pass,
		actual,
		expected: body.expected,
		message: body.message,
	}))
}

/// Objects and arrays pretty-print as JSON; scalars use their literal
/// representation, so `"2"` compares equal to a numeric `2` result.
pub fn stringify(value: &serde_json::Value) -> String {
	match value {
		serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
			serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
		}
		serde_json::Value::String(s) => s.clone(),
		serde_json::Value::Null => "null".to_string(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn scalars_stringify_literally() {
		assert_eq!(stringify(&json!(2)), "2");
		assert_eq!(stringify(&json!(true)), "true");
		assert_eq!(stringify(&json!("abc")), "abc");
		assert_eq!(stringify(&json!(null)), "null");
	}

	#[test]
	fn objects_pretty_print() {
		let value = json!({ "a": 1 });
		let text = stringify(&value);
		assert!(text.contains('\n'));
		assert!(text.contains("\"a\": 1"));
	}
}
