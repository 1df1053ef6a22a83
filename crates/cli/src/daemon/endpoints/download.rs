use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use br_protocol::{DownloadRequest, DownloadResult};
use serde_json::json;

use crate::browser::js;
use crate::browser::selector;
use crate::daemon::endpoints::{active_page, classify, record};
use crate::daemon::router::{ApiError, ApiResult};
use crate::daemon::{Daemon, output_dir};

/// `POST /download` — resolve the element, read `href` then `src`
/// (already resolved against `document.baseURI` in-page), and save the
/// resource. `data:` URLs decode directly; everything else is fetched
/// inside the page context so cookies and auth apply.
pub async fn download(
	State(daemon): State<Arc<Daemon>>,
	Json(body): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResult>> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;
	let sel = classify(&daemon, &body.selector).await?;

	let located = daemon.driver.evaluate(&page, &js::href_or_src_js(&sel)).await?;
	let element_found = located.get("found").and_then(|v| v.as_bool()).unwrap_or(false);
	if !element_found {
		return Err(ApiError::bad_request(selector::not_found_message(&body.selector)));
	}
	let Some(url) = located.get("url").and_then(|v| v.as_str()).map(str::to_string) else {
		return Err(ApiError::bad_request(format!(
			"element has no href or src: {}",
			body.selector
		)));
	};

	let bytes = if url.starts_with("data:") {
		decode_data_url(&url).map_err(ApiError::bad_request)?
	} else {
		let fetched = daemon.driver.evaluate(&page, &js::fetch_base64_js(&url)).await?;
		let ok = fetched.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
		if !ok {
			let status = fetched.get("status").and_then(|v| v.as_u64()).unwrap_or(0);
			return Err(ApiError::internal(format!("download failed: HTTP {status} for {url}")));
		}
		let encoded = fetched.get("base64").and_then(|v| v.as_str()).unwrap_or_default();
		BASE64
			.decode(encoded)
			.map_err(|e| ApiError::internal(format!("download payload decode failed: {e}")))?
	};

	let path = match body.output {
		Some(path) => path,
		None => output_dir().join(infer_filename(&url)),
	};
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent)
			.await
			.map_err(|e| ApiError::internal(format!("creating {}: {e}", parent.display())))?;
	}
	tokio::fs::write(&path, &bytes)
		.await
		.map_err(|e| ApiError::internal(format!("writing {}: {e}", path.display())))?;

	record(&daemon, "download", json!({ "selector": body.selector, "url": url })).await;
	Ok(Json(DownloadResult {
		path,
		size: bytes.len() as u64,
		url,
	}))
}

/// Decode `data:[<mediatype>][;base64],<payload>`.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, String> {
	let rest = url.strip_prefix("data:").ok_or_else(|| "not a data: URL".to_string())?;
	let (meta, payload) = rest.split_once(',').ok_or_else(|| format!("malformed data URL: {url}"))?;

	if meta.ends_with(";base64") {
		BASE64.decode(payload).map_err(|e| format!("bad base64 in data URL: {e}"))
	} else {
		Ok(percent_decode(payload))
	}
}

/// Minimal percent-decoding for non-base64 data URL payloads.
fn percent_decode(payload: &str) -> Vec<u8> {
	let bytes = payload.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			if let (Some(hi), Some(lo)) = (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
				out.push(hi << 4 | lo);
				i += 3;
				continue;
			}
		}
		out.push(bytes[i]);
		i += 1;
	}
	out
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
	byte.and_then(|b| (*b as char).to_digit(16)).map(|d| d as u8)
}

/// Pick an output filename from the URL path; `download.bin` when the
/// URL has no usable segment.
pub fn infer_filename(url: &str) -> String {
	if url.starts_with("data:") {
		return "download.bin".to_string();
	}
	url::Url::parse(url)
		.ok()
		.and_then(|u| {
			u.path_segments()
				.and_then(|segments| segments.filter(|s| !s.is_empty()).next_back().map(str::to_string))
		})
		.filter(|name| !name.is_empty())
		.unwrap_or_else(|| "download.bin".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn base64_data_url_decodes() {
		let bytes = decode_data_url("data:text/plain;base64,SGVsbG8gV29ybGQ=").unwrap();
		assert_eq!(bytes, b"Hello World");
		assert_eq!(bytes.len(), 11);
	}

	#[test]
	fn plain_data_url_percent_decodes() {
		let bytes = decode_data_url("data:text/plain,Hello%20World%21").unwrap();
		assert_eq!(bytes, b"Hello World!");
	}

	#[test]
	fn malformed_data_url_is_an_error() {
		assert!(decode_data_url("data:text/plain").is_err());
		assert!(decode_data_url("https://example.com").is_err());
	}

	#[test]
	fn filenames_come_from_the_last_path_segment() {
		assert_eq!(infer_filename("https://example.com/files/report.pdf?v=2"), "report.pdf");
		assert_eq!(infer_filename("https://example.com/files/"), "files");
		assert_eq!(infer_filename("https://example.com/"), "download.bin");
		assert_eq!(infer_filename("data:text/plain;base64,QQ=="), "download.bin");
	}
}
