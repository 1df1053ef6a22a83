use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use br_protocol::{PdfQuery, ScreenshotQuery};
use chromiumoxide::Page;
use serde_json::json;

use crate::browser::challenge;
use crate::browser::driver::PaperFormat;
use crate::daemon::endpoints::{active_page, record};
use crate::daemon::router::{ApiError, ApiResult};
use crate::daemon::{Daemon, output_dir};

/// `GET /screenshot` — PNG to disk, path echoed as plain text. Modals
/// are dismissed and challenge screens waited out first; a capture of a
/// Cloudflare spinner helps nobody.
pub async fn screenshot(State(daemon): State<Arc<Daemon>>, Query(query): Query<ScreenshotQuery>) -> ApiResult<Response> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	challenge::dismiss_modals(&daemon.driver, &page).await;
	challenge::wait_for_bypass(&daemon.driver, &page, challenge::BYPASS_MAX_SECONDS).await;

	let full_page = query.full_page.unwrap_or(false);
	let bytes = daemon.driver.screenshot(&page, full_page).await?;

	let path = match query.path {
		Some(path) => path,
		None => default_artifact_path(&page, "shot", "png").await,
	};
	write_artifact(&path, &bytes).await?;

	record(&daemon, "screenshot", json!({ "path": path, "fullPage": full_page })).await;
	Ok(path.to_string_lossy().into_owned().into_response())
}

/// `GET /pdf` — same flow, Letter by default.
pub async fn pdf(State(daemon): State<Arc<Daemon>>, Query(query): Query<PdfQuery>) -> ApiResult<Response> {
	let _gate = daemon.op_gate.lock().await;
	let (page, _) = active_page(&daemon).await?;

	let format = match &query.format {
		Some(name) => PaperFormat::parse(name)
			.ok_or_else(|| ApiError::bad_request(format!("unknown pdf format: {name}")))?,
		None => PaperFormat::Letter,
	};

	challenge::dismiss_modals(&daemon.driver, &page).await;
	challenge::wait_for_bypass(&daemon.driver, &page, challenge::BYPASS_MAX_SECONDS).await;

	let bytes = daemon.driver.pdf(&page, format).await?;

	let path = match query.path {
		Some(path) => path,
		None => default_artifact_path(&page, "page", "pdf").await,
	};
	write_artifact(&path, &bytes).await?;

	record(&daemon, "pdf", json!({ "path": path })).await;
	Ok(path.to_string_lossy().into_owned().into_response())
}

async fn default_artifact_path(page: &Page, prefix: &str, ext: &str) -> PathBuf {
	let url = page.url().await.ok().flatten().unwrap_or_default();
	let epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
	output_dir().join(format!("{prefix}-{}-{epoch}.{ext}", domain_slug(&url)))
}

async fn write_artifact(path: &PathBuf, bytes: &[u8]) -> ApiResult<()> {
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent)
			.await
			.map_err(|e| ApiError::internal(format!("creating {}: {e}", parent.display())))?;
	}
	tokio::fs::write(path, bytes)
		.await
		.map_err(|e| ApiError::internal(format!("writing {}: {e}", path.display())))
}

/// Filesystem-safe slug of a URL's host. `local` when there is none
/// (about:blank, data: URLs, files).
pub fn domain_slug(url: &str) -> String {
	let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string));
	match host {
		Some(host) if !host.is_empty() => host
			.chars()
			.map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
			.collect(),
		_ => "local".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn domain_slug_flattens_hosts() {
		assert_eq!(domain_slug("https://www.example.com/path?q=1"), "www-example-com");
		assert_eq!(domain_slug("http://127.0.0.1:3030/"), "127-0-0-1");
	}

	#[test]
	fn hostless_urls_slug_to_local() {
		assert_eq!(domain_slug("about:blank"), "local");
		assert_eq!(domain_slug("data:text/html,<p>x</p>"), "local");
		assert_eq!(domain_slug(""), "local");
	}
}
