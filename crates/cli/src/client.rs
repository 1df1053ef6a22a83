//! HTTP client for a running daemon.
//!
//! Connection-refused class failures collapse into
//! [`BrError::DaemonNotRunning`] so every command can report the same
//! actionable message (and the same exit code 2) whether the registry
//! entry was stale or never existed.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BrError, Result, is_not_running_error};
use crate::registry::Registry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DaemonClient {
	http: reqwest::Client,
	base: String,
}

impl DaemonClient {
	/// Resolve an instance by name through the registry.
	pub fn connect(registry: &Registry, name: &str) -> Result<Self> {
		let map = registry.read()?;
		let record = map.get(name).ok_or(BrError::DaemonNotRunning)?;
		Self::for_port(record.port)
	}

	/// Client for a known port (used by `start` while health-polling).
	pub fn for_port(port: u16) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			http,
			base: format!("http://127.0.0.1:{port}"),
		})
	}

	/// Quick liveness probe; false covers both "refused" and "not ok".
	pub async fn is_healthy(&self) -> bool {
		let request = self.http.get(format!("{}/health", self.base)).timeout(PROBE_TIMEOUT);
		match request.send().await {
			Ok(response) => response.status().is_success(),
			Err(_) => false,
		}
	}

	pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
		let response = self.send(self.http.get(self.url(path)).query(query)).await?;
		Ok(response.json().await?)
	}

	pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
		let response = self.send(self.http.get(self.url(path)).query(query)).await?;
		Ok(response.text().await?)
	}

	pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
		let response = self.send(self.http.post(self.url(path)).json(body)).await?;
		Ok(response.json().await?)
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base)
	}

	/// Send, translating transport failures and non-2xx statuses into
	/// [`BrError`] variants the dispatcher understands.
	async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
		let response = request.send().await.map_err(|err| {
			if is_not_running_error(&err) {
				BrError::DaemonNotRunning
			} else {
				BrError::Http(err)
			}
		})?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let message = response.text().await.unwrap_or_default();
		Err(BrError::Daemon {
			status: status.as_u16(),
			message: if message.is_empty() {
				format!("daemon replied with status {status}")
			} else {
				message
			},
		})
	}
}
