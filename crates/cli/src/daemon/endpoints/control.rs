use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use br_protocol::Ack;
use tracing::info;

use crate::daemon::Daemon;

/// `GET /health`
pub async fn health() -> &'static str {
	"ok"
}

/// `POST /shutdown` — reply, then tear down. The server drains in-flight
/// responses before the supervisor closes the browser.
pub async fn shutdown(State(daemon): State<Arc<Daemon>>) -> Json<Ack> {
	info!(target = "br.daemon", instance = %daemon.config.name, "shutdown via http");
	let _ = daemon.shutdown_tx.send(true);
	Json(Ack::ok())
}
