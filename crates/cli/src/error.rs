use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrError>;

/// CLI-side errors. Exit codes follow the contract: 0 success, 1 for
/// negative check results (handled by the dispatcher, never an error),
/// 2 for everything that stops the command.
#[derive(Debug, Error)]
pub enum BrError {
	#[error("Daemon is not running. Start one with `br start`")]
	DaemonNotRunning,

	#[error("{message}")]
	Daemon {
		/// HTTP status the daemon replied with.
		status: u16,
		message: String,
	},

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("daemon failed to start: {0}")]
	StartFailed(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl BrError {
	/// Map to the CLI exit code. Every error path exits 2; the check
	/// commands (`exists`, `visible`, `assert`) reach exit 1 through
	/// their 200-with-false responses, not through errors.
	pub fn exit_code(&self) -> i32 {
		2
	}
}

/// True when a reqwest failure means "nothing is listening there".
///
/// Connection-refused class transport errors are how the CLI discovers
/// a stale registry entry or a never-started daemon.
pub fn is_not_running_error(err: &reqwest::Error) -> bool {
	if err.is_connect() || err.is_timeout() {
		return true;
	}

	let msg = err.to_string().to_ascii_lowercase();
	msg.contains("connection refused")
		|| msg.contains("connection reset")
		|| msg.contains("error trying to connect")
		|| msg.contains("tcp connect error")
		|| msg.contains("connection closed before message completed")
}
