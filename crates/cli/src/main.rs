use br_cli::cli::Cli;
use br_cli::error::BrError;
use br_cli::{commands, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(code) => std::process::exit(code),
		Err(err) => {
			handle_error(&err);
			std::process::exit(err.exit_code());
		}
	}
}

fn handle_error(err: &BrError) {
	use colored::Colorize;
	eprintln!("{} {err}", "error:".red().bold());
}
