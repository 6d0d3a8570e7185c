use clap::Parser;

use adops::cli::{run, Cli};
use adops::commands::Console;
use adops::logging;

fn main() {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let guard = logging::init_logging(cli.log_dir.as_deref(), cli.verbose);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "adops starting");

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "adops failed");
            Console { json: cli.json }.fail(&e);
            e.exit_code()
        }
    };

    drop(guard);
    std::process::exit(code);
}
