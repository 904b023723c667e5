//! astcache CLI entry point.

use clap::Parser;
use astcache::cli::{self, Cli, EXIT_ERROR};
use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout stays clean for JSON output.
///
/// `ASTCACHE_LOG` takes precedence over `RUST_LOG`; without either, only
/// warnings are shown (debug with `--verbose`).
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("ASTCACHE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli::run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
