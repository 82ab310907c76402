use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::args::Cli;
use cli::commands::FailureReport;
use sftpkit::config::types::Verbosity;
use sftpkit::SftpError;

fn main() {
    let cli = Cli::parse();

    // Convert CLI flags to verbosity level
    let verbosity = Verbosity::from((cli.quiet, cli.verbose));

    // RUST_LOG env var overrides CLI flags
    let filter = verbosity.as_tracing_filter();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr) // Keep stdout clean for output
        .init();

    tracing::debug!("Verbosity level: {:?}", verbosity);

    if let Err(err) = cli::commands::run(&cli) {
        if cli.soft_fail {
            report_soft_failure(&err);
            return;
        }
        display_error(&err);
        std::process::exit(1);
    }
}

/// Print the failure as a JSON result on stdout instead of failing the process.
fn report_soft_failure(err: &SftpError) {
    tracing::warn!("Soft failure: {}", err);
    match serde_json::to_string_pretty(&FailureReport::new(err)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            display_error(&SftpError::from(e));
            std::process::exit(1);
        }
    }
}

/// Display an SftpError with optional suggestion hint to stderr.
fn display_error(err: &SftpError) {
    eprintln!("error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  hint: {}", suggestion);
    }
}
