//! `filehub-cli`: inspect the journal and reconcile a tree from the shell.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so table and JSON output stay pipeable.
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.execute().await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}
