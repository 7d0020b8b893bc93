use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use doc_triage::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doc_triage=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doc_triage=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = cli::execute(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
