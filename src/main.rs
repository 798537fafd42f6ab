use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use verlof::cli::{Cli, not_found_hint};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let result = cli.run().await;
    if let Some(hint) = result.as_ref().err().and_then(not_found_hint) {
        eprintln!("{hint}");
    }
    result
}

/// Logs go to stderr. RUST_LOG wins over -v.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("verlof={default_level},sqlx=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
