use anyhow::Result;
use clap::Parser;

use shipbatch::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shipbatch=info")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}
