//! LedgerSync reference server.

use clap::Parser;
use ledgersync_server::{LedgerServer, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Serves the LedgerSync remote store over HTTP.
#[derive(Parser)]
#[command(name = "ledgersync-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "LEDGERSYNC_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Route prefix (empty to mount at the root)
    #[arg(long, env = "LEDGERSYNC_API_PREFIX", default_value = "/api")]
    prefix: String,

    /// Maximum number of records accepted in one batch insert
    #[arg(long, default_value = "1000")]
    max_insert_batch: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("ledgersync_server=debug,tower_http=debug")
        } else {
            EnvFilter::new("ledgersync_server=info,tower_http=info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::new(cli.bind)
        .with_api_prefix(cli.prefix)
        .with_max_insert_batch(cli.max_insert_batch);
    let server = LedgerServer::new(config);

    let listener = tokio::net::TcpListener::bind(server.config().bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        prefix = %server.config().api_prefix,
        "ledger server listening"
    );

    axum::serve(listener, server.router()).await?;
    Ok(())
}
