use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaultline_client::{ClientConfig, ClientDriver};
use vaultline_common::{
    config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SEARCH_EXTENSION, DEFAULT_SEARCH_WORKERS},
    ParallelSearch, SharedKey,
};
use vaultline_demo::spawn_server_thread;
use vaultline_server::{ReverseProcessor, ServerConfig};

#[derive(Parser)]
#[command(name = "vaultline-demo")]
#[command(about = "Run server, client and parallel search in one process")]
struct Args {
    /// Host for the in-process server
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the in-process server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Message the client sends
    #[arg(short, long, default_value = "Hello from async client!")]
    message: String,

    /// Directory to search after the exchange
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// File name suffix to search for
    #[arg(long, default_value = DEFAULT_SEARCH_EXTENSION)]
    ext: String,

    /// Search worker threads
    #[arg(long, default_value_t = DEFAULT_SEARCH_WORKERS)]
    workers: usize,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let key = SharedKey::from_env_or_generate().context("Failed to load shared key")?;

    let server_config = ServerConfig::new().with_host(&args.host).with_port(args.port);
    let server = spawn_server_thread(server_config, &key, ReverseProcessor::new())
        .context("Failed to start server")?;

    let client_config = ClientConfig::new()
        .with_host(server.local_addr.ip().to_string())
        .with_port(server.local_addr.port())
        .with_timeout(Duration::from_secs(10));
    let driver = ClientDriver::new(client_config, &key);

    info!("Sending: {}", args.message);
    let reply = driver.run_blocking(&args.message).context("Client exchange failed")?;
    println!("Server responded: {reply}");

    let found = ParallelSearch::new(args.workers)
        .search(&args.root, &args.ext)
        .context("Search failed")?;
    println!("Found {} {} files", found.len(), args.ext);

    Ok(())
}
