use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vaultline_common::{
    config::{DEFAULT_BACKLOG, DEFAULT_HOST, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, HOST_ENV, PORT_ENV},
    SharedKey,
};
use vaultline_server::{ReverseProcessor, ServerConfig, VaultlineServer, DEFAULT_LABEL};

#[derive(Parser)]
#[command(name = "vaultline-server")]
#[command(about = "Encrypted request/response server")]
struct Args {
    /// Host to bind
    #[arg(long, env = HOST_ENV, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind
    #[arg(short, long, env = PORT_ENV, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Label prepended to every reply
    #[arg(long, default_value = DEFAULT_LABEL)]
    label: String,

    /// Listen backlog
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    backlog: u32,

    /// Largest accepted frame in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: u32,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("Starting Vaultline server...");

    let key = match SharedKey::from_env().context("Failed to load shared key")? {
        Some(key) => {
            info!("Using shared key from environment");
            key
        }
        None => {
            let key = SharedKey::generate();
            warn!("No shared key supplied, generated a new one for this process");
            // Clients in other processes need this to talk to us
            println!("VAULTLINE_SHARED_KEY={}", key.to_hex());
            key
        }
    };

    let config = ServerConfig::new()
        .with_host(args.host)
        .with_port(args.port)
        .with_backlog(args.backlog)
        .with_max_frame_len(args.max_frame_len);
    let server = VaultlineServer::new(config, &key, ReverseProcessor::new().with_label(args.label));

    server.run().await.context("Server error")?;
    Ok(())
}
