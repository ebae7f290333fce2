use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaultline_client::{ClientConfig, ClientDriver};
use vaultline_common::{
    config::{
        DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SEARCH_EXTENSION, DEFAULT_SEARCH_WORKERS, HOST_ENV,
        PORT_ENV, SHARED_KEY_ENV,
    },
    ParallelSearch, SharedKey,
};

#[derive(Parser)]
#[command(name = "vaultline-client")]
#[command(about = "Vaultline encrypted request/response client")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one encrypted message and print the reply
    Send {
        /// Message to send
        message: String,

        /// Server host
        #[arg(long, env = HOST_ENV, default_value = DEFAULT_HOST)]
        host: String,

        /// Server port
        #[arg(short, long, env = PORT_ENV, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Seconds to wait at each step before giving up
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Find files by extension with a parallel worker pool
    Search {
        /// Directory to search
        #[arg(default_value = ".")]
        root: PathBuf,

        /// File name suffix to match (case-sensitive)
        #[arg(short, long, default_value = DEFAULT_SEARCH_EXTENSION)]
        ext: String,

        /// Number of worker threads
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_WORKERS)]
        workers: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SearchReport {
    root:      PathBuf,
    extension: String,
    workers:   usize,
    matches:   Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Send {
            message,
            host,
            port,
            timeout,
        } => {
            let key = SharedKey::from_env()
                .context("Failed to load shared key")?
                .ok_or_else(|| anyhow!("{SHARED_KEY_ENV} must be set to the server's key"))?;

            let config = ClientConfig::new()
                .with_host(host)
                .with_port(port)
                .with_timeout(Duration::from_secs(timeout));
            info!("Sending request to {}", config.address());

            let driver = ClientDriver::new(config, &key);
            let reply = driver.run_blocking(&message).context("Request failed")?;
            println!("Server responded: {reply}");
        }

        Commands::Search {
            root,
            ext,
            workers,
            json,
        } => {
            let found = ParallelSearch::new(workers)
                .search(&root, &ext)
                .context("Search failed")?;

            if json {
                let report = SearchReport {
                    root,
                    extension: ext,
                    workers,
                    matches: found.into_iter().collect(),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for path in &found {
                    println!("{}", path.display());
                }
                println!("Found {} {} files", found.len(), ext);
            }
        }
    }

    Ok(())
}
