//! Vaultline Demo
//!
//! Runs the whole system in one process the way the reference program does:
//! the server accepts connections on a multi-threaded runtime of its own, the
//! client sends a single request from a current-thread runtime, and the
//! parallel search runs once the exchange is over. The server and the client
//! share nothing except the key and the TCP connection between them.

use std::{net::SocketAddr, sync::mpsc, thread};

use anyhow::{anyhow, Context, Result};
use vaultline_common::SharedKey;
use vaultline_server::{RequestProcessor, ServerConfig, VaultlineServer};

/// Handle to a server running on its own OS thread and runtime
#[derive(Debug)]
pub struct BackgroundServer {
    /// Address the server actually bound
    pub local_addr: SocketAddr,
}

/// Start a server on a dedicated thread with its own multi-threaded runtime.
///
/// Blocks until the listener is bound so a bind failure is reported here
/// rather than on the first request. The thread is detached and serves until
/// the process exits.
pub fn spawn_server_thread<P: RequestProcessor>(
    config: ServerConfig,
    key: &SharedKey,
    processor: P,
) -> Result<BackgroundServer> {
    let server = VaultlineServer::new(config, key, processor);
    let (bound_tx, bound_rx) = mpsc::channel();

    thread::Builder::new()
        .name("vaultline-server".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = bound_tx.send(Err(anyhow!(e).context("Failed to build server runtime")));
                    return;
                }
            };

            runtime.block_on(async move {
                match server.bind().await {
                    Ok(listener) => {
                        let addr = listener.local_addr();
                        let _ = bound_tx.send(addr.map_err(anyhow::Error::from));
                        server.serve(listener).await;
                    }
                    Err(e) => {
                        let _ = bound_tx.send(Err(e.into()));
                    }
                }
            });
        })
        .context("Failed to spawn server thread")?;

    let local_addr = bound_rx
        .recv()
        .map_err(|_| anyhow!("Server thread exited before binding"))??;

    tracing::info!(%local_addr, "Server started in background");
    Ok(BackgroundServer { local_addr })
}
