//! Vaultline Server Library
//!
//! An encrypted request/response server. Each accepted TCP connection carries
//! exactly one exchange: the client sends one encrypted frame, the server
//! decrypts it, runs it through a [`RequestProcessor`], encrypts the result
//! and writes one reply frame before closing.
//!
//! Integrity failures, processing errors and malformed frames close the
//! connection without a reply.
//!
//! # Concurrency
//!
//! Every connection runs as its own task on the tokio multi-threaded runtime.
//! The only state shared between tasks is the cipher and the processor, both
//! read-only. There is no cap on concurrent connections and no backpressure.
//!
//! # Example
//!
//! ```no_run
//! use vaultline_common::SharedKey;
//! use vaultline_server::{ReverseProcessor, ServerConfig, VaultlineServer};
//!
//! # async fn run() -> vaultline_common::Result<()> {
//! let key = SharedKey::generate();
//! let server = VaultlineServer::new(ServerConfig::new(), &key, ReverseProcessor::new());
//! server.run().await
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use vaultline_common::{
    config::{self, DEFAULT_BACKLOG, DEFAULT_HOST, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, DEFAULT_TIMEOUT},
    CipherChannel, Error, Result, SharedKey,
};

mod handler;
mod listener;
mod processor;

pub use handler::{ConnectionHandler, Dropped, Outcome, Stage};
pub use listener::ConnectionListener;
pub use processor::{RequestProcessor, ReverseProcessor, DEFAULT_LABEL};

/// Configuration for the Vaultline server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP to bind
    pub host:          String,
    /// Port to bind, 0 for an ephemeral port
    pub port:          u16,
    /// Pending-connection queue length
    pub backlog:       u32,
    /// Largest frame accepted or sent
    pub max_frame_len: u32,
    /// How long a connection may wait before sending its request
    pub read_timeout:  Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host:          DEFAULT_HOST.to_string(),
            port:          DEFAULT_PORT,
            backlog:       DEFAULT_BACKLOG,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_timeout:  Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ServerConfig {
    /// Creates a server configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables
    ///
    /// Reads VAULTLINE_HOST and VAULTLINE_PORT
    pub fn from_env() -> Self {
        Self::new()
            .with_host(config::host_from_env())
            .with_port(config::port_from_env())
    }

    /// Set the bind host
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the listen backlog
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the maximum frame length
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Set or clear the request read timeout
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// `host:port` string to bind
    pub fn address(&self) -> String {
        config::address(&self.host, self.port)
    }
}

/// An encrypted request/response server.
///
/// Construction requires a [`RequestProcessor`]; there is no way to build a
/// server without one.
pub struct VaultlineServer<P: RequestProcessor> {
    config:  ServerConfig,
    handler: ConnectionHandler<P>,
}

impl<P: RequestProcessor> VaultlineServer<P> {
    /// Creates a server that decrypts with `key` and answers with `processor`
    pub fn new(config: ServerConfig, key: &SharedKey, processor: P) -> Self {
        let handler = ConnectionHandler::new(
            Arc::new(CipherChannel::new(key)),
            Arc::new(processor),
            config.max_frame_len,
            config.read_timeout,
        );
        Self { config, handler }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address.
    ///
    /// Returns [`Error::Bind`] when the address cannot be acquired.
    pub async fn bind(&self) -> Result<ConnectionListener> {
        ConnectionListener::bind(&self.config.address(), self.config.backlog).await
    }

    /// Serves connections from an already bound listener until the process exits
    pub async fn serve(&self, listener: ConnectionListener) {
        let handler = self.handler.clone();
        listener
            .serve(move |stream, _peer| {
                let handler = handler.clone();
                async move {
                    match handler.handle(stream).await {
                        Ok(Outcome::Replied) => tracing::info!("Request handled, connection closed"),
                        Ok(Outcome::PeerClosed) => tracing::info!("Client closed connection without a request"),
                        Err(dropped) => log_dropped(&dropped),
                    }
                }
            })
            .await
    }

    /// Binds and serves until the process exits
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting Vaultline server on {}", self.config.address());
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }
}

fn log_dropped(dropped: &Dropped) {
    match &dropped.source {
        Error::Authentication => {
            tracing::warn!(stage = %dropped.stage, "Dropping connection: ciphertext failed authentication")
        }
        Error::Processing(reason) => {
            tracing::warn!(stage = %dropped.stage, %reason, "Dropping connection: request processing failed")
        }
        Error::Transport(_) | Error::Timeout(_) => {
            tracing::info!(stage = %dropped.stage, error = %dropped.source, "Connection lost")
        }
        other => tracing::warn!(stage = %dropped.stage, error = %other, "Dropping connection"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_host("127.0.0.1")
            .with_port(0)
            .with_backlog(8)
            .with_max_frame_len(4096)
            .with_read_timeout(None);

        assert_eq!(config.address(), "127.0.0.1:0");
        assert_eq!(config.backlog, 8);
        assert_eq!(config.max_frame_len, 4096);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn defaults_match_reference_service() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "localhost:9999");
        assert_eq!(config.max_frame_len, 1024);
    }

    #[tokio::test]
    async fn run_reports_bind_failure() {
        let occupied = ConnectionListener::bind("127.0.0.1:0", 4).await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let server = VaultlineServer::new(
            ServerConfig::new().with_host("127.0.0.1").with_port(port),
            &SharedKey::generate(),
            ReverseProcessor::new(),
        );
        assert!(matches!(server.run().await, Err(Error::Bind { .. })));
    }
}
