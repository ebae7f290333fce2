use std::{future::Future, time::Duration};

use tokio::{io::AsyncWriteExt, net::TcpStream};
use vaultline_common::{
    cipher::{NONCE_LEN, TAG_LEN},
    config::{self, DEFAULT_HOST, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT, DEFAULT_TIMEOUT},
    frame::{read_frame, write_frame},
    CipherChannel, Error, Result, SharedKey,
};

/// Configuration for the Vaultline client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or IP
    pub host:          String,
    /// Server port
    pub port:          u16,
    /// Bound on each suspension point: connect, send, and await reply
    pub timeout:       Duration,
    /// Largest frame sent or accepted
    pub max_frame_len: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host:          DEFAULT_HOST.to_string(),
            port:          DEFAULT_PORT,
            timeout:       DEFAULT_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Creates a client configuration with default values
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

    /// Set the server host
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-step timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum frame length
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// `host:port` string to dial
    pub fn address(&self) -> String {
        config::address(&self.host, self.port)
    }
}

/// Client for the Vaultline request/response protocol.
///
/// Each call opens a fresh connection, sends one encrypted frame, waits for
/// one encrypted reply and closes. The connection never outlives the call.
#[derive(Debug, Clone)]
pub struct ClientDriver {
    channel: CipherChannel,
    config:  ClientConfig,
}

impl ClientDriver {
    /// Creates a driver that encrypts with `key`
    pub fn new(config: ClientConfig, key: &SharedKey) -> Self {
        Self {
            channel: CipherChannel::new(key),
            config,
        }
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a text request and return the decrypted text reply
    pub async fn send(&self, payload: &str) -> Result<String> {
        let reply = self.send_bytes(payload.as_bytes()).await?;
        String::from_utf8(reply).map_err(|e| Error::Processing(format!("reply is not UTF-8: {e}")))
    }

    /// Send raw bytes and return the decrypted reply bytes.
    ///
    /// Any failure along the way is returned as a single error; nothing is
    /// retried.
    pub async fn send_bytes(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let max = self.config.max_frame_len;
        let sealed_len = payload.len() + NONCE_LEN + TAG_LEN;
        if sealed_len > max as usize {
            return Err(Error::FrameTooLarge { len: sealed_len, max });
        }

        let address = self.config.address();
        tracing::debug!(%address, "Connecting to Vaultline server");
        let mut stream = self
            .bounded("connecting", async {
                TcpStream::connect(&address).await.map_err(Error::from)
            })
            .await?;

        let reply = self.exchange(&mut stream, payload).await;
        if reply.is_ok() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "Shutdown after reply failed");
            }
        }
        reply
    }

    async fn exchange(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<Vec<u8>> {
        let max = self.config.max_frame_len;
        let frame = self.channel.encrypt(payload)?;

        self.bounded("sending request", write_frame(stream, &frame, max))
            .await?;
        tracing::debug!(len = frame.len(), "Request sent");

        let reply = self
            .bounded("awaiting reply", read_frame(stream, max))
            .await?
            .ok_or(Error::ConnectionClosed)?;
        tracing::debug!(len = reply.len(), "Reply received");

        self.channel.decrypt(&reply)
    }

    async fn bounded<T, F>(&self, stage: &'static str, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.timeout, step)
            .await
            .map_err(|_| Error::Timeout(stage))?
    }

    /// Run [`ClientDriver::send`] to completion on a fresh single-threaded
    /// runtime.
    ///
    /// Must not be called from inside another tokio runtime.
    pub fn run_blocking(&self, payload: &str) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.send(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ClientConfig::new()
            .with_host("127.0.0.1")
            .with_port(4242)
            .with_timeout(Duration::from_secs(2))
            .with_max_frame_len(2048);

        assert_eq!(config.address(), "127.0.0.1:4242");
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.max_frame_len, 2048);
    }

    #[test]
    fn defaults_match_reference_service() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "localhost:9999");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn oversized_payload_fails_before_connecting() {
        // Nothing listens on port 9; the size check must fire first
        let driver = ClientDriver::new(
            ClientConfig::new().with_host("127.0.0.1").with_port(9),
            &SharedKey::generate(),
        );
        let payload = vec![b'a'; DEFAULT_MAX_FRAME_LEN as usize];

        assert!(matches!(
            driver.send_bytes(&payload).await,
            Err(Error::FrameTooLarge { max: DEFAULT_MAX_FRAME_LEN, .. })
        ));
    }
}
