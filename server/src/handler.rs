use std::{fmt, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use vaultline_common::{
    frame::{read_frame, write_frame},
    CipherChannel, Error,
};

use crate::processor::RequestProcessor;

/// Steps a connection passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reading,
    Decrypting,
    Processing,
    Encrypting,
    Writing,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Reading => "reading",
            Stage::Decrypting => "decrypting",
            Stage::Processing => "processing",
            Stage::Encrypting => "encrypting",
            Stage::Writing => "writing",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a connection that was not dropped ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One reply frame was written
    Replied,
    /// The peer closed before sending anything
    PeerClosed,
}

/// A connection closed without a reply
#[derive(Debug, Error)]
#[error("connection dropped while {stage}: {source}")]
pub struct Dropped {
    /// Stage that failed
    pub stage:  Stage,
    /// What went wrong
    #[source]
    pub source: Error,
}

impl Dropped {
    fn at(stage: Stage) -> impl FnOnce(Error) -> Self {
        move |source| Self { stage, source }
    }
}

/// Per-connection protocol: read one frame, decrypt, process, encrypt, reply.
///
/// Holds only shared read-only state, so one handler is cloned into every
/// connection task.
pub struct ConnectionHandler<P> {
    channel:       Arc<CipherChannel>,
    processor:     Arc<P>,
    max_frame_len: u32,
    read_timeout:  Option<Duration>,
}

impl<P> Clone for ConnectionHandler<P> {
    fn clone(&self) -> Self {
        Self {
            channel:       Arc::clone(&self.channel),
            processor:     Arc::clone(&self.processor),
            max_frame_len: self.max_frame_len,
            read_timeout:  self.read_timeout,
        }
    }
}

impl<P: RequestProcessor> ConnectionHandler<P> {
    /// Creates a handler sharing `channel` and `processor`
    pub fn new(
        channel: Arc<CipherChannel>,
        processor: Arc<P>,
        max_frame_len: u32,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            channel,
            processor,
            max_frame_len,
            read_timeout,
        }
    }

    /// Run one exchange over `stream` and release it.
    ///
    /// The stream is consumed so it is closed on every return path. Any
    /// failure after the read drops the connection with no reply.
    pub async fn handle<S>(&self, mut stream: S) -> Result<Outcome, Dropped>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.exchange(&mut stream).await;

        if matches!(result, Ok(Outcome::Replied)) {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "Shutdown after reply failed");
            }
        }
        tracing::debug!(stage = %Stage::Closed, "Connection released");
        result
    }

    async fn exchange<S>(&self, stream: &mut S) -> Result<Outcome, Dropped>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::trace!(stage = %Stage::Reading);
        let frame = match self.read_request(stream).await.map_err(Dropped::at(Stage::Reading))? {
            Some(frame) => frame,
            None => return Ok(Outcome::PeerClosed),
        };

        tracing::trace!(stage = %Stage::Decrypting, len = frame.len());
        let plaintext = self
            .channel
            .decrypt(&frame)
            .map_err(Dropped::at(Stage::Decrypting))?;

        tracing::trace!(stage = %Stage::Processing);
        let request = String::from_utf8(plaintext)
            .map_err(|e| Error::Processing(format!("request is not UTF-8: {e}")))
            .map_err(Dropped::at(Stage::Processing))?;
        tracing::info!(len = request.len(), "Received request");
        tracing::debug!(%request);

        let response = self
            .processor
            .process(&request)
            .map_err(|e| Error::Processing(format!("{e:#}")))
            .map_err(Dropped::at(Stage::Processing))?;

        tracing::trace!(stage = %Stage::Encrypting);
        let sealed = self
            .channel
            .encrypt(response.as_bytes())
            .map_err(Dropped::at(Stage::Encrypting))?;

        tracing::trace!(stage = %Stage::Writing, len = sealed.len());
        write_frame(stream, &sealed, self.max_frame_len)
            .await
            .map_err(Dropped::at(Stage::Writing))?;

        Ok(Outcome::Replied)
    }

    async fn read_request<S>(&self, stream: &mut S) -> vaultline_common::Result<Option<Vec<u8>>>
    where
        S: AsyncRead + Unpin,
    {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read_frame(stream, self.max_frame_len))
                .await
                .map_err(|_| Error::Timeout("reading request"))?,
            None => read_frame(stream, self.max_frame_len).await,
        }
    }
}
