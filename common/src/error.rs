use std::io;

use thiserror::Error;

/// Errors raised across the Vaultline request/response path and search utility
#[derive(Debug, Error)]
pub enum Error {
    /// The listener could not acquire the requested address
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr:   String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Ciphertext was altered, truncated or produced under a different key
    #[error("ciphertext failed authentication")]
    Authentication,

    /// The request processor rejected the request
    #[error("request processing failed: {0}")]
    Processing(String),

    /// Connection refused, reset or otherwise broken
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A suspension point did not complete in time
    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// The peer closed the connection without sending a frame
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A frame exceeded the configured maximum
    #[error("frame of {len} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Length that was offered or announced
        len: usize,
        /// Configured limit
        max: u32,
    },

    /// A frame header announced zero bytes
    #[error("zero-length frame")]
    EmptyFrame,

    /// Key material could not be parsed
    #[error("invalid shared key: {0}")]
    InvalidKey(String),

    /// Search arguments were rejected before any worker started
    #[error("invalid search: {0}")]
    InvalidSearch(String),
}

/// Result alias used throughout the Vaultline crates
pub type Result<T> = std::result::Result<T, Error>;
