//! Vaultline Common Library
//!
//! This crate provides the pieces shared by the Vaultline server, client and
//! demo program. It includes:
//!
//! - Authenticated symmetric encryption of opaque payloads
//! - Length-prefixed framing over async byte streams
//! - Configuration defaults and environment overrides
//! - A fixed-size worker pool for recursive file search
//!
//! # Wire format
//!
//! Each exchange carries exactly one frame in each direction:
//!
//! ```text
//! [u32 little-endian length][nonce (12)][AES-256-GCM ciphertext][tag (16)]
//! ```

/// Configuration defaults and environment overrides
pub mod config;

/// Error taxonomy shared by every crate in the workspace
pub mod error;

/// Shared key and authenticated encryption channel
pub mod cipher;

/// Length-prefixed frame reader and writer
pub mod frame;

/// Parallel recursive file search
pub mod search;

// Re-export commonly used types for convenience
pub use cipher::{CipherChannel, SharedKey};
pub use config::{DEFAULT_HOST, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};
pub use error::{Error, Result};
pub use search::{find_files_recursively, ParallelSearch};
