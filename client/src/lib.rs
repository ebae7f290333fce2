//! Vaultline Client Library
//!
//! This crate provides the client side of the Vaultline encrypted
//! request/response protocol. Each request is a single exchange over its own
//! TCP connection: one encrypted frame out, one encrypted frame back.
//!
//! The driver is async and meant for a single-threaded cooperative runtime;
//! it suspends only while connecting, sending and waiting for the reply.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vaultline_client::{ClientConfig, ClientDriver};
//! use vaultline_common::SharedKey;
//!
//! # fn main() -> anyhow::Result<()> {
//! let key = SharedKey::from_env()?.ok_or_else(|| anyhow::anyhow!("no key"))?;
//! let config = ClientConfig::new().with_timeout(Duration::from_secs(10));
//!
//! let driver = ClientDriver::new(config, &key);
//! let reply = driver.run_blocking("Hello from async client!")?;
//! println!("Server responded: {reply}");
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::*;
// Re-export important types from vaultline-common for convenience
pub use vaultline_common::{Error, ParallelSearch, SharedKey, DEFAULT_HOST, DEFAULT_PORT};
