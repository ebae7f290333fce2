use std::{env, time::Duration};

/// Host the server binds to and the client dials by default
pub const DEFAULT_HOST: &str = "localhost";

/// Port the server binds to and the client dials by default
pub const DEFAULT_PORT: u16 = 9999;

/// Largest ciphertext accepted in a single frame
pub const DEFAULT_MAX_FRAME_LEN: u32 = 1024;

/// Pending-connection queue length passed to `listen`
pub const DEFAULT_BACKLOG: u32 = 128;

/// Upper bound on a single suspension point (connect, write, read)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// File suffix the parallel search looks for when none is given
pub const DEFAULT_SEARCH_EXTENSION: &str = ".py";

/// Size of the parallel search worker pool
pub const DEFAULT_SEARCH_WORKERS: usize = 4;

/// Overrides the bind/dial host
pub const HOST_ENV: &str = "VAULTLINE_HOST";
/// Overrides the bind/dial port
pub const PORT_ENV: &str = "VAULTLINE_PORT";
/// Hex-encoded 32 byte key shared by server and client processes
pub const SHARED_KEY_ENV: &str = "VAULTLINE_SHARED_KEY";

/// Resolve the host from `VAULTLINE_HOST`, falling back to [`DEFAULT_HOST`].
pub fn host_from_env() -> String {
    env::var(HOST_ENV).unwrap_or(DEFAULT_HOST.to_string())
}

/// Resolve the port from `VAULTLINE_PORT`, falling back to [`DEFAULT_PORT`].
///
/// A value that is not a valid port is ignored with a warning.
pub fn port_from_env() -> u16 {
    match env::var(PORT_ENV) {
        Ok(raw) => parse_port(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "Ignoring invalid {}, using {}", PORT_ENV, DEFAULT_PORT);
            DEFAULT_PORT
        }),
        Err(_) => DEFAULT_PORT,
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok()
}

/// Join a host and port into a `host:port` address string
pub fn address(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}
