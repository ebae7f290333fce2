use anyhow::{anyhow, Context, Result};
use tracing::info;
use vaultline_common::SharedKey;
use vaultline_server::{RequestProcessor, ServerConfig, VaultlineServer};

/// Echo server example with a custom command processor
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("=== Vaultline Echo Server Example ===");

    let key = SharedKey::from_env_or_generate().context("Failed to load shared key")?;
    println!("VAULTLINE_SHARED_KEY={}", key.to_hex());

    let config = ServerConfig::from_env();
    println!("Server will listen on: {}", config.address());
    println!("Supported commands:");
    println!("  - echo <message>  - Echo back the message");
    println!("  - ping            - Respond with 'pong'");
    println!("  - time            - Return current timestamp");
    println!("Anything else closes the connection without a reply");

    let server = VaultlineServer::new(config, &key, EchoProcessor);

    info!("Starting echo server...");
    server.run().await.context("Echo server error")?;
    Ok(())
}

/// Answers a handful of text commands
struct EchoProcessor;

impl RequestProcessor for EchoProcessor {
    fn process(&self, request: &str) -> Result<String> {
        let parts: Vec<&str> = request.split_whitespace().collect();

        match parts.as_slice() {
            ["echo", rest @ ..] => {
                let response = format!("Echo: {}", rest.join(" "));
                info!("Echo command -> {}", response);
                Ok(response)
            }
            ["ping"] => Ok("pong".to_string()),
            ["time"] => {
                let timestamp = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Ok(format!("Current time: {timestamp}"))
            }
            _ => Err(anyhow!("Unknown command: '{}'", request)),
        }
    }
}
