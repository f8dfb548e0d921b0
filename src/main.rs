#![cfg(not(tarpaulin_include))]

use featherpack::app;
use featherpack::config::Config;
use std::env;

/// Main entry point for the FeatherPack web server
///
/// Serves every gear list in the data directory on the configured address.
///
/// # Arguments
/// * `--dir <path>` - Directory holding the gear list files (default `.`)
/// * `--bind <addr>` - Listen address (default `127.0.0.1:8501`)
/// * `--password-sha256 <hex>` - Digest of the editing password
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, rest) = Config::from_args(env::args().skip(1))?;
    if !rest.is_empty() {
        eprintln!(
            "Usage: featherpack [--dir <path>] [--bind <addr>] [--password-sha256 <hex>]"
        );
        return Ok(());
    }

    app::run(config).await
}
