//! `gatehouse` - run and administer the protocol gateway.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatehouse_config::GatewayConfig;
use gatehouse_core::TargetKind;
use gatehouse_server::GatewayServer;
use gatehouse_telemetry::{LogConfig, setup_logging};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gatehouse", version, about = "Protocol gateway for MCP connectors and A2A agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway.
    Serve {
        /// Path to the gateway TOML config.
        #[arg(short, long, env = "GATEHOUSE_CONFIG", default_value = "gateway.toml")]
        config: PathBuf,
    },

    /// Load and validate a config file, then exit.
    CheckConfig {
        /// Path to the gateway TOML config.
        #[arg(short, long, env = "GATEHOUSE_CONFIG", default_value = "gateway.toml")]
        config: PathBuf,
    },

    /// Hash a token read from stdin into the `sha256:` form used in
    /// config files. The plaintext is never stored anywhere.
    HashToken,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::Serve { config } => serve(&config).await,
        Commands::CheckConfig { config } => check_config(&config),
        Commands::HashToken => hash_token(),
    }
}

async fn serve(path: &Path) -> anyhow::Result<()> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;

    let log_config = LogConfig::new(config.logging.level.clone())
        .with_format(config.logging.format.parse()?);
    setup_logging(&log_config)?;

    let server = GatewayServer::start(config).await?;
    tracing::info!(addr = %server.local_addr(), "gatehouse ready");
    server.wait().await;
    Ok(())
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;

    let connectors = config
        .targets
        .iter()
        .filter(|t| t.kind == TargetKind::Connector)
        .count();
    println!(
        "ok: {} listening on {}:{}, {} target(s) ({} connector(s)), auth {:?}",
        path.display(),
        config.host,
        config.port,
        config.targets.len(),
        connectors,
        config.auth.mode,
    );
    Ok(())
}

fn hash_token() -> anyhow::Result<()> {
    let mut plaintext = String::new();
    std::io::stdin()
        .read_to_string(&mut plaintext)
        .context("reading token from stdin")?;
    let token = plaintext.trim_end_matches(['\r', '\n']);
    anyhow::ensure!(!token.is_empty(), "no token on stdin");

    let digest = Sha256::digest(token.as_bytes());
    println!("sha256:{}", hex::encode(digest));
    Ok(())
}
