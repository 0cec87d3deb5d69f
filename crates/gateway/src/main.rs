//! Coxswain daemon — serves the HTTP gateway.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coxswaind",
    about = "Coxswain — local agent orchestration over an Ollama-compatible engine",
    version
)]
struct Cli {
    /// Path to a TOML config file (defaults apply when absent)
    #[arg(short, long, env = "COXSWAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = coxswain_config::AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    coxswain_gateway::start(config).await
}
