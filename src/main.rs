//! MeshGate binary entry point

use clap::Parser;
use meshgate::config::Config;
use meshgate::directory::StaticDirectory;
use meshgate::error::Result;
use meshgate::web::{run_server, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// MeshGate - one MCP endpoint multiplexing a mesh of downstream MCP servers
#[derive(Parser, Debug)]
#[command(name = "meshgate", version = meshgate::VERSION, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = meshgate::DEFAULT_CONFIG_FILE)]
    config: String,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,

    /// Log filter (overrides the config's logging.level)
    #[arg(long)]
    log: Option<String>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_logging(&config, cli.log.as_deref());
    info!("meshgate {} starting", meshgate::VERSION);

    let directory = StaticDirectory::load(&config.directory.file)?;
    let state = AppState::new(config, Arc::new(directory))?;

    run_server(state).await
}

/// Initialize the tracing subscriber from config and CLI overrides
fn init_logging(config: &Config, cli_filter: Option<&str>) {
    let filter = cli_filter
        .map(str::to_string)
        .or_else(|| config.logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    let env_filter = EnvFilter::try_new(&filter)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = config.logging.as_ref().map(|l| l.json).unwrap_or(false);
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
