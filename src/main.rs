use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatard::{
    avatars::{AvatarService, AvatarStorage, ImageCrateCodec},
    config::Config,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "avatard")]
#[command(version)]
#[command(about = "Self-hosted avatar service with on-demand thumbnails")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $CONFIG_FILE, then config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Avatar storage directory (overrides config file)
    #[arg(short = 'a', long, value_name = "DIR")]
    avatar_path: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("avatard={},tower_http=trace", cli.log_level)
    } else {
        format!("avatard={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avatard v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load_from_file(path)?;
            info!("Configuration loaded from: {}", path);
            config
        }
        None => Config::load()?,
    };

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(avatar_path) = cli.avatar_path {
        config.storage.avatar_path = avatar_path;
    }

    info!("Using avatar storage: {}", config.storage.avatar_path.display());

    let storage = AvatarStorage::new(config.storage.avatar_path.clone());
    let avatar_service = Arc::new(AvatarService::new(
        storage,
        Arc::new(ImageCrateCodec::new()),
    ));
    avatar_service.initialize().await?;
    info!("Avatar storage initialized");

    let web_server = WebServer::new(config, avatar_service)?;
    web_server.serve().await?;

    info!("Shutdown complete");
    Ok(())
}
