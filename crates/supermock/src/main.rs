use clap::Parser;
use std::path::PathBuf;
use supermock::config::{Config, StorageConfig};
use supermock::App;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "supermock", version, about = "HTTP mock server with live-editable rules")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "SUPERMOCK_CONFIG")]
    config: Option<PathBuf>,
    /// Mock listener port
    #[arg(short, long, env = "SUPERMOCK_PORT")]
    port: Option<u16>,
    /// Admin API port
    #[arg(long, env = "SUPERMOCK_ADMIN_PORT")]
    admin_port: Option<u16>,
    /// Bind address for both listeners
    #[arg(long, env = "SUPERMOCK_HOST")]
    host: Option<String>,
    /// Persist rules to this JSON file
    #[arg(long, env = "SUPERMOCK_DB")]
    db: Option<PathBuf>,
    /// Route rebuild coalescing window in milliseconds
    #[arg(long, env = "SUPERMOCK_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,
    /// Log filter, e.g. `info` or `supermock=debug`
    #[arg(long, env = "SUPERMOCK_LOG", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<Config, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(port) = self.admin_port {
            config.listen.admin_port = port;
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(db) = self.db {
            config.storage = StorageConfig::file(db);
        }
        if let Some(ms) = self.debounce_ms {
            config.routing.debounce_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    let app = App::start(config).await?;
    info!(
        "supermock ready: mocks on {}, admin on {}",
        app.mock_addr(),
        app.admin_addr()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    app.shutdown().await;
    Ok(())
}
