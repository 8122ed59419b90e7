//! Gordon - single-node application platform.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use gordon::{
    auth::jwt::JwtAuthService,
    cli::Cli,
    config::{Config, ConfigStore},
    events::EventBus,
    probe::ReqwestProber,
    server::{Server, Services},
    setup_tracing,
    store::{MemorySecretStore, UnwiredLogs, UnwiredRuntime},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        routes = config.routes.len(),
        auth = config.auth.enabled,
        "Starting Gordon"
    );

    let prober = match ReqwestProber::new(Duration::from_secs(config.server.probe_timeout_secs)) {
        Ok(prober) => prober,
        Err(e) => {
            error!("Failed to build HTTP prober: {e}");
            return ExitCode::FAILURE;
        }
    };

    let auth = Arc::new(JwtAuthService::from_config(&config.auth));
    let config_store = Arc::new(ConfigStore::new(config.clone(), cli.config.clone()));

    let services = Services {
        config: config_store,
        auth,
        containers: Arc::new(UnwiredRuntime),
        secrets: Arc::new(MemorySecretStore::new()),
        logs: Arc::new(UnwiredLogs),
        prober: Arc::new(prober),
        events: Some(Arc::new(EventBus::default())),
        registry: None,
        backups: None,
    };

    let server = Server::new(config, services);
    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gordon shutdown complete");
    ExitCode::SUCCESS
}
