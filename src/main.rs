use anyhow::Result;
use fusewatt::config::Config;
use fusewatt::dynconfig::ConfigStore;
use fusewatt::logging::init_logging;
use fusewatt::supervisor::Supervisor;
use fusewatt::web::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("failed to load bootstrap config: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("invalid bootstrap config: {e}"))?;

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    info!("fusewatt starting up");

    let store = ConfigStore::load_or_default(&config.dynamic_config_path)
        .map_err(|e| anyhow::anyhow!("failed to load dynamic config: {e}"))?;
    let autostart = store.general().autostart;
    let store = Arc::new(Mutex::new(store));

    let modbus_timeout = Duration::from_secs(config.modbus.request_timeout_seconds);
    let modbus_reconnect_delay = Duration::from_secs(config.modbus.reconnect_delay_seconds);
    let supervisor = Arc::new(Mutex::new(Supervisor::new(Arc::clone(&store), modbus_timeout, modbus_reconnect_delay)));

    if autostart {
        supervisor.lock().await.start().await.map_err(|e| anyhow::anyhow!("autostart failed: {e}"))?;
    }

    let state = AppState { store, supervisor: Arc::clone(&supervisor), logging_directory: config.logging.directory.clone() };

    let result = tokio::select! {
        res = web::serve(state, &config) => res,
        () = shutdown_signal() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    supervisor.lock().await.stop().await;

    match result {
        Ok(()) => {
            info!("fusewatt shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("fusewatt failed with error: {e}");
            Err(anyhow::anyhow!("fusewatt error: {e}"))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
