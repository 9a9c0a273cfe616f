use mimalloc::MiMalloc;
use relaygate::access_gate::AccessGate;
use relaygate::auth_manager::AuthManager;
use relaygate::config::Config;
use relaygate::provider_registry::ProviderRegistry;
use relaygate::server::{self, RelayGateState};
use relaygate::token_store::TokenStore;
use relaygate::utils::logging::LogController;
use relaygate::watcher::Watcher;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const REFRESH_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const REFRESH_SWEEP_CONCURRENCY: usize = 4;

fn config_path() -> PathBuf {
    std::env::var("RELAYGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| relaygate::config::default_config_path())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path();
    let cfg = Config::from_yaml_path(&config_path);

    let default_level = if cfg.basic.debug { "debug" } else { "info" };
    let _log_controller = LogController::init(default_level, cfg.basic.request_log);

    let registry = Arc::new(ProviderRegistry::new());
    registry.extend_from_config(&cfg);

    let token_store = TokenStore::new(cfg.basic.auth_dir.clone());
    let auth_manager = Arc::new(AuthManager::new(&cfg.basic, registry.clone(), token_store));
    let access_gate = Arc::new(AccessGate::from_config(&cfg));

    let (updates_tx, mut updates_rx) = tokio::sync::mpsc::channel(64);
    let mut watcher = Watcher::new(config_path.clone(), cfg.basic.auth_dir.clone(), updates_tx);
    watcher.reconcile(true).await?;

    tokio::spawn({
        let auth_manager = auth_manager.clone();
        async move {
            while let Some(batch) = updates_rx.recv().await {
                auth_manager.apply_updates(batch);
            }
        }
    });

    let (notify_watcher, fs_events) = watcher.spawn_fs_watch()?;
    tokio::spawn(watcher.run(fs_events));

    tokio::spawn({
        let auth_manager = auth_manager.clone();
        async move {
            let mut ticker = tokio::time::interval(REFRESH_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                auth_manager.run_refresh_sweep(REFRESH_SWEEP_CONCURRENCY).await;
            }
        }
    });

    let state = RelayGateState::new(auth_manager, access_gate, registry);
    let app = server::relaygate_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.basic.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");

    // Keeps the filesystem watcher's OS handle alive for the server's
    // entire lifetime; dropping it earlier would silently stop delivering
    // events.
    drop(notify_watcher);
    Ok(())
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
