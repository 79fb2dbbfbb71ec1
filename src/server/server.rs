use crate::models::{ModelLister, ModelSource};
use crate::permission::PermissionResolver;
use crate::server::routes;
use crate::settings::Settings;
use crate::templates::{FileTemplateStorage, TemplateStore};

use anyhow::{Context, Result};
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub templates: Arc<Mutex<TemplateStore>>,
    pub models: Arc<dyn ModelSource>,
    pub resolver: PermissionResolver,
    pub start_time: std::time::Instant,
    pub version: String,
}

impl AppState {
    pub fn new(settings: Settings, templates: TemplateStore, models: Arc<dyn ModelSource>) -> Self {
        Self {
            settings: Arc::new(settings),
            templates: Arc::new(Mutex::new(templates)),
            models,
            resolver: PermissionResolver::default(),
            start_time: std::time::Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// State backed by the real template file and the opencode CLI.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let storage = FileTemplateStorage::in_dir(&settings.state_dir);
        let templates = TemplateStore::open(storage).context("Failed to open template store")?;
        let models = ModelLister::new()
            .with_timeout(settings.model_list_timeout())
            .with_max_output_bytes(settings.model_list_max_bytes);
        Ok(Self::new(settings, templates, Arc::new(models)))
    }
}

/// The ocforge HTTP server.
pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    /// Prepare the server; nothing is bound until [`Server::run_until_shutdown`].
    pub fn start(settings: Settings) -> Result<Self> {
        let addr: SocketAddr = settings
            .bind_address()
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", settings.bind_address()))?;
        let state = AppState::from_settings(settings)?;

        info!("Server binding to {}", addr);
        Ok(Self { state, addr })
    }

    /// Run the server until Ctrl+C or SIGTERM.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let app = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        let addr = listener.local_addr()?;

        print_startup_banner(&self.state, &addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server shut down gracefully");
        Ok(())
    }

}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    routes::build_routes(state)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

fn print_startup_banner(state: &AppState, addr: &SocketAddr) {
    info!("-------------------------------------------");
    info!("  ocforge v{}", state.version);
    info!("  Listening on: http://{}", addr);
    info!("  Static files: {}", state.settings.static_dir.display());
    info!("  Config file: {}", state.settings.document_path().display());
    info!("  Health: http://{}/api/health", addr);
    info!("-------------------------------------------");
}
