pub mod auth;
pub mod background;
pub mod db;
pub mod routes;
pub mod services;
pub mod state;
pub mod stores;

use std::time::Duration;

use sb_common::config::ServerConfig;
use state::AppState;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a running server.
pub struct ServerHandle {
    pub url: String,
    sweeper: JoinHandle<()>,
    shutdown: tokio::sync::oneshot::Sender<()>,
}

impl ServerHandle {
    pub async fn shutdown(self) {
        self.sweeper.abort();
        let _ = self.shutdown.send(());
    }
}

/// Opens the database, starts the background sweep and serves the API.
pub async fn start(config: ServerConfig) -> anyhow::Result<ServerHandle> {
    let pool = db::connect_and_migrate(&config.database_url).await?;

    let git_sha = std::env::var("GIT_SHA").ok();
    let boot_id = std::env::var("SB_BOOT_ID")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("sb-{}", std::process::id()));
    let state = AppState::new(boot_id, git_sha, &config, pool);

    if state.admin_password.is_none() {
        tracing::warn!("SB_ADMIN_PASSWORD is not set; the API is unauthenticated");
    }

    let sweeper = background::spawn(
        state.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let url = format!("http://{}", listener.local_addr()?);
    info!(%url, "server listening");

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .ok();
    });

    Ok(ServerHandle {
        url,
        sweeper,
        shutdown: tx,
    })
}
