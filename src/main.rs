use std::net::SocketAddr;
use std::sync::Arc;

use agentcube::api::{self, AppState};
use agentcube::config::Config;
use agentcube::session::SessionManager;
use agentcube::tracker::ResourceTracker;
use agentcube_k8s::K8sAdapter;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("AGENTCUBE_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = Config::load();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let k8s = K8sAdapter::new().await?;
    let tracker = Arc::new(ResourceTracker::new());
    let manager = Arc::new(SessionManager::new(k8s, tracker, db, &cfg)?);

    let state = AppState {
        manager,
        config: Arc::new(cfg.clone()),
    };
    let app = api::router(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(%addr, "starting agentcube control-plane");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("agentcube control-plane stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
