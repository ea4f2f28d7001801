mod config;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use bloodshare_api::auth::AppStateInner;
use bloodshare_api::storage::AvatarStore;
use bloodshare_api::views::Views;
use bloodshare_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bloodshare=debug,bloodshare_api=debug,bloodshare_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    let avatars = AvatarStore::new(config.media_dir.clone()).await?;

    let state = Arc::new(AppStateInner {
        db,
        secret: config.secret_key.clone(),
        session_days: config.session_days,
        max_avatar_bytes: config.max_avatar_bytes,
        views: Views::new()?,
        avatars,
    });

    let app = bloodshare_api::router(state).layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("BloodShare listening on {}", addr);
    info!(
        "Sessions last {} days, avatars up to {} bytes",
        config.session_days, config.max_avatar_bytes
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
