use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tether::app::auth::PasetoVerifier;
use tether::config::AppConfig;
use tether::infra::{cache::RedisCache, db::Db};
use tether::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let cache = RedisCache::connect(
        &config.redis_url,
        Duration::from_millis(config.cache_timeout_ms),
    )
    .await?;

    let state = AppState {
        db,
        cache,
        auth: Arc::new(PasetoVerifier::new(config.paseto_access_key)),
        feed_window: config.feed_window,
        global_feed_default_limit: config.global_feed_default_limit,
        profile_cache_ttl_seconds: config.profile_cache_ttl_seconds,
    };

    let app: Router = http::router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(config.request_body_limit_bytes));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(
        addr = %config.http_addr,
        feed_window_hours = config.feed_window.duration().whole_hours(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
