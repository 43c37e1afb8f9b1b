use std::net::SocketAddr;

use webpadel_api::cache::Cache;
use webpadel_api::config::Config;
use webpadel_api::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let pool = db::create_pool(&config).await?;
    db::migrate(&pool).await?;
    let cache = Cache::new(&config).await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(env = %config.app_env, cache = cache.is_enabled(), "WebPadel API initialized");

    let state = AppState::new(config, pool, cache);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
