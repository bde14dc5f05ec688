use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use cinebook_api::{app, state::reference_sequence, AppState, Stores};
use cinebook_store::app_config::Config;
use cinebook_store::{sample_movies, DbClient, MemoryStore, PgBookingLog, PgCatalogStore, PgUserStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinebook_api=debug,cinebook_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinebook API on port {}", config.server.port);

    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).context("Invalid Redis URL")?)),
        None => {
            tracing::warn!("No Redis configured; rate limiting disabled");
            None
        }
    };

    let stores = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, &config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Stores {
                catalog: Arc::new(PgCatalogStore::new(db.pool.clone())),
                users: Arc::new(PgUserStore::new(db.pool.clone())),
                log: Arc::new(PgBookingLog::new(db.pool.clone())),
                sequence: reference_sequence(Some(&db), redis.as_ref()),
            }
        }
        None => {
            tracing::warn!("No database configured; using the in-memory store");
            Stores::in_memory(
                Arc::new(MemoryStore::with_movies(sample_movies())),
                reference_sequence(None, redis.as_ref()),
            )
        }
    };

    let app_state = AppState::new(stores, redis, &config)?;
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
