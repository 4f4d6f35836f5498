use std::net::SocketAddr;

use anyhow::Context;
use foodgram_backend::{config::Config, routes, AppState};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log::info!("Listening on {addr}");

    warp::serve(routes(AppState::new(pool, config)))
        .run(addr)
        .await;

    Ok(())
}
