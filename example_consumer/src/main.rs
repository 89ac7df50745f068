//! Example consumer: serves the models in `models.json` under `/api` backed by PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use restful_models::{
    common_routes_with_ready, ensure_database_exists, init_tracing, load_from_path, resolve, restful_routes, AppState,
    DataModelProvider, PgProvider, Router, RouterOptions,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("restful_models=info,example_consumer=info");

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/gallery".into());
    ensure_database_exists(&database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let models_path = std::env::var("MODELS_PATH").unwrap_or_else(|_| "models.json".into());
    let config = load_from_path(&models_path).await?;
    let registry = resolve(&config)?;
    let provider = PgProvider::new(pool, registry);
    provider.sync(false).await?;

    let router = Router::new(Arc::new(provider), RouterOptions::from_env());
    let state = AppState::new(router);
    let app = common_routes_with_ready(state.clone()).merge(restful_routes(state));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
