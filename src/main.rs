mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod lifecycle;
mod models;
mod routes;
mod store;

use std::sync::Arc;

use anyhow::Context;
use crate::{
    config::{Config, StoreBackend},
    models::AppState,
    store::{MemoryStore, PgStore, Store},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::{header, Method};
use tracing_subscriber::EnvFilter;

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.store_backend {
        StoreBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = db::connect_pg(url, cfg.db_max_connections).await?;
            db::init_schema(&pool).await.context("schema init failed")?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("STORE_BACKEND=memory: nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let store = open_store(&cfg).await?;

    if let Some((username, password_hash)) = &cfg.bootstrap_admin {
        auth::ensure_bootstrap_admin(store.as_ref(), username, password_hash)
            .await
            .context("bootstrap admin")?;
    }

    let state = AppState {
        store,
        session_ttl_hours: cfg.session_ttl_hours,
    };

    // The booking form and the back office are served from other origins.
    let cors = if cfg.cors_allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
    } else {
        CorsLayer::new()
    };

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(backend = ?cfg.store_backend, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
