pub mod auth;
pub mod config;
pub mod enrollment;
pub mod err;
pub mod io;
pub mod ledger;
pub mod models;
pub mod month;
pub mod record;
pub mod reports;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub use axum::http::Uri;
pub use axum::response::IntoResponse;
pub use err::Error;

use crate::config::Config;
use crate::store::postgres::PgStore;
use crate::store::SharedStore;

pub type Payload<T> = Result<Json<T>, Error>;
pub type Created<T> = Result<(StatusCode, Json<T>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(value))
}

pub fn created<V>(value: V) -> Created<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(value)))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Err(err)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Arc::new(Config::load()?);

    let store = PgStore::connect(&config).await?;
    store.migrate().await?;
    log::info!("Database migrations applied");
    auth::seed_admin(&store, &config).await?;
    io::prepare_io(&config.upload_dir).await?;

    let store: SharedStore = Arc::new(store);
    let app = routes::app(store, config.clone());

    log::info!("Starting FutureLab HTTP Server on http://{}", config.addr);
    axum::Server::bind(&config.addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
