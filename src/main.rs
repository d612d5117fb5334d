use std::sync::Arc;

use config::Config;
use db::get_db_pool;
use error::StartupError;
use sqlx::PgPool;
use tokio::net::TcpListener;

mod auth;
mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod models;
mod pagination;
mod rating;
mod routes;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let pool = get_db_pool(&config).await?;
    db::migrate(&pool).await?;
    info!("Database ready, migrations applied");

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    let app = routes::router(AppState { pool, config: Arc::new(config) });
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
