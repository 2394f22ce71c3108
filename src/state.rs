use std::{convert::Infallible, sync::Arc};

use sqlx::{postgres::PgPoolOptions, PgPool};
use warp::Filter;

use crate::config::Config;

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn connect(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Pool that only dials the database on first use.
    pub fn lazy(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_lazy(&config.database_url)?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
