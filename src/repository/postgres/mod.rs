mod carts;
mod directory;
mod orders;

use anyhow::{Context, Result};
use diesel_async::{AsyncPgConnection, pooled_connection::bb8::PooledConnection};

use crate::{
    domain::errors::{CartError, OrderError},
    platform::db::DbPool,
};

/// Repository backed by PostgreSQL through diesel-async.
#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>> {
        self.pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")
    }
}

impl From<diesel::result::Error> for OrderError {
    fn from(err: diesel::result::Error) -> Self {
        OrderError::Store(err.into())
    }
}

impl From<diesel::result::Error> for CartError {
    fn from(err: diesel::result::Error) -> Self {
        CartError::Store(err.into())
    }
}
