use std::time::Duration;

use anyhow::Context;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 8;

const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_pool(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(CHECKOUT_TIMEOUT)
        .build(manager)
        .context("failed to build database pool")
}

/// Opens the pool and brings the schema up to date before any request is served.
pub fn init_pool_and_migrate(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let pool = init_pool(database_url, max_size)?;
    let mut conn = pool
        .get()
        .context("failed to get database connection for migrations")?;
    crate::run_migrations(&mut conn)?;
    Ok(pool)
}
