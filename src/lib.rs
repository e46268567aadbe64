pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod extract;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod seo;
pub mod state;
pub mod status;
pub mod storage;
pub mod utils;

use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_migrations(conn: &mut PgConnection) -> anyhow::Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}
