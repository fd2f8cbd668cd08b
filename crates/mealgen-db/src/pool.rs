//! Pool construction, embedded migrations and the `db-init` bootstrap.

use anyhow::{Context, Result, bail};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Connection, Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by the embedded migrations, in dependency order.
pub const TABLES: [&str; 5] = [
    "ingredients",
    "nutrition_cache",
    "generation_logs",
    "meal_plans",
    "plan_meals",
];

pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    debug!(migrations = MIGRATOR.iter().count(), "schema is current");
    Ok(())
}

/// What [`ensure_database_exists`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    AlreadyExisted,
}

/// Create the configured database when it is missing.
///
/// The name is checked before connecting since `CREATE DATABASE` cannot take
/// it as a parameter.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<Bootstrap> {
    let name = config
        .database_name()
        .context("database URL does not name a database")?;
    check_database_name(name)?;

    let maintenance_url = config.maintenance_url();
    let mut conn = PgConnection::connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut conn)
            .await
            .context("failed to query pg_database")?;

    let outcome = if exists {
        Bootstrap::AlreadyExisted
    } else {
        let stmt = format!("CREATE DATABASE \"{name}\"");
        conn.execute(stmt.as_str())
            .await
            .with_context(|| format!("failed to create database {name}"))?;
        info!(db = name, "database created");
        Bootstrap::Created
    };

    conn.close()
        .await
        .context("failed to close maintenance connection")?;
    Ok(outcome)
}

/// Unquoted-identifier rules: letter or underscore first, then ASCII
/// alphanumerics and underscores, at most 63 bytes.
fn check_database_name(name: &str) -> Result<()> {
    let valid = name.len() <= 63
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("database name {name:?} is not a plain identifier");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

/// Row counts for [`TABLES`], in that order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<TableCount>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let rows: i64 = sqlx::query_scalar(&query)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push(TableCount { table, rows });
    }
    Ok(counts)
}
