use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::fs;

pub type DbPool = sqlx::PgPool;

/// SQLSTATE Postgres reports when `statement_timeout` cancels a query.
pub const QUERY_CANCELED: &str = "57014";

/// Caps every statement on connections built from `options` at `timeout`.
pub fn with_statement_timeout(options: PgConnectOptions, timeout: Duration) -> PgConnectOptions {
    options.options([("statement_timeout", timeout.as_millis().to_string())])
}

/// Plain sqlx pool, used for the audit trail.
pub async fn create_pool(database_url: &str, timeout: Duration) -> Result<DbPool> {
    let options = with_statement_timeout(PgConnectOptions::from_str(database_url)?, timeout);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create a SeaORM connection whose connect, acquire and statement times are
/// all bounded by `timeout`.
pub async fn create_orm_conn(database_url: &str, timeout: Duration) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(20)
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .map_sqlx_postgres_opts(move |pg| with_statement_timeout(pg, timeout))
        .sqlx_logging(false);
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Minimal migration runner that executes SQL files in `migrations/` in filename order.
/// Every statement is written to be re-runnable.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        tracing::info!(file = %file.display(), "applying migration");
        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands,
        // so split the migration file and run each statement individually.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            conn.execute(Statement::from_string(backend, format!("{stmt};")))
                .await?;
        }
    }

    Ok(())
}
