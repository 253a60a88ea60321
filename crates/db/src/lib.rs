//! SQLite connection factory and module migration runner.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, SqlxSqliteConnector, Statement, TransactionTrait,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use stacks_kernel::{settings::DatabaseSettings, Migration};

const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Open a connection pool for the configured database.
///
/// Connections wait up to `busy_timeout_ms` for a competing writer to commit
/// instead of failing with `database is locked`.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<DatabaseConnection> {
    anyhow::ensure!(
        settings.url.starts_with("sqlite:"),
        "unsupported database url '{}': expected a sqlite: url",
        settings.url
    );

    let mut options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));
    if !settings.log_statements {
        options = options.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(8))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to database '{}'", settings.url))?;

    tracing::info!(
        target: "stacks-db",
        url = %settings.url,
        max_connections = settings.max_connections,
        busy_timeout_ms = settings.busy_timeout_ms,
        "database connected"
    );
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Apply every migration that has not been recorded yet.
///
/// Each migration runs in its own transaction together with the insert into
/// `schema_migrations`, so a failed migration leaves no partial record.
/// Returns the ids that were applied by this call.
pub async fn run_migrations(
    db: &DatabaseConnection,
    migrations: &[(String, Migration)],
) -> anyhow::Result<Vec<String>> {
    let backend = db.get_database_backend();

    db.execute(Statement::from_string(
        backend,
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                module TEXT NOT NULL,
                id TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (module, id)
            )
            "#
        ),
    ))
    .await
    .context("failed to create migrations table")?;

    let mut applied = Vec::new();

    for (module, migration) in migrations {
        let already_applied = db
            .query_one(Statement::from_sql_and_values(
                backend,
                format!("SELECT 1 AS present FROM {MIGRATIONS_TABLE} WHERE module = ? AND id = ?"),
                [module.as_str().into(), migration.id.into()],
            ))
            .await
            .context("failed to read migrations table")?
            .is_some();

        if already_applied {
            tracing::debug!(target: "stacks-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let txn = db.begin().await?;

        txn.execute_unprepared(migration.up)
            .await
            .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;

        txn.execute(Statement::from_sql_and_values(
            backend,
            format!("INSERT INTO {MIGRATIONS_TABLE} (module, id) VALUES (?, ?)"),
            [module.as_str().into(), migration.id.into()],
        ))
        .await
        .context("failed to record migration")?;

        txn.commit().await?;

        tracing::info!(target: "stacks-db", %module, id = migration.id, "migration applied");
        applied.push(format!("{}/{}", module, migration.id));
    }

    Ok(applied)
}
