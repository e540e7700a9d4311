//! PostgreSQL target store
//!
//! Connects with `tokio-postgres` and implements [`RecordStore`] with plain
//! SQL transaction control so the loader can place savepoints between
//! records.

use crate::config::{TargetConfig, validate_table_name};
use crate::load::RecordStore;
use crate::transform::TransformedRecord;
use eyre::{Context, Result};
use tokio_postgres::types::Json;
use tokio_postgres::{Client, NoTls, Statement};

const SAVEPOINT: &str = "catmig_record";

/// Target table backed by a single PostgreSQL connection
///
/// The connection task ends, and the server session closes, when the
/// store is dropped.
pub struct PostgresStore {
    client: Client,
    upsert: Statement,
}

impl PostgresStore {
    /// Connect to the target database
    ///
    /// # Errors
    /// Returns an error if the connection or authentication fails, or the
    /// table name is not a valid identifier.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        validate_table_name(&config.table)?;

        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .application_name("catmig");
        if let Some(credentials) = &config.credentials {
            pg.user(&credentials.username)
                .password(credentials.password.as_bytes());
        }

        log::debug!(
            "Connecting to PostgreSQL {}:{}/{}",
            config.host,
            config.port,
            config.database
        );
        let (client, connection) = pg.connect(NoTls).await.with_context(|| {
            format!(
                "Failed to connect to PostgreSQL at {}:{}/{}",
                config.host, config.port, config.database
            )
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("PostgreSQL connection error: {}", e);
            }
        });

        Self::with_client(client, &config.table).await
    }

    /// Create the table so the upsert statement can be prepared against it
    async fn with_client(client: Client, table: &str) -> Result<Self> {
        client
            .batch_execute(&create_table_sql(table))
            .await
            .with_context(|| format!("Failed to create table {}", table))?;

        let upsert = client
            .prepare(&upsert_sql(table))
            .await
            .with_context(|| format!("Failed to prepare upsert into {}", table))?;

        Ok(Self { client, upsert })
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .await
            .with_context(|| format!("Failed to execute {}", sql))
    }
}

impl RecordStore for PostgresStore {
    async fn begin(&self) -> Result<()> {
        self.execute("BEGIN").await
    }

    async fn upsert(&self, record: &TransformedRecord) -> Result<()> {
        self.client
            .execute(
                &self.upsert,
                &[
                    &record.id,
                    &record.category_id,
                    &record.is_active,
                    &record.record_type,
                    &Json(&record.data),
                ],
            )
            .await?;
        Ok(())
    }

    async fn savepoint(&self) -> Result<()> {
        self.execute(&format!("SAVEPOINT {}", SAVEPOINT)).await
    }

    async fn release_savepoint(&self) -> Result<()> {
        self.execute(&format!("RELEASE SAVEPOINT {}", SAVEPOINT))
            .await
    }

    async fn rollback_to_savepoint(&self) -> Result<()> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", SAVEPOINT))
            .await
    }

    async fn commit(&self) -> Result<()> {
        self.execute("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK").await
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
    category_id TEXT,
    is_active BOOLEAN,
    record_type TEXT NOT NULL,
    data JSONB NOT NULL DEFAULT '{{}}'::jsonb
)"
    )
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id, category_id, is_active, record_type, data)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (id) DO UPDATE SET
    category_id = EXCLUDED.category_id,
    is_active = EXCLUDED.is_active,
    record_type = EXCLUDED.record_type,
    data = EXCLUDED.data"
    )
}
