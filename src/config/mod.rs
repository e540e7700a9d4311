//! Connection configuration for the source and target stores
//!
//! Values come from a [`SettingsProvider`], so the same resolution code
//! serves the environment, an interactive prompt, or fixed test values.

pub mod settings;

use crate::client::Credentials;
use eyre::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

pub use settings::{EnvSettings, PromptSettings, Setting, SettingsChain, SettingsProvider};

pub const DEFAULT_MONGO_HOST: &str = "localhost:27017";
pub const DEFAULT_BATCH_SIZE: u32 = 1000;
pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_TABLE: &str = "catalog_records";

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid table name pattern")
});

/// MongoDB source connection and extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Comma separated `host[:port]` list
    pub hosts: String,
    pub database: String,
    pub replica_set: Option<String>,
    pub auth_source: Option<String>,
    pub credentials: Option<Credentials>,
    /// Collections in extraction order
    pub collections: Vec<String>,
    pub batch_size: u32,
}

impl SourceConfig {
    /// Resolve source settings
    ///
    /// `collections` overrides `MONGO_COLLECTIONS` when non-empty.
    pub fn resolve(provider: &dyn SettingsProvider, collections: &[String]) -> Result<Self> {
        use self::settings::*;

        let hosts = provider
            .lookup(&MONGO_HOST)?
            .unwrap_or_else(|| DEFAULT_MONGO_HOST.to_string());
        let database = provider.require(&MONGO_DATABASE)?;
        let replica_set = provider.lookup(&MONGO_REPLICA_SET)?;
        let auth_source = provider.lookup(&MONGO_AUTH_SOURCE)?;

        let username = provider.lookup(&MONGO_USERNAME)?;
        let password = match username {
            Some(_) => provider.lookup(&MONGO_PASSWORD)?,
            None => None,
        };
        let credentials = Credentials::from_parts(username, password);

        let collections = if collections.is_empty() {
            split_list(&provider.require(&MONGO_COLLECTIONS)?)
        } else {
            collections
                .iter()
                .flat_map(|c| split_list(c))
                .collect()
        };
        if collections.is_empty() {
            eyre::bail!("At least one collection name is required");
        }

        let batch_size = match provider.lookup(&MONGO_BATCH_SIZE)? {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| eyre::eyre!("Invalid MONGO_BATCH_SIZE: {}", raw))?,
            None => DEFAULT_BATCH_SIZE,
        };

        Ok(Self {
            hosts,
            database,
            replica_set,
            auth_source,
            credentials,
            collections,
            batch_size,
        })
    }
}

/// PostgreSQL target connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Option<Credentials>,
    /// Plain or schema-qualified table name
    pub table: String,
}

impl TargetConfig {
    /// Resolve target settings; `table` overrides `PG_TABLE`
    pub fn resolve(provider: &dyn SettingsProvider, table: Option<&str>) -> Result<Self> {
        use self::settings::*;

        let host = provider
            .lookup(&PG_HOST)?
            .unwrap_or_else(|| DEFAULT_PG_HOST.to_string());
        let port = match provider.lookup(&PG_PORT)? {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid PG_PORT: {}", raw))?,
            None => DEFAULT_PG_PORT,
        };
        let database = provider.require(&PG_DATABASE)?;

        let username = provider.lookup(&PG_USERNAME)?;
        let password = match username {
            Some(_) => provider.lookup(&PG_PASSWORD)?,
            None => None,
        };
        let credentials = Credentials::from_parts(username, password);

        let table = match table {
            Some(table) => table.to_string(),
            None => provider
                .lookup(&PG_TABLE)?
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        };
        validate_table_name(&table)?;

        Ok(Self {
            host,
            port,
            database,
            credentials,
            table,
        })
    }
}

/// Accept `name` or `schema.name` made of identifier characters only
pub fn validate_table_name(table: &str) -> Result<()> {
    if !TABLE_NAME.is_match(table) {
        eyre::bail!(
            "Invalid table name '{}': use letters, digits and underscores, optionally schema-qualified",
            table
        );
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
