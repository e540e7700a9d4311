//! MongoDB source store
//!
//! Implements [`DocumentSource`] over one database so the collection
//! extractor can stream its collections.

use crate::config::SourceConfig;
use crate::extract::{DocumentCursor, DocumentSource};
use eyre::{Context, Result};
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Cursor, Database};
use serde_json::Value;

/// One MongoDB database reached through a single client
///
/// Building the source does not contact the server; [`DocumentSource::ping`]
/// does. Call [`MongoSource::shutdown`] once the source is no longer needed.
///
/// # Example
/// ```no_run
/// use catalog_migrator::client::MongoSource;
/// use catalog_migrator::config::{SettingsChain, SourceConfig};
/// use catalog_migrator::extract::CollectionExtractor;
///
/// # async fn example() -> eyre::Result<()> {
/// let config = SourceConfig::resolve(&SettingsChain::standard(false), &[])?;
/// let source = MongoSource::connect(&config).await?;
/// let count = CollectionExtractor::new(&source, &config.collections)
///     .extract_to("data/extracted_data.json")
///     .await;
/// source.shutdown().await;
/// println!("{} records", count?);
/// # Ok(())
/// # }
/// ```
pub struct MongoSource {
    client: Client,
    hosts: String,
    database: String,
    batch_size: u32,
}

impl MongoSource {
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let uri = format!("mongodb://{}/", config.hosts);
        let mut options = ClientOptions::parse(&uri)
            .await
            .with_context(|| format!("Invalid MongoDB host list: {}", config.hosts))?;

        options.app_name = Some("catmig".to_string());
        options.repl_set_name = config.replica_set.clone();
        if let Some(credentials) = &config.credentials {
            let mut credential = Credential::builder()
                .username(credentials.username.clone())
                .password(credentials.password.clone())
                .build();
            credential.source = config.auth_source.clone();
            options.credential = Some(credential);
        }

        let client =
            Client::with_options(options).with_context(|| "Failed to create MongoDB client")?;

        Ok(Self {
            client,
            hosts: config.hosts.clone(),
            database: config.database.clone(),
            batch_size: config.batch_size,
        })
    }

    /// Close every pooled connection
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }
}

impl DocumentSource for MongoSource {
    type Cursor = MongoCursor;

    async fn ping(&self) -> Result<()> {
        log::debug!("Pinging MongoDB {} (database {})", self.hosts, self.database);
        self.database()
            .run_command(doc! { "ping": 1 })
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to MongoDB at {} (database {})",
                    self.hosts, self.database
                )
            })?;
        Ok(())
    }

    async fn open(&self, collection: &str) -> Result<MongoCursor> {
        let cursor = self
            .database()
            .collection::<Document>(collection)
            .find(doc! {})
            .batch_size(self.batch_size)
            .await
            .with_context(|| format!("Failed to query collection {}", collection))?;
        Ok(MongoCursor { cursor })
    }
}

/// Batched cursor over one collection
pub struct MongoCursor {
    cursor: Cursor<Document>,
}

impl DocumentCursor for MongoCursor {
    async fn next_document(&mut self) -> Result<Option<Value>> {
        if !self.cursor.advance().await? {
            return Ok(None);
        }
        let document = self.cursor.deserialize_current()?;
        Ok(Some(bson_to_json(Bson::Document(document))))
    }
}

/// Convert BSON into JSON for the intermediate file
///
/// Object ids become their hex string so identifiers stay plain strings;
/// every other BSON-only type uses relaxed Extended JSON.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}
