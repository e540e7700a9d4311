//! Catalog Migrator
//!
//! A one-shot ETL that moves data catalog records from MongoDB into a
//! PostgreSQL table, one re-runnable stage at a time.

pub mod cli;
pub mod client;
pub mod config;
pub mod etl;
pub mod extract;
pub mod load;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use client::{Credentials, MongoSource, PostgresStore};
pub use etl::{Extractor, IdentityTransformer, Loader, Pipeline, PipelineSummary, Transformer};
pub use extract::{CollectionExtractor, DocumentSource};
pub use load::{LoadPolicy, LoadReport, RecordStore, UpsertLoader};
pub use storage::{JsonArrayReader, JsonArrayStream, JsonArrayWriter, OutputDirectory};
pub use transform::{FieldMapping, RecordReshaper, TransformedRecord};
