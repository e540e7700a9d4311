//! Loading transformed records into the target table

mod store;
mod upsert;

pub use store::{FailedRecord, LoadPolicy, LoadReport, RecordStore};
pub use upsert::UpsertLoader;
