//! Source store abstraction used by the collection extractor

use eyre::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;

/// A document store holding named collections
pub trait DocumentSource: Send + Sync {
    type Cursor: DocumentCursor;

    /// Check the store is reachable and the login is accepted
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Open a cursor over every document of `collection` in query order
    ///
    /// A collection that does not exist yields no documents.
    fn open(&self, collection: &str) -> impl Future<Output = Result<Self::Cursor>> + Send;
}

/// Documents of one collection, already converted to JSON
pub trait DocumentCursor: Send {
    /// The next document, or `None` once the collection is exhausted
    fn next_document(&mut self) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// In-memory collections, keyed by name
impl DocumentSource for BTreeMap<String, Vec<Value>> {
    type Cursor = std::vec::IntoIter<Value>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn open(&self, collection: &str) -> Result<Self::Cursor> {
        Ok(self.get(collection).cloned().unwrap_or_default().into_iter())
    }
}

impl DocumentCursor for std::vec::IntoIter<Value> {
    async fn next_document(&mut self) -> Result<Option<Value>> {
        Ok(self.next())
    }
}
