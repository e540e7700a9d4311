//! Streams named collections into one JSON array file

use super::source::{DocumentCursor, DocumentSource};
use crate::storage::JsonArrayStream;
use eyre::{Context, Result};
use std::path::Path;

/// Extractor that concatenates collections in the configured order
///
/// Documents go straight from the cursor to the output stream, so memory
/// use does not grow with collection size.
pub struct CollectionExtractor<'a, S> {
    source: &'a S,
    collections: &'a [String],
}

impl<'a, S: DocumentSource> CollectionExtractor<'a, S> {
    pub fn new(source: &'a S, collections: &'a [String]) -> Self {
        Self {
            source,
            collections,
        }
    }

    /// Extract every collection into a JSON array at `path`
    ///
    /// The source is pinged before the output is opened, so a connection or
    /// login failure writes nothing. Any later failure drops the temp file
    /// and leaves a previous `path` untouched.
    ///
    /// Returns the total number of documents written.
    pub async fn extract_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.source.ping().await?;

        let mut output = JsonArrayStream::create(path)?;

        for name in self.collections {
            let before = output.count();
            let mut cursor = self.source.open(name).await?;
            while let Some(document) = cursor
                .next_document()
                .await
                .with_context(|| format!("Failed to read from collection {}", name))?
            {
                output.push(&document)?;
            }

            log::info!(
                "Extracted {} record(s) from {}",
                output.count() - before,
                name
            );
        }

        output.finish()
    }
}
