//! Extractor trait for pulling records out of a source

use eyre::Result;

/// Extractor trait for extracting records from a source
///
/// Implementors define where records come from, such as:
/// - Intermediate JSON files written by an earlier stage
/// - A document store collection
///
/// # Example
/// ```no_run
/// use catalog_migrator::etl::Extractor;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct LineExtractor {
///     path: PathBuf,
/// }
///
/// impl Extractor for LineExtractor {
///     type Item = String;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         let content = std::fs::read_to_string(&self.path)?;
///         Ok(content.lines().map(str::to_string).collect())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (connection, I/O, parsing, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<Vec<Self::Item>>> + Send;
}
