//! Loader trait for writing records to a destination

use eyre::Result;

/// Loader trait for loading items to a destination
///
/// Implementors define where items end up:
/// - Intermediate JSON files for the next stage
/// - A relational table
///
/// # Example
/// ```no_run
/// use catalog_migrator::etl::Loader;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct LineLoader {
///     path: PathBuf,
/// }
///
/// impl Loader for LineLoader {
///     type Item = String;
///
///     async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
///         std::fs::write(&self.path, items.join("\n"))?;
///         Ok(items.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load items to the destination
    ///
    /// Returns the number of items successfully loaded
    ///
    /// # Errors
    /// Returns an error if loading fails (I/O, constraint violation, etc.)
    fn load(
        &self,
        items: Vec<Self::Item>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
