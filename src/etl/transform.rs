//! Transformer trait for record transformation

use eyre::Result;

/// Transformer trait for transforming records
///
/// Implementors define how a single record changes shape:
/// - Renaming and promoting fields
/// - Dropping fields
/// - Deriving values from lookup tables
/// - Validation
///
/// # Example
/// ```no_run
/// use catalog_migrator::etl::Transformer;
/// use eyre::Result;
///
/// struct FieldDropper {
///     fields: Vec<String>,
/// }
///
/// impl Transformer for FieldDropper {
///     type Input = serde_json::Value;
///     type Output = serde_json::Value;
///
///     fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
///         if let Some(obj) = input.as_object_mut() {
///             for field in &self.fields {
///                 obj.remove(field);
///             }
///         }
///         Ok(input)
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items
    ///
    /// Stops at the first failing item, so a batch either transforms
    /// completely or not at all.
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

/// Identity transformer that passes items through unchanged
///
/// Used by stages that only move records, such as loading an already
/// transformed file into the target table.
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + Sync> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}
