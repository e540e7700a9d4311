//! Pipeline orchestration for a single ETL stage

use super::{Extractor, Loader, Transformer};
use eyre::Result;

/// Counts reported by a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSummary {
    /// Items read from the source
    pub extracted: usize,
    /// Items produced by the transformer
    pub transformed: usize,
    /// Items the loader reported as written
    pub loaded: usize,
}

impl PipelineSummary {
    /// True when every extracted item made it to the destination
    pub fn is_complete(&self) -> bool {
        self.loaded == self.extracted
    }
}

/// ETL Pipeline that orchestrates Extract, Transform, and Load operations
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (must transform from E::Item)
/// - `L`: Loader type (must load T::Output)
///
/// # Example
/// ```no_run
/// use catalog_migrator::etl::Pipeline;
/// # use catalog_migrator::etl::{Extractor, Transformer, Loader};
/// # use eyre::Result;
/// # struct MyExtractor;
/// # impl Extractor for MyExtractor {
/// #     type Item = i32;
/// #     async fn extract(&self) -> Result<Vec<Self::Item>> { Ok(vec![]) }
/// # }
/// # struct MyTransformer;
/// # impl Transformer for MyTransformer {
/// #     type Input = i32;
/// #     type Output = i32;
/// #     fn transform(&self, input: Self::Input) -> Result<Self::Output> { Ok(input) }
/// # }
/// # struct MyLoader;
/// # impl Loader for MyLoader {
/// #     type Item = i32;
/// #     async fn load(&self, items: Vec<Self::Item>) -> Result<usize> { Ok(items.len()) }
/// # }
///
/// # async fn example() -> Result<()> {
/// let pipeline = Pipeline::new(MyExtractor, MyTransformer, MyLoader);
///
/// let summary = pipeline.run().await?;
/// println!("Loaded {} of {} items", summary.loaded, summary.extracted);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    L: Loader<Item = T::Output>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the complete ETL pipeline
    ///
    /// Steps:
    /// 1. Extract items from source
    /// 2. Transform every item (all or nothing)
    /// 3. Load items to destination
    ///
    /// An empty source still reaches the loader so that file destinations
    /// are rewritten as empty arrays.
    ///
    /// # Errors
    /// Returns an error if any stage fails. Nothing is loaded when
    /// extraction or transformation fails.
    pub async fn run(&self) -> Result<PipelineSummary> {
        log::debug!("Extracting from source...");
        let items = self.extractor.extract().await?;
        let extracted = items.len();
        log::info!("Extracted {} items", extracted);

        if items.is_empty() {
            log::warn!("No items extracted, destination will be empty");
        }

        log::debug!("Transforming items...");
        let transformed = self.transformer.transform_many(items)?;
        let transformed_count = transformed.len();
        log::info!("Transformed {} items", transformed_count);

        log::debug!("Loading to destination...");
        let loaded = self.loader.load(transformed).await?;
        log::info!("Loaded {} of {} items", loaded, extracted);

        Ok(PipelineSummary {
            extracted,
            transformed: transformed_count,
            loaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Result;
    use std::sync::{Arc, Mutex};

    struct MockExtractor(Vec<i32>);

    impl Extractor for MockExtractor {
        type Item = i32;
        async fn extract(&self) -> Result<Vec<Self::Item>> {
            Ok(self.0.clone())
        }
    }

    struct DoubleTransformer;

    impl Transformer for DoubleTransformer {
        type Input = i32;
        type Output = i32;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            if input == 13 {
                eyre::bail!("unlucky");
            }
            Ok(input * 2)
        }
    }

    struct SumLoader {
        sum: Arc<Mutex<i32>>,
        calls: Arc<Mutex<usize>>,
    }

    impl Loader for SumLoader {
        type Item = i32;
        async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
            *self.sum.lock().unwrap() = items.iter().sum();
            *self.calls.lock().unwrap() += 1;
            Ok(items.len())
        }
    }

    fn sum_loader() -> (SumLoader, Arc<Mutex<i32>>, Arc<Mutex<usize>>) {
        let sum = Arc::new(Mutex::new(0));
        let calls = Arc::new(Mutex::new(0));
        (
            SumLoader {
                sum: sum.clone(),
                calls: calls.clone(),
            },
            sum,
            calls,
        )
    }

    #[tokio::test]
    async fn test_pipeline() {
        let (loader, sum, _) = sum_loader();
        let pipeline = Pipeline::new(MockExtractor(vec![1, 2, 3]), DoubleTransformer, loader);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.extracted, 3);
        assert_eq!(summary.loaded, 3);
        assert!(summary.is_complete());
        assert_eq!(*sum.lock().unwrap(), 12); // (1+2+3)*2 = 12
    }

    #[tokio::test]
    async fn test_empty_pipeline_still_loads() {
        let (loader, _, calls) = sum_loader();
        let pipeline = Pipeline::new(MockExtractor(vec![]), DoubleTransformer, loader);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary, PipelineSummary::default());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transform_failure_skips_load() {
        let (loader, _, calls) = sum_loader();
        let pipeline = Pipeline::new(MockExtractor(vec![1, 13, 3]), DoubleTransformer, loader);

        assert!(pipeline.run().await.is_err());
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
