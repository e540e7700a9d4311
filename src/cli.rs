//! Stage runners behind the CLI subcommands
//!
//! Each stage reads and writes files under one output directory, so any
//! stage can be re-run on its own:
//!
//! ```text
//! extract:   MongoDB → extracted_data.json
//! transform: extracted_data.json → RecordReshaper → transformed_data.json (+ quarantined_data.json)
//! load:      transformed_data.json → UpsertLoader → PostgreSQL
//! ```

use crate::{
    client::{MongoSource, PostgresStore},
    config::{SettingsProvider, SourceConfig, TargetConfig},
    etl::{IdentityTransformer, Pipeline, PipelineSummary},
    extract::{CollectionExtractor, DocumentSource},
    load::{LoadPolicy, RecordStore, UpsertLoader},
    storage::{JsonArrayReader, OutputDirectory},
    transform::{
        FieldMapping, RecordReshaper, TransformOutputWriter, TransformedRecord,
        UnknownDiscriminatorPolicy,
    },
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Options for the extract stage
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ExtractOptions {
    /// Collection to extract, repeatable or comma separated (defaults to MONGO_COLLECTIONS)
    #[arg(short, long = "collection", value_delimiter = ',')]
    pub collections: Vec<String>,
}

/// Options for the transform stage
#[derive(Debug, Clone, Default, clap::Args)]
pub struct TransformOptions {
    /// Field mapping YAML (defaults to the built-in mapping, see config/mapping.yml)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,

    /// Quarantine records with an unknown discriminator instead of failing
    #[arg(long)]
    pub quarantine_unknown: bool,
}

/// Options for the load stage
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LoadOptions {
    /// Target table (defaults to PG_TABLE, then catalog_records)
    #[arg(short, long)]
    pub table: Option<String>,

    /// What to do when a single record fails to upsert
    #[arg(long, value_enum, default_value_t = LoadPolicy::AllOrNothing)]
    pub policy: LoadPolicy,
}

/// Extract the configured collections into `extracted_data.json`
pub async fn extract(
    output_dir: impl AsRef<Path>,
    options: &ExtractOptions,
    settings: &dyn SettingsProvider,
) -> Result<usize> {
    let config = SourceConfig::resolve(settings, &options.collections)?;
    extract_from(config, output_dir).await
}

async fn extract_from(config: SourceConfig, output_dir: impl AsRef<Path>) -> Result<usize> {
    let source = connect_source(&config).await?;
    let result = extract_with(&source, &config.collections, output_dir).await;
    source.shutdown().await;
    result
}

async fn connect_source(config: &SourceConfig) -> Result<MongoSource> {
    log::info!(
        "Extracting {} from {}/{}",
        config.collections.join(", ").cyan(),
        config.hosts.bright_black(),
        config.database.bright_black()
    );
    MongoSource::connect(config)
        .await
        .wrap_err("Extract stage failed")
}

/// Extract `collections` from any [`DocumentSource`] into `extracted_data.json`
pub async fn extract_with<D: DocumentSource>(
    source: &D,
    collections: &[String],
    output_dir: impl AsRef<Path>,
) -> Result<usize> {
    let dir = OutputDirectory::ensure(output_dir)?;

    let count = CollectionExtractor::new(source, collections)
        .extract_to(dir.extracted())
        .await
        .wrap_err("Extract stage failed")?;

    log::info!(
        "✓ Wrote {} record(s) to {}",
        count,
        dir.extracted().display().bright_black()
    );
    Ok(count)
}

/// Reshape `extracted_data.json` into `transformed_data.json`
///
/// Fails without writing anything if any record cannot be mapped and the
/// unknown discriminator policy is `fail`. Outputs of an earlier run are
/// removed on failure so `load` never sees them.
pub async fn transform(
    output_dir: impl AsRef<Path>,
    options: &TransformOptions,
) -> Result<PipelineSummary> {
    let dir = OutputDirectory::new(output_dir);
    let input = dir.extracted();
    if !input.exists() {
        eyre::bail!(
            "{} not found, run the extract stage first",
            input.display()
        );
    }

    let mut mapping = match &options.mapping {
        Some(path) => FieldMapping::read(path)?,
        None => FieldMapping::default(),
    };
    if options.quarantine_unknown {
        mapping = mapping.with_policy(UnknownDiscriminatorPolicy::Quarantine);
    }

    log::info!(
        "Transforming {} ({} record type(s), unknown discriminators: {})",
        input.display().bright_black(),
        mapping.record_types.len(),
        mapping.on_unknown_discriminator.cyan()
    );

    let pipeline = Pipeline::new(
        JsonArrayReader::<Value>::new(&input),
        RecordReshaper::new(mapping),
        TransformOutputWriter::new(&dir),
    );
    let summary = match pipeline.run().await {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(cleanup) = dir.discard_transformed() {
                log::error!("{:#}", cleanup);
            }
            return Err(e.wrap_err("Transform stage failed"));
        }
    };

    log::info!(
        "✓ Wrote {} record(s) to {}",
        summary.loaded,
        dir.transformed().display().bright_black()
    );
    Ok(summary)
}

/// Upsert `transformed_data.json` into the PostgreSQL target table
pub async fn load(
    output_dir: impl AsRef<Path>,
    options: &LoadOptions,
    settings: &dyn SettingsProvider,
) -> Result<PipelineSummary> {
    let config = TargetConfig::resolve(settings, options.table.as_deref())?;
    load_to(&config, output_dir, options.policy).await
}

async fn load_to(
    config: &TargetConfig,
    output_dir: impl AsRef<Path>,
    policy: LoadPolicy,
) -> Result<PipelineSummary> {
    let dir = OutputDirectory::new(output_dir);
    if !dir.transformed().exists() {
        eyre::bail!(
            "{} not found, run the transform stage first",
            dir.transformed().display()
        );
    }

    let store = connect_target(config, policy).await?;
    load_into(dir.path(), store, policy).await
}

async fn connect_target(config: &TargetConfig, policy: LoadPolicy) -> Result<PostgresStore> {
    log::info!(
        "Loading into {} on {}:{}/{} ({})",
        config.table.cyan(),
        config.host.bright_black(),
        config.port.bright_black(),
        config.database.bright_black(),
        policy
    );
    PostgresStore::connect(config)
        .await
        .wrap_err("Load stage failed")
}

/// Upsert `transformed_data.json` into any [`RecordStore`]
pub async fn load_into<S: RecordStore>(
    output_dir: impl AsRef<Path>,
    store: S,
    policy: LoadPolicy,
) -> Result<PipelineSummary> {
    let dir = OutputDirectory::new(output_dir);

    let pipeline = Pipeline::new(
        JsonArrayReader::<TransformedRecord>::new(dir.transformed()),
        IdentityTransformer::new(),
        UpsertLoader::new(store, policy),
    );
    let summary = pipeline.run().await.wrap_err("Load stage failed")?;

    if summary.is_complete() {
        log::info!(
            "✓ Upserted {} of {} record(s)",
            summary.loaded,
            summary.extracted
        );
    } else {
        log::warn!(
            "Upserted {} of {} record(s), {} failed",
            summary.loaded,
            summary.extracted,
            (summary.extracted - summary.loaded).red()
        );
    }
    Ok(summary)
}

/// Remove generated files from the output directory
pub fn clean(output_dir: impl AsRef<Path>) -> Result<usize> {
    let dir = OutputDirectory::new(output_dir);
    let removed = dir
        .clean()
        .with_context(|| format!("Failed to clean {}", dir.path().display()))?;
    log::info!(
        "✓ Removed {} generated file(s) from {}",
        removed,
        dir.path().display().bright_black()
    );
    Ok(removed)
}

/// Run extract, transform and load in order, stopping at the first failure
///
/// Source and target settings are both resolved before anything runs, so
/// a missing setting or prompt happens up front.
pub async fn run_all(
    output_dir: impl AsRef<Path>,
    extract_options: &ExtractOptions,
    transform_options: &TransformOptions,
    load_options: &LoadOptions,
    settings: &dyn SettingsProvider,
) -> Result<PipelineSummary> {
    let source = SourceConfig::resolve(settings, &extract_options.collections)?;
    let target = TargetConfig::resolve(settings, load_options.table.as_deref())?;
    let policy = load_options.policy;

    let mongo = connect_source(&source).await?;
    let result = run_with(
        output_dir,
        &mongo,
        &source.collections,
        transform_options,
        || connect_target(&target, policy),
        policy,
    )
    .await;
    mongo.shutdown().await;
    result
}

/// Run all three stages against any source and store
///
/// `connect` is only called once extract and transform have succeeded, so
/// a failed earlier stage never touches the target.
pub async fn run_with<D, S, F, Fut>(
    output_dir: impl AsRef<Path>,
    source: &D,
    collections: &[String],
    transform_options: &TransformOptions,
    connect: F,
    policy: LoadPolicy,
) -> Result<PipelineSummary>
where
    D: DocumentSource,
    S: RecordStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let output_dir = output_dir.as_ref();

    log::info!("{} extract", "[1/3]".bright_black());
    extract_with(source, collections, output_dir).await?;

    log::info!("{} transform", "[2/3]".bright_black());
    transform(output_dir, transform_options).await?;

    log::info!("{} load", "[3/3]".bright_black());
    let store = connect().await?;
    load_into(output_dir, store, policy).await
}
