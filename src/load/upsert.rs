//! Upsert loader with an explicit transaction policy

use super::store::{FailedRecord, LoadPolicy, LoadReport, RecordStore};
use crate::etl::Loader;
use crate::transform::TransformedRecord;
use eyre::{Context, Result};

/// Loader that upserts transformed records into a [`RecordStore`]
///
/// Records are applied in input order inside a single transaction. Under
/// [`LoadPolicy::AllOrNothing`] the first failure rolls everything back and
/// is returned as an error. Under [`LoadPolicy::BestEffort`] each record gets
/// its own savepoint, failures are collected in the [`LoadReport`], and the
/// remaining records are committed.
pub struct UpsertLoader<S> {
    store: S,
    policy: LoadPolicy,
}

impl<S: RecordStore> UpsertLoader<S> {
    pub fn new(store: S, policy: LoadPolicy) -> Self {
        Self { store, policy }
    }

    /// Load records and return the full report
    pub async fn load_report(&self, records: &[TransformedRecord]) -> Result<LoadReport> {
        self.store.begin().await?;

        match self.apply(records).await {
            Ok(report) => {
                self.store.commit().await.wrap_err("Failed to commit load")?;
                Ok(report)
            }
            Err(e) => {
                log::error!("Load aborted, rolling back: {:#}", e);
                if let Err(rollback) = self.store.rollback().await {
                    log::error!("Rollback failed: {:#}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, records: &[TransformedRecord]) -> Result<LoadReport> {
        let mut report = LoadReport {
            attempted: records.len(),
            ..LoadReport::default()
        };

        for record in records {
            match self.policy {
                LoadPolicy::AllOrNothing => {
                    self.store
                        .upsert(record)
                        .await
                        .with_context(|| format!("Failed to upsert record '{}'", record.id))?;
                    report.upserted += 1;
                }
                LoadPolicy::BestEffort => {
                    self.store.savepoint().await?;
                    match self.store.upsert(record).await {
                        Ok(()) => {
                            self.store.release_savepoint().await?;
                            report.upserted += 1;
                        }
                        Err(e) => {
                            log::warn!("Skipping record '{}': {:#}", record.id, e);
                            self.store.rollback_to_savepoint().await?;
                            report.failed.push(FailedRecord {
                                id: record.id.clone(),
                                reason: format!("{:#}", e),
                            });
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

impl<S: RecordStore> Loader for UpsertLoader<S> {
    type Item = TransformedRecord;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        let report = self.load_report(&items).await?;

        if report.is_complete() {
            log::info!("{} ({})", report, self.policy);
        } else {
            log::warn!("{} ({})", report, self.policy);
            for failed in &report.failed {
                log::warn!("  failed '{}': {}", failed.id, failed.reason);
            }
        }

        Ok(report.upserted)
    }
}
