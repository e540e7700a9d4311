//! Target store abstraction used by the upsert loader

use crate::transform::TransformedRecord;
use eyre::Result;
use std::future::Future;

/// A transactional table that accepts upserts keyed by record id
///
/// The table exists once the store is constructed. Transaction control is
/// explicit so the loader decides the failure policy. Savepoint calls only happen between `begin` and
/// `commit`/`rollback`, and never nest.
pub trait RecordStore: Send + Sync {
    fn begin(&self) -> impl Future<Output = Result<()>> + Send;

    /// Insert the record, or overwrite every column of the existing row
    fn upsert(&self, record: &TransformedRecord) -> impl Future<Output = Result<()>> + Send;

    fn savepoint(&self) -> impl Future<Output = Result<()>> + Send;

    fn release_savepoint(&self) -> impl Future<Output = Result<()>> + Send;

    fn rollback_to_savepoint(&self) -> impl Future<Output = Result<()>> + Send;

    fn commit(&self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(&self) -> impl Future<Output = Result<()>> + Send;
}

/// How per-record upsert failures are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LoadPolicy {
    /// One transaction; the first failure rolls back the whole run
    #[default]
    AllOrNothing,
    /// One savepoint per record; failures are reported and skipped
    BestEffort,
}

impl std::fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllOrNothing => write!(f, "all-or-nothing"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// A record the store refused under the best-effort policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub id: String,
    pub reason: String,
}

/// Outcome of one load run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub upserted: usize,
    pub failed: Vec<FailedRecord>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.upserted == self.attempted
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upserted {} of {} records", self.upserted, self.attempted)?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        Ok(())
    }
}
