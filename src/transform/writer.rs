//! Writes transform results to the transformed and quarantine files

use super::record::Reshaped;
use crate::etl::Loader;
use crate::storage::{JsonArrayWriter, OutputDirectory};
use eyre::{Context, Result};
use std::path::PathBuf;

/// Loader that splits reshaped records between two JSON array files
///
/// Mapped records go to `transformed_data.json`. Quarantined source records
/// go to `quarantined_data.json`, which is removed when a run quarantines
/// nothing so it never describes an older run.
pub struct TransformOutputWriter {
    records: JsonArrayWriter,
    quarantine: PathBuf,
}

impl TransformOutputWriter {
    pub fn new(dir: &OutputDirectory) -> Self {
        Self {
            records: JsonArrayWriter::new(dir.transformed()),
            quarantine: dir.quarantined(),
        }
    }

    /// Write both files, returning (records, quarantined) counts
    pub fn write(&self, items: Vec<Reshaped>) -> Result<(usize, usize)> {
        let mut records = Vec::with_capacity(items.len());
        let mut quarantined = Vec::new();
        for item in items {
            match item {
                Reshaped::Record(record) => records.push(record),
                Reshaped::Quarantined(source) => quarantined.push(source),
            }
        }

        let written = self.records.write(&records)?;

        if quarantined.is_empty() {
            if self.quarantine.exists() {
                std::fs::remove_file(&self.quarantine).with_context(|| {
                    format!(
                        "Failed to remove stale quarantine file: {}",
                        self.quarantine.display()
                    )
                })?;
            }
        } else {
            JsonArrayWriter::new(&self.quarantine).write(&quarantined)?;
            log::warn!(
                "{} record(s) quarantined to {}",
                quarantined.len(),
                self.quarantine.display()
            );
        }

        Ok((written, quarantined.len()))
    }
}

impl Loader for TransformOutputWriter {
    type Item = Reshaped;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        let (written, _) = self.write(items)?;
        Ok(written)
    }
}
