//! Output directory layout for intermediate files

use super::json_array::TEMP_PREFIX;
use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Records pulled from the source store
pub const EXTRACTED_FILE: &str = "extracted_data.json";
/// Records reshaped for the target table
pub const TRANSFORMED_FILE: &str = "transformed_data.json";
/// Source records whose discriminator had no mapping
pub const QUARANTINED_FILE: &str = "quarantined_data.json";

/// The directory that carries intermediate files between stages
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl OutputDirectory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create the directory if needed and return it
    pub fn ensure(path: impl AsRef<Path>) -> Result<Self> {
        let dir = Self::new(path);
        std::fs::create_dir_all(&dir.path).with_context(|| {
            format!("Failed to create output directory: {}", dir.path.display())
        })?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extracted(&self) -> PathBuf {
        self.path.join(EXTRACTED_FILE)
    }

    pub fn transformed(&self) -> PathBuf {
        self.path.join(TRANSFORMED_FILE)
    }

    pub fn quarantined(&self) -> PathBuf {
        self.path.join(QUARANTINED_FILE)
    }

    /// Remove the transform outputs of an earlier run
    ///
    /// Called when a transform fails so a later load cannot pick up records
    /// that no longer match the extracted file. Returns the number of files
    /// removed.
    pub fn discard_transformed(&self) -> Result<usize> {
        let mut removed = 0;
        for path in [self.transformed(), self.quarantined()] {
            if path.exists() {
                log::warn!("Removing stale {}", path.display());
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove generated JSON files and leftover temp files
    ///
    /// Anything else, such as a `.gitkeep` placeholder, is kept.
    /// Returns the number of files removed.
    pub fn clean(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }

            let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
            let is_temp = entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX);

            if is_json || is_temp {
                log::debug!("Removing {}", path.display());
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}
