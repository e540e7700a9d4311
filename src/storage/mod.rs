//! File system storage for intermediate stage files
//!
//! This module handles all file I/O between stages:
//! - Atomic JSON array reading/writing
//! - Output directory layout and cleanup

mod directory;
mod json_array;

pub use directory::{EXTRACTED_FILE, OutputDirectory, QUARANTINED_FILE, TRANSFORMED_FILE};
pub use json_array::{JsonArrayReader, JsonArrayStream, JsonArrayWriter, TEMP_PREFIX};
