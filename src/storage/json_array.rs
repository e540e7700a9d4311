//! JSON array file operations
//!
//! Intermediate files are a single JSON array with one record per line.
//! Writes go to a temp file in the destination directory and are renamed
//! into place only after the closing bracket is flushed, so a reader never
//! sees a partial array.

use crate::etl::Extractor;

use eyre::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix of in-flight temp files, so `clean` can find leftovers
pub const TEMP_PREFIX: &str = ".catmig-";

/// Read a JSON array file into typed records
pub struct JsonArrayReader<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonArrayReader<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every element of the array
    pub fn read(&self) -> Result<Vec<T>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open JSON file: {}", self.path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Malformed JSON array in {}", self.path.display()))
    }
}

impl<T> Extractor for JsonArrayReader<T>
where
    T: DeserializeOwned + Send,
{
    type Item = T;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }
}

/// Incremental, atomic JSON array writer
///
/// Elements are serialized as they are pushed, so the caller never needs the
/// whole record set in memory. Dropping the stream without calling
/// [`JsonArrayStream::finish`] discards the temp file and leaves any existing
/// destination untouched.
pub struct JsonArrayStream {
    path: PathBuf,
    writer: BufWriter<NamedTempFile>,
    count: usize,
}

impl JsonArrayStream {
    /// Open a temp file next to `path` and write the opening bracket
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

        let mut writer = BufWriter::new(temp);
        writer.write_all(b"[")?;

        Ok(Self {
            path,
            writer,
            count: 0,
        })
    }

    /// Append one element
    pub fn push<T: Serialize + ?Sized>(&mut self, item: &T) -> Result<()> {
        let separator: &[u8] = if self.count == 0 { b"\n" } else { b",\n" };
        self.writer.write_all(separator)?;
        serde_json::to_writer(&mut self.writer, item)
            .with_context(|| format!("Failed to serialize element {}", self.count))?;
        self.count += 1;
        Ok(())
    }

    /// Number of elements pushed so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Close the array, sync, and rename over the destination
    pub fn finish(mut self) -> Result<usize> {
        let closing: &[u8] = if self.count == 0 { b"]\n" } else { b"\n]\n" };
        self.writer.write_all(closing)?;

        let temp = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| "Failed to flush JSON array")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to write JSON file: {}", self.path.display()))?;

        Ok(self.count)
    }
}

/// Write a complete JSON array in one call
pub struct JsonArrayWriter {
    path: PathBuf,
}

impl JsonArrayWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the file with `items`
    pub fn write<T: Serialize>(&self, items: &[T]) -> Result<usize> {
        let mut stream = JsonArrayStream::create(&self.path)?;
        for item in items {
            stream.push(item)?;
        }
        stream.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count()
    }

    #[test]
    fn test_read_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.json");

        let data = vec![json!({"a": 1}), json!({"b": [1, 2]})];
        let written = JsonArrayWriter::new(&path).write(&data).unwrap();
        assert_eq!(written, 2);

        let read: Vec<Value> = JsonArrayReader::new(&path).read().unwrap();
        assert_eq!(data, read);
        assert_eq!(temp_files(temp.path()), 0);
    }

    #[test]
    fn test_empty_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.json");

        JsonArrayWriter::new(&path).write::<Value>(&[]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
        let read: Vec<Value> = JsonArrayReader::new(&path).read().unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_one_record_per_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lines.json");

        JsonArrayWriter::new(&path)
            .write(&[json!({"id": "1"}), json!({"id": "2"})])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[\n{\"id\":\"1\"},\n{\"id\":\"2\"}\n]\n");
    }

    #[test]
    fn test_dropped_stream_keeps_previous_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.json");
        JsonArrayWriter::new(&path).write(&[json!(1)]).unwrap();

        {
            let mut stream = JsonArrayStream::create(&path).unwrap();
            stream.push(&json!(2)).unwrap();
            stream.push(&json!(3)).unwrap();
            assert_eq!(temp_files(temp.path()), 1);
        }

        let read: Vec<Value> = JsonArrayReader::new(&path).read().unwrap();
        assert_eq!(read, vec![json!(1)]);
        assert_eq!(temp_files(temp.path()), 0);
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();

        let err = JsonArrayReader::<Value>::new(&path).read().unwrap_err();
        assert!(err.to_string().contains("Malformed JSON array"));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = JsonArrayReader::<Value>::new(temp.path().join("nope.json"))
            .read()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open JSON file"));
    }
}
