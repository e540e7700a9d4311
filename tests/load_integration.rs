//! Integration tests for the load stage and the whole file pipeline
//!
//! The target table is modelled by an in-memory [`RecordStore`] with the
//! same transaction and savepoint semantics the loader relies on.

use catalog_migrator::cli::{self, TransformOptions};
use catalog_migrator::etl::PipelineSummary;
use catalog_migrator::load::{LoadPolicy, RecordStore, UpsertLoader};
use catalog_migrator::storage::{JsonArrayWriter, OutputDirectory};
use catalog_migrator::transform::TransformedRecord;
use eyre::Result;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type Table = BTreeMap<String, TransformedRecord>;

#[derive(Default)]
struct State {
    committed: Table,
    working: Option<Table>,
    savepoint: Option<Table>,
    reject: HashSet<String>,
    commits: usize,
    calls: Vec<&'static str>,
}

/// In-memory table keyed by id
#[derive(Clone, Default)]
struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn rejecting(ids: &[&str]) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().reject = ids.iter().map(|s| s.to_string()).collect();
        store
    }

    fn rows(&self) -> Table {
        self.state.lock().unwrap().committed.clone()
    }

    fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    fn in_transaction(&self) -> bool {
        self.state.lock().unwrap().working.is_some()
    }

    fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl RecordStore for MemoryStore {
    async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("begin");
        if state.working.is_some() {
            eyre::bail!("transaction already open");
        }
        state.working = Some(state.committed.clone());
        Ok(())
    }

    async fn upsert(&self, record: &TransformedRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("upsert");
        if state.reject.contains(&record.id) {
            eyre::bail!("constraint violation for {}", record.id);
        }
        let Some(working) = state.working.as_mut() else {
            eyre::bail!("no transaction");
        };
        working.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn savepoint(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("savepoint");
        state.savepoint = state.working.clone();
        Ok(())
    }

    async fn release_savepoint(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("release_savepoint");
        state.savepoint = None;
        Ok(())
    }

    async fn rollback_to_savepoint(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("rollback_to_savepoint");
        state.working = state.savepoint.take();
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("commit");
        let Some(working) = state.working.take() else {
            eyre::bail!("no transaction");
        };
        state.committed = working;
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("rollback");
        state.working = None;
        Ok(())
    }
}

fn record(id: &str, is_active: bool) -> TransformedRecord {
    let mut data = Map::new();
    data.insert("extra".to_string(), json!("x"));
    TransformedRecord {
        id: id.to_string(),
        category_id: Some("c1".to_string()),
        is_active: Some(is_active),
        record_type: "TYPE_A".to_string(),
        data,
    }
}

fn write_transformed(dir: &OutputDirectory, records: &[TransformedRecord]) -> Result<()> {
    JsonArrayWriter::new(dir.transformed()).write(records)?;
    Ok(())
}

#[tokio::test]
async fn test_full_pipeline_scenario() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    JsonArrayWriter::new(dir.extracted()).write(&[json!({
        "_id": "1",
        "categoryId": "c1",
        "isActive": true,
        "_class": "TypeA",
        "extra": "x"
    })])?;

    cli::transform(temp.path(), &TransformOptions::default()).await?;

    let store = MemoryStore::default();
    let summary = cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;
    assert_eq!(summary.loaded, 1);
    assert!(summary.is_complete());

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        serde_json::to_value(&rows["1"])?,
        json!({
            "id": "1",
            "category_id": "c1",
            "is_active": true,
            "record_type": "TYPE_A",
            "data": {"extra": "x"}
        })
    );

    Ok(())
}

#[tokio::test]
async fn test_reload_updates_in_place() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    let store = MemoryStore::default();

    write_transformed(&dir, &[record("1", true)])?;
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    write_transformed(&dir, &[record("1", false)])?;
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["1"].is_active, Some(false));
    assert_eq!(store.commits(), 2);

    Ok(())
}

#[tokio::test]
async fn test_same_record_twice_is_last_write_wins() -> Result<()> {
    let store = MemoryStore::default();
    let loader = UpsertLoader::new(store.clone(), LoadPolicy::AllOrNothing);

    let mut second = record("1", false);
    second.data.insert("extra".to_string(), json!("y"));
    let report = loader.load_report(&[record("1", true), second.clone()]).await?;

    assert_eq!(report.upserted, 2);
    assert_eq!(store.rows().into_values().collect::<Vec<_>>(), vec![second]);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_rerun_is_noop() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    let sources: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "_id": i.to_string(),
                "_class": "TypeB",
                "categoryId": "c2",
                "isActive": i % 2 == 0,
                "payload": {"n": i}
            })
        })
        .collect();
    JsonArrayWriter::new(dir.extracted()).write(&sources)?;

    let store = MemoryStore::default();
    cli::transform(temp.path(), &TransformOptions::default()).await?;
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;
    let first = store.rows();

    cli::transform(temp.path(), &TransformOptions::default()).await?;
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    assert_eq!(first.len(), 10);
    assert_eq!(store.rows(), first);
    Ok(())
}

#[tokio::test]
async fn test_all_or_nothing_rolls_back() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    let store = MemoryStore::rejecting(&["2"]);

    write_transformed(&dir, &[record("1", true)])?;
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    write_transformed(
        &dir,
        &[record("1", false), record("2", true), record("3", true)],
    )?;
    let err = cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to upsert record '2'"));
    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["1"].is_active, Some(true));
    assert!(!store.in_transaction());

    Ok(())
}

#[tokio::test]
async fn test_best_effort_reports_failures() -> Result<()> {
    let store = MemoryStore::rejecting(&["2"]);
    let loader = UpsertLoader::new(store.clone(), LoadPolicy::BestEffort);

    let report = loader
        .load_report(&[record("1", true), record("2", true), record("3", true)])
        .await?;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "2");
    assert!(report.failed[0].reason.contains("constraint violation"));
    assert_eq!(report.to_string(), "upserted 2 of 3 records, 1 failed");

    let rows = store.rows();
    assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["1", "3"]);
    Ok(())
}

#[tokio::test]
async fn test_best_effort_summary_through_stage() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    write_transformed(&dir, &[record("1", true), record("2", true)])?;

    let summary = cli::load_into(
        temp.path(),
        MemoryStore::rejecting(&["1"]),
        LoadPolicy::BestEffort,
    )
    .await?;

    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.loaded, 1);
    assert!(!summary.is_complete());
    Ok(())
}

#[tokio::test]
async fn test_empty_file_commits_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    write_transformed(&dir, &[])?;

    let store = MemoryStore::default();
    let summary = cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    assert_eq!(summary.loaded, 0);
    assert!(store.rows().is_empty());
    assert_eq!(store.commits(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_transformed_file() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    std::fs::write(
        dir.transformed(),
        r#"[{"id": "1", "record_type": "TYPE_A", "data": {}, "unexpected": 1}]"#,
    )?;

    let store = MemoryStore::default();
    let err = cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Malformed JSON array"));
    assert_eq!(store.commits(), 0);
    Ok(())
}

#[tokio::test]
async fn test_load_only_uses_transaction_calls() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    write_transformed(&dir, &[record("1", true), record("2", true)])?;

    let store = MemoryStore::default();
    cli::load_into(temp.path(), store.clone(), LoadPolicy::AllOrNothing).await?;

    assert_eq!(store.calls(), ["begin", "upsert", "upsert", "commit"]);
    Ok(())
}

fn catalog_source() -> BTreeMap<String, Vec<Value>> {
    BTreeMap::from([
        (
            "datasets".to_string(),
            vec![json!({"_id": "d1", "_class": "TypeA", "categoryId": "c1", "isActive": true})],
        ),
        (
            "services".to_string(),
            vec![json!({"_id": "s1", "_class": "TypeB", "title": "API"})],
        ),
    ])
}

#[tokio::test]
async fn test_run_all_stages() -> Result<()> {
    let temp = TempDir::new()?;
    let source = catalog_source();
    let collections = vec!["datasets".to_string(), "services".to_string()];
    let store = MemoryStore::default();

    let summary: PipelineSummary = cli::run_with(
        temp.path(),
        &source,
        &collections,
        &TransformOptions::default(),
        || async { Ok::<_, eyre::Report>(store.clone()) },
        LoadPolicy::AllOrNothing,
    )
    .await?;

    assert_eq!(summary.loaded, 2);
    assert!(summary.is_complete());
    let rows = store.rows();
    assert_eq!(rows["d1"].record_type, "TYPE_A");
    assert_eq!(rows["s1"].record_type, "TYPE_B");
    assert_eq!(rows["s1"].data["title"], "API");
    Ok(())
}

#[tokio::test]
async fn test_run_stops_when_transform_fails() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    let mut source = catalog_source();
    source
        .get_mut("services")
        .unwrap()
        .push(json!({"_id": "x1", "_class": "com.example.Unknown"}));
    let collections = vec!["datasets".to_string(), "services".to_string()];
    let store = MemoryStore::default();
    let connected = AtomicBool::new(false);

    let err = cli::run_with(
        temp.path(),
        &source,
        &collections,
        &TransformOptions::default(),
        || async {
            connected.store(true, Ordering::SeqCst);
            Ok::<_, eyre::Report>(store.clone())
        },
        LoadPolicy::AllOrNothing,
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("Transform stage failed"));
    assert!(!connected.load(Ordering::SeqCst));
    assert!(store.calls().is_empty());
    assert!(dir.extracted().exists());
    assert!(!dir.transformed().exists());
    Ok(())
}

#[tokio::test]
async fn test_run_stops_when_target_unreachable() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = OutputDirectory::new(temp.path());
    let collections = vec!["datasets".to_string()];

    let err = cli::run_with(
        temp.path(),
        &catalog_source(),
        &collections,
        &TransformOptions::default(),
        || async { Err::<MemoryStore, _>(eyre::eyre!("connection refused")) },
        LoadPolicy::AllOrNothing,
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("connection refused"));
    assert!(dir.transformed().exists());
    Ok(())
}
