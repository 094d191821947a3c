//! Integration tests for harvester-store
//!
//! These tests exercise the table and checkpoint together through the sink,
//! including restarts after simulated crashes.

use harvester_domain::{CheckpointStore, ExtractionResult, FieldValue, WorkItem};
use harvester_store::{
    AnyCheckpoint, CheckpointError, CheckpointFormat, FileCheckpoint, OutputTable, ResultSink,
    RowChange, SinkError,
};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn priced(key: &str, price: f64) -> ExtractionResult {
    let mut result = ExtractionResult::new(key, format!("https://shop.test/dp/{}", key));
    result.fields.push(("price".to_string(), FieldValue::Number(price)));
    result
}

/// Checkpoint that asserts the row is already published when it is appended
struct ObservingCheckpoint {
    table_path: PathBuf,
    keys: HashSet<String>,
    fail: bool,
}

impl CheckpointStore for ObservingCheckpoint {
    type Error = CheckpointError;

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, key: &str) -> Result<(), Self::Error> {
        let published = fs::read_to_string(&self.table_path).unwrap();
        assert!(
            published.lines().any(|line| line.starts_with(key)),
            "row for {} must be published before its checkpoint entry",
            key
        );
        if self.fail {
            return Err(CheckpointError::Corrupt("disk full".to_string()));
        }
        self.keys.insert(key.to_string());
        Ok(())
    }

    fn load_all(&self) -> Result<HashSet<String>, Self::Error> {
        Ok(self.keys.clone())
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

#[tokio::test]
async fn test_row_committed_before_checkpoint() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("out.csv");
    let table = OutputTable::open(&table_path, "asin").unwrap();
    let observer = ObservingCheckpoint {
        table_path: table_path.clone(),
        keys: HashSet::new(),
        fail: false,
    };
    let sink = ResultSink::new(table, observer);

    sink.commit(&WorkItem::new("B01"), &priced("B01", 10.0)).await.unwrap();
    sink.commit(&WorkItem::new("B02"), &priced("B02", 20.0)).await.unwrap();

    assert!(sink.is_checkpointed("B02").await);
}

#[tokio::test]
async fn test_checkpoint_failure_leaves_row_for_replay() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("out.csv");
    let table = OutputTable::open(&table_path, "asin").unwrap();
    let observer = ObservingCheckpoint {
        table_path: table_path.clone(),
        keys: HashSet::new(),
        fail: true,
    };
    let sink = ResultSink::new(table, observer);

    let err = sink
        .commit(&WorkItem::new("B01"), &priced("B01", 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Checkpoint { .. }));
    assert!(!sink.is_checkpointed("B01").await);

    // The replay on the next run replaces the row instead of duplicating it
    let (table, _) = sink.into_parts();
    let checkpoint =
        FileCheckpoint::open(dir.path().join("done.txt"), CheckpointFormat::Lines).unwrap();
    let sink = ResultSink::new(table, checkpoint);
    let outcome = sink
        .commit(&WorkItem::new("B01"), &priced("B01", 11.0))
        .await
        .unwrap();

    assert_eq!(outcome.change, RowChange::Replaced);
    assert_eq!(outcome.rows, 1);
}

#[tokio::test]
async fn test_resume_after_restart() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("out.csv");
    let checkpoint_path = dir.path().join("done.csv");

    {
        let table = OutputTable::open(&table_path, "asin").unwrap();
        let checkpoint = AnyCheckpoint::open(&checkpoint_path, "asin1").unwrap();
        let sink = ResultSink::new(table, checkpoint);
        sink.commit(&WorkItem::new("A"), &priced("A", 1.0)).await.unwrap();
        sink.commit(&WorkItem::new("B"), &priced("B", 2.0)).await.unwrap();
    }

    let table = OutputTable::open(&table_path, "asin").unwrap();
    let checkpoint = AnyCheckpoint::open(&checkpoint_path, "asin1").unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.value("B", "price"), Some("2"));
    assert!(checkpoint.contains("A"));
    assert!(checkpoint.contains("B"));
    assert!(fs::read_to_string(&checkpoint_path)
        .unwrap()
        .starts_with("asin1\n"));
}

#[tokio::test]
async fn test_concurrent_commits_are_serialized() {
    let dir = TempDir::new().unwrap();
    let table = OutputTable::open(dir.path().join("out.csv"), "asin").unwrap();
    let checkpoint = AnyCheckpoint::open(dir.path().join("done.db"), "asin").unwrap();
    let sink = Arc::new(ResultSink::new(table, checkpoint));

    let mut handles = Vec::new();
    for i in 0..24 {
        let sink = Arc::clone(&sink);
        handles.push(tokio::spawn(async move {
            let key = format!("K{:02}", i);
            sink.commit(&WorkItem::new(key.clone()), &priced(&key, i as f64))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(sink.row_count().await, 24);
    assert_eq!(sink.checkpoint_len().await, 24);

    let reopened = OutputTable::open(dir.path().join("out.csv"), "asin").unwrap();
    assert_eq!(reopened.len(), 24);
}

#[tokio::test]
async fn test_new_field_columns_back_filled_across_items() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("out.csv");
    let table = OutputTable::open(&table_path, "asin").unwrap();
    let checkpoint =
        FileCheckpoint::open(dir.path().join("done.txt"), CheckpointFormat::Lines).unwrap();
    let sink = ResultSink::new(table, checkpoint);

    sink.commit(&WorkItem::new("A"), &priced("A", 1.0)).await.unwrap();

    let mut with_images = ExtractionResult::new("B", "https://shop.test/dp/B");
    with_images.fields.push((
        "image".to_string(),
        FieldValue::List(vec!["x.jpg".to_string(), "y.jpg".to_string()]),
    ));
    sink.commit(&WorkItem::new("B"), &with_images).await.unwrap();

    let table = OutputTable::open(&table_path, "asin").unwrap();
    assert_eq!(
        table.header(),
        &["asin", "price", "extracted_at", "image1", "image2"]
    );
    assert_eq!(table.value("A", "image2"), Some(""));
    assert_eq!(table.value("B", "price"), Some(""));
    assert_eq!(table.value("B", "image2"), Some("y.jpg"));
}
