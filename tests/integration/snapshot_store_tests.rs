/*!
 * Tests for snapshots persisted in SQLite
 */

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tablewai::database::RunStatus;
use tablewai::records::{CellValue, Record};
use tablewai::snapshot::{SnapshotKey, SnapshotStore, SqliteSnapshotStore, TranslationSnapshot};
use tablewai::translation::RunMode;

use crate::common::{ScriptedBackend, chinese_catalog, create_temp_dir, hub_over, init_test_logging, orchestrator};

fn paused_snapshot() -> TranslationSnapshot {
    let mut priced = Record::from_pairs([("name", "Apple")]);
    priced.set("price", CellValue::Number(serde_json::Number::from(3)));
    TranslationSnapshot {
        target_language: "en".to_string(),
        records: vec![priced, Record::from_pairs([("name", "香蕉")]), Record::from_pairs([("name", "梨")])],
        completion_flags: vec![true, false, false],
        missing_rows: BTreeSet::from([1]),
        exhausted_rows: BTreeSet::from([2]),
        run_id: "run-1".to_string(),
        status: RunStatus::Paused,
        updated_at: Utc.with_ymd_and_hms(2026, 5, 4, 12, 30, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_save_thenReopen_shouldLoadIdenticalSnapshot() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("snapshots.db");
    let key = SnapshotKey::new("doc-hash", "en");

    {
        let store = SqliteSnapshotStore::open(&path).unwrap();
        store.save(&key, &paused_snapshot()).await.unwrap();
    }

    let store = SqliteSnapshotStore::open(&path).unwrap();
    let loaded = store.load(&key).await.unwrap().unwrap();
    assert_eq!(loaded, paused_snapshot());
    assert_eq!(loaded.completed_rows(), 1);

    // Keys differ by target language
    assert!(store.load(&SnapshotKey::new("doc-hash", "fr")).await.unwrap().is_none());

    assert!(store.clear(&key).await.unwrap());
    assert!(!store.clear(&key).await.unwrap());
    assert!(store.load(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_run_interruptedAndReopened_shouldResumeFromDisk() {
    init_test_logging();
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("progress.db");
    let key = SnapshotKey::new("catalog", "en");
    let source = chinese_catalog(6);

    let first = Arc::new(ScriptedBackend::new("primary"));
    {
        let store = SqliteSnapshotStore::open(&path).unwrap();
        let orchestrator = orchestrator(hub_over(vec![first.clone()]), Arc::new(store), 2);
        let pause = orchestrator.pause_handle();
        let paused = orchestrator
            .run(&key, &source, RunMode::Fresh, |_| pause.pause())
            .await
            .unwrap();
        assert_eq!(paused.status, RunStatus::Paused);
        assert_eq!(paused.completed_rows, 2);
    }

    // A new process: new store, new hub, empty cache
    let second = Arc::new(ScriptedBackend::new("primary"));
    let store = SqliteSnapshotStore::open(&path).unwrap();
    let orchestrator = orchestrator(hub_over(vec![second.clone()]), Arc::new(store.clone()), 2);

    let outcome = orchestrator.run(&key, &source, RunMode::Resume, |_| {}).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.completed_rows, 6);
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 2);

    let resent: Vec<String> = second
        .requests()
        .iter()
        .flatten()
        .filter_map(|record| record.text("name").map(str::to_string))
        .collect();
    assert_eq!(resent, vec!["梨", "红色苹果", "进口香蕉", "苹果"]);

    let snapshot = store.load(&key).await.unwrap().unwrap();
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.records[0].text("name"), Some("Apple"));
    assert_eq!(snapshot.records[0].text("sku"), Some("SKU-0000"));
}
