/*!
 * Properties every orchestrator run must hold: idempotent resume, resume
 * equivalence, monotonic progress and untouched locked cells
 */

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tablewai::database::RunStatus;
use tablewai::snapshot::{MemorySnapshotStore, SnapshotKey};
use tablewai::translation::{BatchOrchestrator, OrchestratorSettings, ProgressEvent, RunMode};

use crate::common::{
    FOREIGN_ROWS, ScriptedBackend, chinese_catalog, hub_over, init_test_logging, mixed_catalog, orchestrator,
};

#[tokio::test]
async fn test_run_resumingCompleteSnapshot_shouldNotCallBackendOrSave() {
    init_test_logging();
    let backend = Arc::new(ScriptedBackend::new("primary"));
    let store = MemorySnapshotStore::new();
    let orchestrator = orchestrator(hub_over(vec![backend.clone()]), Arc::new(store.clone()), 2);
    let key = SnapshotKey::new("catalog", "en");
    let source = chinese_catalog(5);

    orchestrator.run(&key, &source, RunMode::Fresh, |_| {}).await.unwrap();
    let calls = backend.call_count();
    let saves = store.save_count();
    let before = store.peek(&key).unwrap();

    let again = orchestrator.run(&key, &source, RunMode::Resume, |_| {}).await.unwrap();

    assert_eq!(again.status, RunStatus::Completed);
    assert_eq!(again.batches_dispatched, 0);
    assert_eq!(again.completed_rows, 5);
    assert_eq!(backend.call_count(), calls);
    assert_eq!(store.save_count(), saves);
    assert_eq!(store.peek(&key).unwrap(), before);
}

#[tokio::test]
async fn test_run_pausedAfterAnyBatch_shouldMatchUninterruptedRun() {
    init_test_logging();
    let source = chinese_catalog(7);
    // Seven rows in batches of two
    let total_batches = 4;

    let straight_store = MemorySnapshotStore::new();
    let straight = orchestrator(
        hub_over(vec![Arc::new(ScriptedBackend::new("primary"))]),
        Arc::new(straight_store.clone()),
        2,
    );
    let straight_key = SnapshotKey::new("straight", "fr");
    straight.run(&straight_key, &source, RunMode::Fresh, |_| {}).await.unwrap();
    let expected = straight_store.peek(&straight_key).unwrap();

    for pause_after in 1..=total_batches {
        let backend = Arc::new(ScriptedBackend::new("primary"));
        let store = MemorySnapshotStore::new();
        let interrupted = orchestrator(hub_over(vec![backend.clone()]), Arc::new(store.clone()), 2);
        let key = SnapshotKey::new("interrupted", "fr");
        let pause = interrupted.pause_handle();

        let first = interrupted
            .run(&key, &source, RunMode::Fresh, |event| {
                if event.batch_index == pause_after {
                    pause.pause();
                }
            })
            .await
            .unwrap();

        if pause_after < total_batches {
            assert_eq!(first.status, RunStatus::Paused, "pause after {}", pause_after);
            assert_eq!(first.completed_rows, pause_after * 2, "pause after {}", pause_after);
            assert_eq!(store.peek(&key).unwrap().status, RunStatus::Paused);
        } else {
            // A pause requested after the final batch has nothing left to stop
            assert_eq!(first.status, RunStatus::Completed);
        }

        pause.resume();
        let resumed = interrupted.run(&key, &source, RunMode::Resume, |_| {}).await.unwrap();
        assert_eq!(resumed.status, RunStatus::Completed, "pause after {}", pause_after);
        assert_eq!(
            resumed.batches_dispatched,
            total_batches - pause_after,
            "pause after {}",
            pause_after
        );

        // No row was sent twice
        assert_eq!(backend.call_count(), total_batches, "pause after {}", pause_after);
        let sent_rows: usize = backend.requests().iter().map(Vec::len).sum();
        assert_eq!(sent_rows, 7, "pause after {}", pause_after);

        let actual = store.peek(&key).unwrap();
        assert_eq!(actual.records, expected.records, "pause after {}", pause_after);
        assert_eq!(actual.completion_flags, expected.completion_flags);
        assert_eq!(actual.missing_rows, expected.missing_rows);
    }
}

#[tokio::test]
async fn test_run_progressEvents_shouldNeverLoseCompletedRows() {
    init_test_logging();
    // Two of five batches fail, so some events add no completed rows
    let backend = Arc::new(ScriptedBackend::new("flaky").failing_calls([0, 3]));
    let orchestrator = orchestrator(hub_over(vec![backend]), Arc::new(MemorySnapshotStore::new()), 2);
    let key = SnapshotKey::new("catalog", "en");
    let mut events: Vec<ProgressEvent> = Vec::new();

    let outcome = orchestrator
        .run(&key, &chinese_catalog(10), RunMode::Fresh, |event| events.push(event.clone()))
        .await
        .unwrap();

    assert_eq!(events.len(), 5);
    for pair in events.windows(2) {
        assert!(pair[1].completed_rows >= pair[0].completed_rows);
        assert!(pair[1].percent >= pair[0].percent);
        assert_eq!(pair[1].batch_index, pair[0].batch_index + 1);
    }
    assert_eq!(events.last().map(|e| e.percent), Some(100));
    assert_eq!(events.last().map(|e| e.completed_rows), Some(outcome.completed_rows));
    assert_eq!(outcome.missing_rows, BTreeSet::from([0, 1, 6, 7]));
}

#[tokio::test]
async fn test_run_withLockedColumns_shouldNeverSendOrChangeThem() {
    init_test_logging();
    fn shout(text: &str, _target: &str) -> String {
        format!("{} (translated)", text.to_uppercase())
    }
    let backend = Arc::new(ScriptedBackend::new("primary").with_translator(shout));
    let store = MemorySnapshotStore::new();
    let orchestrator = orchestrator(hub_over(vec![backend.clone()]), Arc::new(store.clone()), 3);
    let key = SnapshotKey::new("mixed", "en");
    let source = mixed_catalog();

    orchestrator.run(&key, &source, RunMode::Fresh, |_| {}).await.unwrap();

    assert!(
        backend
            .requested_columns()
            .iter()
            .all(|columns| !columns.contains(&"id".to_string()))
    );
    let snapshot = store.peek(&key).unwrap();
    for (row, original) in source.iter().enumerate() {
        assert_eq!(snapshot.records[row].get("id"), original.get("id"));
    }
    assert_eq!(snapshot.records[1].text("name"), Some("ORANGE (translated)"));
}

#[tokio::test]
async fn test_run_inSelectiveMode_shouldSkipCellsAlreadyInTarget() {
    init_test_logging();
    let backend = Arc::new(ScriptedBackend::new("primary"));
    let store = MemorySnapshotStore::new();
    let orchestrator = BatchOrchestrator::new(hub_over(vec![backend.clone()]), Arc::new(store.clone())).with_settings(
        OrchestratorSettings {
            batch_size: 5,
            retry_batch_size: 3,
            inter_batch_delay: Duration::ZERO,
            selective: true,
            backend_preference: None,
        },
    );
    let key = SnapshotKey::new("mixed", "en");

    let outcome = orchestrator
        .run(&key, &mixed_catalog(), RunMode::Fresh, |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.completed_rows, 7);
    assert_eq!(outcome.batches_dispatched, 1);
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].len(), FOREIGN_ROWS.len());
    assert!(
        requests[0]
            .iter()
            .all(|record| record.text_cells().all(|(_, text)| !text.is_ascii()))
    );

    let snapshot = store.peek(&key).unwrap();
    assert_eq!(snapshot.records[3].text("desc"), Some("Sour"));
    assert_eq!(snapshot.records[2].text("desc"), Some("Imported banana"));
}

#[tokio::test]
async fn test_runWithAudit_afterFailedBatch_shouldRetryAndComeBackClean() {
    init_test_logging();
    let backend = Arc::new(ScriptedBackend::new("flaky").failing_calls([0]));
    let orchestrator = orchestrator(hub_over(vec![backend.clone()]), Arc::new(MemorySnapshotStore::new()), 5);
    let key = SnapshotKey::new("catalog", "en");

    let audited = orchestrator
        .run_with_audit(&key, &chinese_catalog(3), RunMode::Fresh, |_| {})
        .await
        .unwrap();

    assert_eq!(audited.retried_rows, BTreeSet::from([0, 1, 2]));
    assert!(audited.outcome.missing_rows.is_empty());
    assert_eq!(audited.outcome.completed_rows, 3);
    assert!(audited.audit.unwrap().is_clean());
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_abandonRows_shouldExcludeRowsFromLaterRuns() {
    init_test_logging();
    let backend = Arc::new(ScriptedBackend::new("primary").always_failing());
    let store = MemorySnapshotStore::new();
    let orchestrator = orchestrator(hub_over(vec![backend.clone()]), Arc::new(store.clone()), 5);
    let key = SnapshotKey::new("catalog", "en");
    let source = chinese_catalog(3);

    let outcome = orchestrator.run(&key, &source, RunMode::Fresh, |_| {}).await.unwrap();
    assert_eq!(outcome.missing_rows, BTreeSet::from([0, 1, 2]));

    let abandoned = orchestrator
        .abandon_rows(&key, &source, &BTreeSet::from([0, 1, 2]))
        .await
        .unwrap();
    assert_eq!(abandoned.exhausted_rows, BTreeSet::from([0, 1, 2]));
    assert_eq!(abandoned.status, RunStatus::Completed);
    assert!(!abandoned.retry_available);

    let calls = backend.call_count();
    let resumed = orchestrator.run(&key, &source, RunMode::Resume, |_| {}).await.unwrap();
    assert_eq!(resumed.batches_dispatched, 0);
    assert_eq!(backend.call_count(), calls);
    assert!(orchestrator.audit(&key, &source).await.unwrap().is_clean());
}
