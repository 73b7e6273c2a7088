/*!
 * Integration tests for application lifecycle
 */

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tablewai::app_config::Config;
use tablewai::app_controller::{Controller, TranslateOptions};
use tablewai::database::RunStatus;
use tablewai::snapshot::MemorySnapshotStore;

use crate::common::{ScriptedBackend, create_temp_dir, create_test_document, hub_over, init_test_logging};

fn test_config() -> Config {
    let mut config = Config::default();
    config.target_language = "en".to_string();
    config.translation.common.batch_size = 2;
    config.translation.common.inter_batch_delay_ms = 0;
    config
}

fn controller(backend: Arc<ScriptedBackend>) -> Result<Controller> {
    Controller::with_components(test_config(), hub_over(vec![backend]), Arc::new(MemorySnapshotStore::new()))
}

fn read_json(path: &Path) -> Result<Value> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Test the controller initialization with a snapshot database on disk
#[test]
fn test_controller_withConfig_shouldOpenSnapshotDatabase() -> Result<()> {
    let dir = create_temp_dir()?;
    let mut config = test_config();
    config.snapshot_db_path = Some(dir.path().join("snapshots.db"));

    let controller = Controller::with_config(config)?;

    assert_eq!(controller.config().target_language, "en");
    assert!(dir.path().join("snapshots.db").exists());
    Ok(())
}

/// Test that an invalid configuration is rejected up front
#[test]
fn test_controller_withInvalidConfig_shouldFail() {
    let mut config = test_config();
    config.target_language = "zz-not-a-language".to_string();

    let result = Controller::with_components(
        config,
        hub_over(vec![Arc::new(ScriptedBackend::new("primary"))]),
        Arc::new(MemorySnapshotStore::new()),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_translate_withJsonDocument_shouldWriteTranslatedSibling() -> Result<()> {
    init_test_logging();
    let dir = create_temp_dir()?;
    let input = create_test_document(dir.path(), "catalog.json")?;
    let controller = controller(Arc::new(ScriptedBackend::new("primary")))?;

    let summary = controller.translate(&input, &TranslateOptions::default()).await?;

    let output = dir.path().join("catalog.en.json");
    assert_eq!(summary.output_path.as_deref(), Some(output.as_path()));
    assert_eq!(summary.outcome.status, RunStatus::Completed);
    assert_eq!(summary.outcome.completed_rows, 3);

    let written = read_json(&output)?;
    assert_eq!(written["version"], 2);
    let records = written["records"].as_array().unwrap();
    assert_eq!(records[0]["id"], "P-001");
    assert_eq!(records[0]["name"], "Apple");
    assert_eq!(records[0]["desc"], "Fresh fruit");
    assert_eq!(records[0]["price"], 3.5);
    assert_eq!(records[1]["desc"], "Imported banana");
    assert_eq!(records[2]["name"], "Pear");
    assert_eq!(records[2]["desc"], "Sweet");

    // The input is left untouched
    let original = read_json(&input)?;
    assert_eq!(original["records"][0]["name"], "苹果");
    Ok(())
}

#[tokio::test]
async fn test_translate_withColumnSubset_shouldLeaveOtherColumnsAlone() -> Result<()> {
    init_test_logging();
    let dir = create_temp_dir()?;
    let input = create_test_document(dir.path(), "catalog.json")?;
    let output = dir.path().join("out").join("names.json");
    let backend = Arc::new(ScriptedBackend::new("primary"));
    let controller = controller(backend.clone())?;

    let options = TranslateOptions {
        columns: vec!["name".to_string()],
        output: Some(output.clone()),
        ..TranslateOptions::default()
    };
    controller.translate(&input, &options).await?;

    assert!(
        backend
            .requested_columns()
            .iter()
            .all(|columns| columns == &vec!["name".to_string()])
    );
    let written = read_json(&output)?;
    assert_eq!(written["records"][1]["name"], "Banana");
    assert_eq!(written["records"][1]["desc"], "进口香蕉");
    Ok(())
}

#[tokio::test]
async fn test_translate_pausedThenResumed_shouldOnlyWriteOutputWhenDone() -> Result<()> {
    init_test_logging();
    let dir = create_temp_dir()?;
    let input = create_test_document(dir.path(), "catalog.json")?;
    let backend = Arc::new(ScriptedBackend::new("primary"));
    let controller = controller(backend.clone())?;
    let output = dir.path().join("catalog.en.json");

    let pause = controller.pause_handle();
    pause.pause();
    let paused = controller.translate(&input, &TranslateOptions::default()).await?;

    assert_eq!(paused.outcome.status, RunStatus::Paused);
    assert_eq!(paused.outcome.completed_rows, 2);
    assert!(paused.output_path.is_none());
    assert!(!output.exists());

    pause.resume();
    let options = TranslateOptions {
        resume: true,
        ..TranslateOptions::default()
    };
    let resumed = controller.translate(&input, &options).await?;

    assert_eq!(resumed.outcome.status, RunStatus::Completed);
    assert_eq!(resumed.outcome.completed_rows, 3);
    assert_eq!(backend.call_count(), 2);
    assert_eq!(read_json(&output)?["records"][2]["name"], "Pear");
    Ok(())
}

#[tokio::test]
async fn test_retry_afterFailedBatch_shouldRewriteOutput() -> Result<()> {
    init_test_logging();
    let dir = create_temp_dir()?;
    let input = create_test_document(dir.path(), "catalog.json")?;
    let controller = controller(Arc::new(ScriptedBackend::new("flaky").failing_calls([0])))?;
    let output = dir.path().join("catalog.en.json");

    let first = controller.translate(&input, &TranslateOptions::default()).await?;
    assert_eq!(first.outcome.missing_rows, BTreeSet::from([0, 1]));
    assert!(first.outcome.retry_available);
    assert_eq!(read_json(&output)?["records"][0]["name"], "苹果");

    let retried = controller
        .retry(&input, &first.outcome.missing_rows, &TranslateOptions::default())
        .await?;

    assert!(retried.outcome.missing_rows.is_empty());
    let written = read_json(&output)?;
    assert_eq!(written["records"][0]["name"], "Apple");
    assert_eq!(written["records"][1]["desc"], "Imported banana");
    Ok(())
}

#[tokio::test]
async fn test_auditAbandonClear_shouldOperateOnStoredSnapshot() -> Result<()> {
    init_test_logging();
    let dir = create_temp_dir()?;
    let input = create_test_document(dir.path(), "catalog.json")?;
    let controller = controller(Arc::new(ScriptedBackend::new("flaky").failing_calls([1])))?;

    controller.translate(&input, &TranslateOptions::default()).await?;

    let audit = controller.audit(&input, &[]).await?;
    assert_eq!(audit.discrepant_rows(), BTreeSet::from([2]));

    let abandoned = controller.abandon(&input, &BTreeSet::from([2]), &[]).await?;
    assert_eq!(abandoned.exhausted_rows, BTreeSet::from([2]));
    assert!(controller.audit(&input, &[]).await?.is_clean());

    assert!(controller.clear(&input, &[]).await?);
    assert!(!controller.clear(&input, &[]).await?);
    assert!(controller.audit(&input, &[]).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_translate_withMissingInput_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let controller = controller(Arc::new(ScriptedBackend::new("primary"))).unwrap();

    let error = controller
        .translate(&dir.path().join("absent.json"), &TranslateOptions::default())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("does not exist"));
}
