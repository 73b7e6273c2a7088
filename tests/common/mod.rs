/*!
 * Common test utilities for the tablewai test suite
 */

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use tablewai::errors::{BackendError, BackendErrorKind};
use tablewai::records::{CellValue, Record, RecordSet};
use tablewai::snapshot::SnapshotStore;
use tablewai::translation::{BatchOrchestrator, OrchestratorSettings, TranslationBackend, TranslationHub};

/// Phrase table used by the scripted backends, zh -> (en, fr)
const PHRASES: &[(&str, &str, &str)] = &[
    ("新鲜水果", "Fresh fruit", "Fruits frais"),
    ("红色苹果", "Red apple", "Pomme rouge"),
    ("进口香蕉", "Imported banana", "Banane importée"),
    ("苹果", "Apple", "Pomme"),
    ("香蕉", "Banana", "Banane"),
    ("当季", "In season", "Saisonnier"),
    ("订单", "Order", "Commande"),
    ("已发货", "shipped", "expédiée"),
    ("梨", "Pear", "Poire"),
    ("甜", "Sweet", "Sucré"),
];

/// Initialize logging for tests; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Translate by replacing known phrases, longest first; everything else is echoed
pub fn dictionary_translate(text: &str, target_language: &str) -> String {
    let mut out = text.to_string();
    for (zh, en, fr) in PHRASES {
        let replacement = match target_language {
            "fr" => fr,
            "en" => en,
            _ => continue,
        };
        out = out.replace(zh, replacement);
    }
    out
}

/// Backend whose behaviour is scripted per call, recording every request
pub struct ScriptedBackend {
    name: String,
    available: bool,
    fail_calls: BTreeSet<usize>,
    echo_calls: BTreeSet<usize>,
    fail_all: bool,
    translator: fn(&str, &str) -> String,
    requests: Mutex<Vec<Vec<Record>>>,
}

impl ScriptedBackend {
    /// Dictionary backend that always succeeds
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            fail_calls: BTreeSet::new(),
            echo_calls: BTreeSet::new(),
            fail_all: false,
            translator: dictionary_translate,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail the calls with these zero-based indices with a transport error
    pub fn failing_calls(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.fail_calls = calls.into_iter().collect();
        self
    }

    /// Answer the calls with these zero-based indices by echoing the input
    pub fn echoing_calls(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.echo_calls = calls.into_iter().collect();
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_translator(mut self, translator: fn(&str, &str) -> String) -> Self {
        self.translator = translator;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every batch received so far, in order
    pub fn requests(&self) -> Vec<Vec<Record>> {
        self.requests.lock().clone()
    }

    /// Column keys of every record received so far
    pub fn requested_columns(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .iter()
            .flatten()
            .map(|record| record.keys().map(str::to_string).collect())
            .collect()
    }
}

#[async_trait]
impl TranslationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn translate(&self, records: &[Record], target_language: &str) -> Result<RecordSet, BackendError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(records.to_vec());
            requests.len() - 1
        };

        if self.fail_all || self.fail_calls.contains(&call) {
            return Err(BackendError::new(
                self.name.clone(),
                BackendErrorKind::Transport {
                    status: Some(503),
                    detail: "service unavailable".to_string(),
                },
            ));
        }

        if self.echo_calls.contains(&call) {
            return Ok(RecordSet::new(records.to_vec()));
        }

        let translated = records
            .iter()
            .map(|record| {
                let mut output = Record::new();
                for (key, value) in record.fields() {
                    let value = match value {
                        CellValue::Text(text) => CellValue::Text((self.translator)(text, target_language)),
                        other => other.clone(),
                    };
                    output.set(key.clone(), value);
                }
                output
            })
            .collect();
        Ok(RecordSet::new(translated))
    }
}

/// Hub over the given backends, without retries or backoff
pub fn hub_over(backends: Vec<Arc<ScriptedBackend>>) -> Arc<TranslationHub> {
    let backends = backends
        .into_iter()
        .map(|b| b as Arc<dyn TranslationBackend>)
        .collect();
    Arc::new(TranslationHub::new(backends).with_retry(0, 0))
}

/// Orchestrator with zero inter-batch delay
pub fn orchestrator(hub: Arc<TranslationHub>, store: Arc<dyn SnapshotStore>, batch_size: usize) -> BatchOrchestrator {
    BatchOrchestrator::new(hub, store).with_settings(OrchestratorSettings {
        batch_size,
        retry_batch_size: 3,
        inter_batch_delay: Duration::ZERO,
        selective: false,
        backend_preference: None,
    })
}

/// Seven rows: three in Chinese, four already in English
pub fn mixed_catalog() -> RecordSet {
    RecordSet::new(vec![
        Record::from_pairs([("id", "P-001"), ("name", "苹果"), ("desc", "新鲜水果")]),
        Record::from_pairs([("id", "P-002"), ("name", "Orange"), ("desc", "Juicy citrus")]),
        Record::from_pairs([("id", "P-003"), ("name", "香蕉"), ("desc", "进口香蕉")]),
        Record::from_pairs([("id", "P-004"), ("name", "Lemon"), ("desc", "Sour")]),
        Record::from_pairs([("id", "P-005"), ("name", "Grape"), ("desc", "Seedless")]),
        Record::from_pairs([("id", "P-006"), ("name", "红色苹果"), ("desc", "当季")]),
        Record::from_pairs([("id", "P-007"), ("name", "Plum"), ("desc", "Ripe")]),
    ])
}

/// Rows that are foreign-script in `mixed_catalog`
pub const FOREIGN_ROWS: [usize; 3] = [0, 2, 5];

/// Ten rows of Chinese names
pub fn chinese_catalog(rows: usize) -> RecordSet {
    let names = ["苹果", "香蕉", "梨", "红色苹果", "进口香蕉"];
    RecordSet::new(
        (0..rows)
            .map(|idx| {
                Record::from_pairs([
                    ("sku", format!("SKU-{:04}", idx)),
                    ("name", names[idx % names.len()].to_string()),
                ])
            })
            .collect(),
    )
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// A small JSON catalog document wrapped in a `records` field
pub fn create_test_document(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"{
  "version": 2,
  "records": [
    {"id": "P-001", "name": "苹果", "desc": "新鲜水果", "price": 3.5},
    {"id": "P-002", "name": "香蕉", "desc": "进口香蕉", "price": 2},
    {"id": "P-003", "name": "梨", "desc": "甜", "price": 4}
  ]
}"#;
    create_test_file(dir, filename, content)
}
