/*!
 * Tests for backend selection, fallback and the batch cache
 */

use std::sync::Arc;

use tablewai::errors::{BackendErrorKind, TranslationError};
use tablewai::records::Record;
use tablewai::translation::hub::CACHE_ENGINE;
use tablewai::translation::{TranslationBackend, TranslationCache, TranslationHub};

use crate::common::{ScriptedBackend, hub_over, init_test_logging};

fn batch() -> Vec<Record> {
    vec![
        Record::from_pairs([("name", "苹果")]),
        Record::from_pairs([("name", "香蕉")]),
    ]
}

#[tokio::test]
async fn test_translateBatch_whenFirstBackendFails_shouldFallBackToNext() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai").always_failing());
    let second = Arc::new(ScriptedBackend::new("ollama"));
    let hub = hub_over(vec![first.clone(), second.clone()]);

    let result = hub.translate_batch(&batch(), "en", None).await.unwrap();

    assert_eq!(result.get(0).unwrap().text("name"), Some("Apple"));
    assert_eq!(result.get(1).unwrap().text("name"), Some("Banana"));
    assert_eq!(hub.last_engine().as_deref(), Some("ollama"));
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
}

#[tokio::test]
async fn test_translateBatch_withRetries_shouldRetrySameBackendBeforeFallingThrough() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai").failing_calls([0]));
    let second = Arc::new(ScriptedBackend::new("ollama"));
    let hub = TranslationHub::new(vec![
        first.clone() as Arc<dyn TranslationBackend>,
        second.clone() as Arc<dyn TranslationBackend>,
    ])
    .with_retry(1, 0);

    hub.translate_batch(&batch(), "en", None).await.unwrap();

    assert_eq!(first.call_count(), 2);
    assert_eq!(second.call_count(), 0);
    assert_eq!(hub.last_engine().as_deref(), Some("openai"));
}

#[tokio::test]
async fn test_translateBatch_withRepeatedBatch_shouldServeFromCache() {
    init_test_logging();
    let backend = Arc::new(ScriptedBackend::new("openai"));
    let hub = TranslationHub::new(vec![backend.clone() as Arc<dyn TranslationBackend>])
        .with_retry(0, 0)
        .with_cache(TranslationCache::new(8));

    let first = hub.translate_batch(&batch(), "en", None).await.unwrap();
    let second = hub.translate_batch(&batch(), "en", None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(hub.last_engine().as_deref(), Some(CACHE_ENGINE));

    let stats = hub.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));

    // Another target language is another cache entry
    hub.translate_batch(&batch(), "fr", None).await.unwrap();
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_translateBatch_withPreference_shouldUseOnlyThatBackend() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai"));
    let second = Arc::new(ScriptedBackend::new("ollama").always_failing());
    let hub = hub_over(vec![first.clone(), second.clone()]);

    let error = hub.translate_batch(&batch(), "en", Some("Ollama")).await.unwrap_err();

    match error {
        TranslationError::AllBackendsFailed { attempts } => {
            assert_eq!(attempts.0.len(), 1);
            assert_eq!(attempts.0[0].backend, "ollama");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(first.call_count(), 0);
}

#[tokio::test]
async fn test_translateBatch_withBadPreference_shouldFailBeforeAnyCall() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai"));
    let locked_out = Arc::new(ScriptedBackend::new("anthropic").unavailable());
    let hub = hub_over(vec![first.clone(), locked_out.clone()]);

    assert_eq!(
        hub.translate_batch(&batch(), "en", Some("deepl")).await.unwrap_err(),
        TranslationError::UnknownBackend("deepl".to_string())
    );
    assert_eq!(
        hub.check_selection(Some("anthropic")).unwrap_err(),
        TranslationError::BackendUnavailable("anthropic".to_string())
    );
    assert_eq!(first.call_count() + locked_out.call_count(), 0);
}

#[tokio::test]
async fn test_translateBatch_withNoAvailableBackend_shouldFailBeforeAnyCall() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai").unavailable());
    let second = Arc::new(ScriptedBackend::new("anthropic").unavailable());
    let hub = hub_over(vec![first.clone(), second.clone()]);

    assert!(!hub.has_available_backend());
    assert_eq!(
        hub.translate_batch(&batch(), "en", None).await.unwrap_err(),
        TranslationError::NoBackendAvailable
    );
    assert_eq!(first.call_count() + second.call_count(), 0);
}

#[tokio::test]
async fn test_translateBatch_whenEveryBackendFails_shouldListEveryAttempt() {
    init_test_logging();
    let first = Arc::new(ScriptedBackend::new("openai").always_failing());
    let second = Arc::new(ScriptedBackend::new("ollama").always_failing());
    let hub = TranslationHub::new(vec![
        first.clone() as Arc<dyn TranslationBackend>,
        second.clone() as Arc<dyn TranslationBackend>,
    ])
    .with_retry(1, 0);

    let error = hub.translate_batch(&batch(), "en", None).await.unwrap_err();

    let TranslationError::AllBackendsFailed { attempts } = error else {
        panic!("expected AllBackendsFailed");
    };
    let order: Vec<&str> = attempts.0.iter().map(|a| a.backend.as_str()).collect();
    assert_eq!(order, vec!["openai", "openai", "ollama", "ollama"]);
    assert!(
        attempts
            .0
            .iter()
            .all(|a| matches!(a.kind, BackendErrorKind::Transport { status: Some(503), .. }))
    );
    assert_eq!(hub.last_engine(), None);
}

#[tokio::test]
async fn test_translateBatch_withShortResponse_shouldRecordShapeFailure() {
    init_test_logging();

    struct DroppingBackend;

    #[async_trait::async_trait]
    impl TranslationBackend for DroppingBackend {
        fn name(&self) -> &str {
            "dropping"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn translate(
            &self,
            records: &[Record],
            _target_language: &str,
        ) -> Result<tablewai::RecordSet, tablewai::BackendError> {
            Ok(tablewai::RecordSet::new(records[..1].to_vec()))
        }
    }

    let fallback = Arc::new(ScriptedBackend::new("ollama"));
    let hub = TranslationHub::new(vec![
        Arc::new(DroppingBackend) as Arc<dyn TranslationBackend>,
        fallback.clone() as Arc<dyn TranslationBackend>,
    ])
    .with_retry(0, 0);

    let result = hub.translate_batch(&batch(), "en", None).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(fallback.call_count(), 1);
    assert_eq!(hub.last_engine().as_deref(), Some("ollama"));
}
