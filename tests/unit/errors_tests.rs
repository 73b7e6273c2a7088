/*!
 * Tests for error types and conversions
 */

use tablewai::errors::{
    AppError, AttemptLog, BackendError, BackendErrorKind, ProviderError, RecordError, TranslationError,
};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
    assert_eq!(error.status_code(), Some(429));
    assert_eq!(ProviderError::ConnectionError("refused".to_string()).status_code(), None);
}

#[test]
fn test_backendError_transport_shouldTruncateLongDiagnostics() {
    let provider = ProviderError::RequestFailed("x".repeat(1_000));
    let error = BackendError::transport("anthropic", &provider);

    match &error.kind {
        BackendErrorKind::Transport { status, detail } => {
            assert_eq!(*status, None);
            assert!(detail.chars().count() <= 303);
        }
        other => panic!("unexpected kind: {:?}", other),
    }
    assert!(error.to_string().starts_with("backend 'anthropic' failed"));
}

#[test]
fn test_allBackendsFailed_shouldListEveryAttempt() {
    let error = TranslationError::AllBackendsFailed {
        attempts: AttemptLog(vec![
            BackendError::new("openai", BackendErrorKind::EmptyResponse),
            BackendError::shape("ollama", "expected 2 records, got 1"),
        ]),
    };
    let display = error.to_string();

    assert!(display.contains("after 2 attempts"));
    assert!(display.contains("openai"));
    assert!(display.contains("expected 2 records, got 1"));
}

#[test]
fn test_appError_from_shouldWrapSourceErrors() {
    let from_record: AppError = RecordError::InvalidDocument.into();
    assert!(matches!(from_record, AppError::Record(_)));

    let from_translation: AppError = TranslationError::NoBackendAvailable.into();
    assert!(from_translation.to_string().contains("no translation backend"));

    let from_io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(from_io, AppError::File(_)));

    let from_anyhow: AppError = anyhow::anyhow!("boom").into();
    assert!(matches!(from_anyhow, AppError::Unknown(_)));
}
