/*!
 * Tests for the provider-backed translation backend
 */

use tablewai::app_config::{BackendConfig, BackendKind, Config, GlossaryEntry};
use tablewai::errors::BackendErrorKind;
use tablewai::providers::GenerationSettings;
use tablewai::providers::mock::{MockProvider, MockRequest};
use tablewai::records::Record;
use tablewai::translation::response::repair_and_parse;
use tablewai::translation::{ProviderBackend, TranslationBackend, TranslationPromptBuilder, build_backends};

fn batch() -> Vec<Record> {
    vec![
        Record::from_pairs([("name", "购物车"), ("hint", "共 __FMT_0__ 件")]),
        Record::from_pairs([("name", "结账"), ("hint", "")]),
    ]
}

fn translate_cart(request: &MockRequest) -> String {
    // Answer with prose around a wrapped array and a trailing comma
    let body = request
        .payload
        .replace("购物车", "Basket")
        .replace("共 __FMT_0__ 件", "__FMT_0__ items")
        .replace("结账", "Checkout");
    format!("Here are the translations:\n{},\nLet me know!", body)
}

fn echo_system_prompt(request: &MockRequest) -> String {
    let glossary_seen = request.system.contains("\"shopping cart\" must be rendered as \"basket\"");
    let name = if glossary_seen { "glossary" } else { "none" };
    format!(r#"[{{"name": "{}", "hint": "x"}}, {{"name": "n", "hint": ""}}]"#, name)
}

fn backend(provider: MockProvider) -> ProviderBackend<MockProvider> {
    ProviderBackend::new("mock", provider, GenerationSettings::new("mock-model", 0.1, 512))
}

#[tokio::test]
async fn test_translate_withProseWrappedResponse_shouldRepairAndKeepPlaceholders() {
    let result = backend(MockProvider::working().with_custom_response(translate_cart))
        .translate(&batch(), "en")
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.get(0).unwrap().text("name"), Some("Basket"));
    assert_eq!(result.get(0).unwrap().text("hint"), Some("__FMT_0__ items"));
    assert_eq!(result.get(1).unwrap().text("hint"), Some(""));
}

#[tokio::test]
async fn test_translate_withGlossaryPrompt_shouldSendGlossaryToProvider() {
    let prompts = TranslationPromptBuilder::new().with_glossary(vec![GlossaryEntry {
        from: "shopping cart".to_string(),
        to: "basket".to_string(),
    }]);
    let result = backend(MockProvider::working().with_custom_response(echo_system_prompt))
        .with_prompts(prompts)
        .translate(&batch(), "en")
        .await
        .unwrap();

    assert_eq!(result.get(0).unwrap().text("name"), Some("glossary"));
}

#[tokio::test]
async fn test_translate_withBadResponses_shouldRaiseTypedErrors() {
    let malformed = backend(MockProvider::malformed()).translate(&batch(), "en").await.unwrap_err();
    assert!(matches!(malformed.kind, BackendErrorKind::Parse(_)));

    let empty = backend(MockProvider::empty()).translate(&batch(), "en").await.unwrap_err();
    assert_eq!(empty.kind, BackendErrorKind::EmptyResponse);

    let failing = backend(MockProvider::failing()).translate(&batch(), "en").await.unwrap_err();
    assert!(matches!(failing.kind, BackendErrorKind::Transport { status: Some(500), .. }));
    assert_eq!(failing.backend, "mock");
}

#[tokio::test]
async fn test_translate_whenUnavailable_shouldNotCallProvider() {
    let provider = MockProvider::working();
    let backend = backend(provider.clone()).with_availability(false);

    let error = backend.translate(&batch(), "en").await.unwrap_err();

    assert_eq!(error.kind, BackendErrorKind::CredentialMissing);
    assert_eq!(provider.request_count(), 0);
}

#[test]
fn test_buildBackends_shouldFollowConfiguredOrderAndSkipDisabled() {
    let mut config = Config::default();
    let mut disabled = BackendConfig::new(BackendKind::Anthropic);
    disabled.enabled = false;
    config.translation.backends = vec![
        BackendConfig::new(BackendKind::Ollama),
        disabled,
        BackendConfig::new(BackendKind::LMStudio),
    ];

    let backends = build_backends(&config);
    let names: Vec<&str> = backends.iter().map(|b| b.name()).collect();

    assert_eq!(names, vec!["ollama", "lmstudio"]);
    assert!(backends.iter().all(|b| b.is_available()));
}

#[test]
fn test_repairAndParse_withFullWidthStructure_shouldParse() {
    let value = repair_and_parse("```\n｛\"rows\"：［{\"a\"：\"b\"，}］｝\n```").unwrap();
    assert_eq!(value["rows"][0]["a"], "b");
}
