/*!
 * Tests for application configuration functionality
 */

use tablewai::app_config::{BackendConfig, BackendKind, Config, GlossaryEntry, LogLevel};

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "zh");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(!config.orchestrator.selective);
    assert!(config.glossary.is_empty());

    let order: Vec<_> = config.translation.backends.iter().map(|b| b.kind).collect();
    assert_eq!(order, vec![BackendKind::OpenAI, BackendKind::Anthropic, BackendKind::Ollama]);

    let anthropic = config.translation.backend_config(BackendKind::Anthropic).unwrap();
    assert_eq!(anthropic.timeout_secs, 60);
    assert_eq!(config.translation.common.retry_count, 2);
}

/// Test configuration validation
#[test]
fn test_configValidation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.source_language = "xyz".to_string();
    assert!(config.validate().is_err());
    config.source_language = "zh".to_string();

    config.target_language = "".to_string();
    assert!(config.validate().is_err());
    config.target_language = "fr".to_string();
    assert!(config.validate().is_ok());

    config.translation.common.batch_size = 0;
    assert!(config.validate().is_err());
    config.translation.common.batch_size = 5;

    config.translation.common.temperature = 1.5;
    assert!(config.validate().is_err());
    config.translation.common.temperature = 0.3;

    config.glossary.push(GlossaryEntry {
        from: "  ".to_string(),
        to: "x".to_string(),
    });
    assert!(config.validate().is_err());
}

#[test]
fn test_backendConfig_withEmptyFields_shouldResolveDefaults() {
    let lmstudio = BackendConfig::new(BackendKind::LMStudio);
    assert_eq!(lmstudio.resolved_endpoint(), "http://localhost:1234/v1");
    assert!(!lmstudio.kind.requires_api_key());

    let mut openai = BackendConfig::new(BackendKind::OpenAI);
    openai.model = "gpt-4o".to_string();
    openai.api_key = "sk-test".to_string();
    assert_eq!(openai.resolved_model(), "gpt-4o");
    assert_eq!(openai.resolved_api_key(), "sk-test");
    assert_eq!(BackendKind::OpenAI.api_key_env_var(), Some("OPENAI_API_KEY"));
}

#[test]
fn test_save_thenLoad_shouldPreserveOverrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tablewai.json");

    let mut config = Config::default();
    config.target_language = "fr".to_string();
    config.orchestrator.selective = true;
    config.glossary.push(GlossaryEntry {
        from: "cart".to_string(),
        to: "panier".to_string(),
    });
    config.save(&path).unwrap();

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(loaded.target_language, "fr");
    assert!(loaded.orchestrator.selective);
    assert_eq!(loaded.glossary, config.glossary);
}

#[test]
fn test_logLevel_parse_shouldMapToFilters() {
    assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
    assert!("loud".parse::<LogLevel>().is_err());
}
