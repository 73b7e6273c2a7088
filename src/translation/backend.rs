/*!
 * Uniform translation interface over the remote services.
 *
 * `TranslationBackend` is what the hub talks to. `ProviderBackend` adapts any
 * `Provider` to it by rendering the shared prompt, asking the provider to
 * build its own request, and parsing the text that comes back.
 */

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::app_config::{BackendConfig, BackendKind, Config};
use crate::errors::{BackendError, BackendErrorKind};
use crate::providers::anthropic::Anthropic;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;
use crate::providers::{GenerationSettings, Provider};
use crate::records::{Record, RecordSet};
use crate::translation::prompts::TranslationPromptBuilder;
use crate::translation::response::parse_records;

/// A remote service able to translate a batch of records
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Stable name used in logs, errors and backend preferences
    fn name(&self) -> &str;

    /// Whether the backend is enabled and has the credentials it needs
    fn is_available(&self) -> bool;

    /// Translate every text cell of `records`; the result has the same length and keys
    async fn translate(&self, records: &[Record], target_language: &str) -> Result<RecordSet, BackendError>;
}

/// Adapter from a `Provider` to a `TranslationBackend`
#[derive(Debug)]
pub struct ProviderBackend<P: Provider> {
    name: String,
    provider: P,
    settings: GenerationSettings,
    prompts: TranslationPromptBuilder,
    available: bool,
}

impl<P: Provider> ProviderBackend<P> {
    pub fn new(name: impl Into<String>, provider: P, settings: GenerationSettings) -> Self {
        Self {
            name: name.into(),
            provider,
            settings,
            prompts: TranslationPromptBuilder::new(),
            available: true,
        }
    }

    /// Use a configured prompt builder
    pub fn with_prompts(mut self, prompts: TranslationPromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Mark the backend usable or not
    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider> TranslationBackend for ProviderBackend<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn translate(&self, records: &[Record], target_language: &str) -> Result<RecordSet, BackendError> {
        if !self.available {
            return Err(BackendError::new(&self.name, BackendErrorKind::CredentialMissing));
        }
        if records.is_empty() {
            return Ok(RecordSet::default());
        }

        let prompt = self.prompts.build(records, target_language);
        let request = self.provider.build_request(&prompt, &self.settings);
        debug!(
            "{}: sending {} record(s) to {} for {}",
            self.name,
            records.len(),
            self.settings.model,
            target_language
        );

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| BackendError::transport(&self.name, &e))?;
        let text = P::extract_text(&response);

        parse_records(&self.name, &text, records).map(RecordSet::new)
    }
}

/// Build the configured backends in priority order, skipping disabled ones
pub fn build_backends(config: &Config) -> Vec<Arc<dyn TranslationBackend>> {
    let mut prompts = TranslationPromptBuilder::new().with_glossary(config.glossary.clone());
    if !config.source_language.trim().is_empty() {
        prompts = prompts.with_source_language(&config.source_language);
    }

    config
        .translation
        .enabled_backends()
        .map(|backend| build_backend(backend, config, prompts.clone()))
        .collect()
}

fn build_backend(
    backend: &BackendConfig,
    config: &Config,
    prompts: TranslationPromptBuilder,
) -> Arc<dyn TranslationBackend> {
    let common = &config.translation.common;
    let settings = GenerationSettings::new(backend.resolved_model(), common.temperature, common.max_tokens);
    let api_key = backend.resolved_api_key();
    let available = !backend.kind.requires_api_key() || !api_key.is_empty();
    if !available {
        warn!(
            "{} backend has no API key; set it in the config or {}",
            backend.kind.display_name(),
            backend.kind.api_key_env_var().unwrap_or("the environment")
        );
    }

    let name = backend.kind.as_str();
    let endpoint = backend.resolved_endpoint();

    match backend.kind {
        BackendKind::OpenAI | BackendKind::LMStudio => Arc::new(
            ProviderBackend::new(name, OpenAI::new(api_key, endpoint, backend.timeout_secs), settings)
                .with_prompts(prompts)
                .with_availability(available),
        ),
        BackendKind::Anthropic => Arc::new(
            ProviderBackend::new(name, Anthropic::new(api_key, endpoint, backend.timeout_secs), settings)
                .with_prompts(prompts)
                .with_availability(available),
        ),
        BackendKind::Ollama => Arc::new(
            ProviderBackend::new(name, Ollama::new(endpoint, backend.timeout_secs), settings)
                .with_prompts(prompts)
                .with_availability(available),
        ),
    }
}
