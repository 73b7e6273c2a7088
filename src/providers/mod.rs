/*!
 * Provider implementations for the remote language-model services.
 *
 * This module contains client implementations for:
 * - OpenAI: chat completions, also used for LM Studio's compatible server
 * - Anthropic: messages API
 * - Ollama: local generate API
 * - Mock: scripted provider for tests
 *
 * Providers know nothing about records. They receive a rendered prompt and
 * contribute only how a request is built and how text is read back.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::{ProviderError, truncate_diagnostic};

/// Rendered prompt handed to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    /// Instructions for the model
    pub system: String,
    /// User message, including the payload
    pub user: String,
    /// Raw JSON payload embedded in the user message
    pub payload: String,
}

/// Generation parameters shared by every provider
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: u32,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind a translation backend.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Build a request from a rendered prompt
    fn build_request(&self, prompt: &ChatPrompt, settings: &GenerationSettings) -> Self::Request;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Map a transport error from reqwest
pub(crate) fn map_send_error(service: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(format!("{}: {}", service, error))
    } else {
        ProviderError::RequestFailed(format!("{}: {}", service, error))
    }
}

/// Map a non-success HTTP response
pub(crate) async fn map_error_response(service: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    let message = truncate_diagnostic(&format!("{} error: {}", service, body));
    log::error!("{} API error ({}): {}", service, status, message);

    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        code => ProviderError::ApiError {
            status_code: code,
            message,
        },
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
