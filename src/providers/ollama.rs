use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{ChatPrompt, GenerationSettings, Provider, map_error_response, map_send_error};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Format to return a response in
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            format: None,
            stream: None,
        }
    }

    /// Set the system message
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Set the completion token limit
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }

    /// Request a response format, e.g. "json"
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Disable streaming
    pub fn no_stream(mut self) -> Self {
        self.stream = Some(false);
        self
    }
}

impl GenerationResponse {
    /// Parse a body that is either one JSON object or JSONL stream chunks
    pub fn from_body(body: &str) -> Result<Self, ProviderError> {
        if let Ok(single) = serde_json::from_str::<GenerationResponse>(body) {
            return Ok(single);
        }

        // Streaming body: concatenate the `response` pieces of every chunk
        let chunks: Vec<GenerationResponse> = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if chunks.is_empty() {
            return Err(ProviderError::ParseError(
                "Failed to parse Ollama API response: body contains no JSON objects".to_string(),
            ));
        }
        warn!("Ollama returned a streamed body with {} chunks", chunks.len());

        let last = chunks.last();
        Ok(GenerationResponse {
            model: last.map(|c| c.model.clone()).unwrap_or_default(),
            response: chunks.iter().map(|c| c.response.as_str()).collect(),
            done: chunks.iter().any(|c| c.done),
            prompt_eval_count: last.and_then(|c| c.prompt_eval_count),
            eval_count: last.and_then(|c| c.eval_count),
        })
    }
}

impl Ollama {
    /// Create a new Ollama client from a complete URL
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                // Ollama speaks HTTP/1.1
                .http1_only()
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = GenerationRequest;
    type Response = GenerationResponse;

    fn build_request(&self, prompt: &ChatPrompt, settings: &GenerationSettings) -> GenerationRequest {
        GenerationRequest::new(&settings.model, &prompt.user)
            .system(&prompt.system)
            .temperature(settings.temperature)
            .num_predict(settings.max_tokens)
            .format("json")
            .no_stream()
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error("Ollama", e))?;

        if !response.status().is_success() {
            return Err(map_error_response("Ollama", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to read Ollama response: {}", e)))?;
        GenerationResponse::from_body(&body)
    }

    fn extract_text(response: &GenerationResponse) -> String {
        response.response.clone()
    }
}
