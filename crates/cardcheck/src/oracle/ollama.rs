//! Ollama local text-generation oracle.
//!
//! Ollama runs models locally without API keys. Install from: https://ollama.ai

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::OracleConfig;
use crate::error::{CardcheckError, Result};

use super::provider::TextOracle;

/// Oracle backed by Ollama's `/api/generate` endpoint.
pub struct OllamaOracle {
    client: Client,
    config: OracleConfig,
}

impl OllamaOracle {
    /// Create an oracle with default settings.
    ///
    /// Uses the `gemma:7b` model by default. Make sure you've pulled it:
    /// `ollama pull gemma:7b`
    pub fn new() -> Result<Self> {
        Self::with_config(OracleConfig::default())
    }

    /// Create with a specific model.
    pub fn with_model(model: impl Into<String>) -> Result<Self> {
        let config = OracleConfig {
            model: model.into(),
            ..OracleConfig::default()
        };
        Self::with_config(config)
    }

    /// Create with custom configuration.
    pub fn with_config(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CardcheckError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

impl TextOracle for OllamaOracle {
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature
            }
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .headers(self.build_headers())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    CardcheckError::Oracle(
                        "Failed to connect to Ollama. Is it running? Start with: ollama serve"
                            .to_string(),
                    )
                } else if e.is_timeout() {
                    CardcheckError::Oracle("Ollama request timed out".to_string())
                } else {
                    CardcheckError::Oracle(format!("Ollama request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            warn!(status = %status, "Ollama returned an error status");

            if error_text.contains("not found") {
                return Err(CardcheckError::Oracle(format!(
                    "Model '{}' not found. Pull it with: ollama pull {}",
                    self.config.model, self.config.model
                )));
            }

            return Err(CardcheckError::Oracle(format!(
                "Ollama error ({}): {}",
                status, error_text
            )));
        }

        let api_response: GenerateResponse = response
            .json()
            .map_err(|e| {
                CardcheckError::Oracle(format!("Failed to parse Ollama response: {}", e))
            })?;

        Ok(api_response.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama generate response structure (non-streaming).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
