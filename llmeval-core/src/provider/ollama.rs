//! Ollama backend over the local HTTP API.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    GenerationConfig, GenerationResult, LlmProvider, ModelInfo, ProviderType, http_client,
    map_request_error, with_retry,
};
use crate::config::{ProviderConfig, RetryConfig};
use crate::error::ProviderError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    generation: GenerationConfig,
    retry: RetryConfig,
}

impl OllamaProvider {
    pub fn new(
        config: &ProviderConfig,
        generation: &GenerationConfig,
        retry: &RetryConfig,
    ) -> Result<Self, ProviderError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: http_client(generation.timeout_secs)?,
            base_url,
            model: config.model.clone(),
            generation: generation.clone(),
            retry: retry.clone(),
        })
    }

    fn request_body(&self, prompt: &str, config: &GenerationConfig) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
                "top_p": config.top_p,
                "top_k": config.top_k,
            }
        })
    }

    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            404 => ProviderError::ModelNotFound {
                model: self.model.clone(),
            },
            code => ProviderError::Api {
                status: code,
                message: body.to_string(),
            },
        }
    }

    /// Extract the generated text and metadata from an `/api/generate` body.
    fn parse_response(
        body: &Value,
        model: &str,
        response_time_secs: f64,
    ) -> Result<GenerationResult, ProviderError> {
        let text = body
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "No 'response' field in Ollama reply".to_string(),
            })?
            .to_string();
        let token_count = body
            .get("eval_count")
            .and_then(Value::as_u64)
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX));

        let mut metadata = BTreeMap::new();
        for key in ["total_duration", "load_duration", "prompt_eval_count", "eval_duration"] {
            if let Some(value) = body.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }

        Ok(GenerationResult {
            text,
            response_time_secs,
            token_count,
            model_name: model.to_string(),
            metadata,
        })
    }

    async fn generate_once(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, model = %self.model, "Sending Ollama generate request");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .json(&self.request_body(prompt, config))
            .send()
            .await
            .map_err(|e| map_request_error(e, config.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(e, config.timeout_secs))?;
        if !status.is_success() {
            return Err(self.map_http_error(status, &body));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;
        Self::parse_response(&json, &self.model, start.elapsed().as_secs_f64())
    }

    /// Model names installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.generation.timeout_secs))?;
        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
                message: "Failed to list models".to_string(),
            });
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;
        Ok(parse_model_names(&json))
    }
}

fn parse_model_names(tags: &Value) -> Vec<String> {
    tags.get("models")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `llama3.2` matches an installed `llama3.2:latest`.
fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model || (!model.contains(':') && name.strip_suffix(":latest") == Some(model))
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
    }

    fn config(&self) -> &GenerationConfig {
        &self.generation
    }

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<GenerationResult, ProviderError> {
        let config = config.unwrap_or(&self.generation);
        config.validate()?;
        let retry = self.retry.with_max_retries(config.retry_attempts);
        with_retry(&retry, || self.generate_once(prompt, config)).await
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => model_installed(&models, &self.model),
            Err(e) => {
                debug!(error = %e, "Ollama server not reachable");
                false
            }
        }
    }

    async fn model_info(&self) -> Result<ModelInfo, ProviderError> {
        let url = format!("{}/api/show", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| map_request_error(e, self.generation.timeout_secs))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(e, self.generation.timeout_secs))?;
        if !status.is_success() {
            return Err(self.map_http_error(status, &body));
        }
        let json: Value = serde_json::from_str(&body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;

        let mut details = BTreeMap::new();
        if let Some(map) = json.get("details").and_then(Value::as_object) {
            for (key, value) in map {
                if let Some(s) = value.as_str() {
                    details.insert(key.clone(), s.to_string());
                }
            }
        }
        Ok(ModelInfo {
            name: self.model.clone(),
            provider: ProviderType::Ollama.to_string(),
            details,
        })
    }
}
