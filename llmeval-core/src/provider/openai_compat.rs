//! OpenAI-compatible chat completions backend.
//!
//! Works with OpenAI, DeepSeek, vLLM, LM Studio and any server exposing
//! `/chat/completions`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

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

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    generation: GenerationConfig,
    retry: RetryConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable named by `config.api_key_env`.
    /// Local servers (localhost / 127.0.0.1) do not need a key.
    pub fn new(
        config: &ProviderConfig,
        generation: &GenerationConfig,
        retry: &RetryConfig,
    ) -> Result<Self, ProviderError> {
        let is_local = config
            .base_url
            .as_ref()
            .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"));

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local server; using placeholder bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| ProviderError::AuthFailed {
                provider: format!(
                    "OpenAI-compatible: env var '{}' not set",
                    config.api_key_env
                ),
            })?;
        Self::new_with_key(config, generation, retry, api_key)
    }

    pub fn new_with_key(
        config: &ProviderConfig,
        generation: &GenerationConfig,
        retry: &RetryConfig,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: http_client(generation.timeout_secs)?,
            base_url,
            api_key,
            model: config.model.clone(),
            generation: generation.clone(),
            retry: retry.clone(),
        })
    }

    fn request_body(&self, prompt: &str, config: &GenerationConfig) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "top_p": config.top_p,
            "stream": false,
        })
    }

    /// Parse an OpenAI-format response body.
    fn parse_response(
        body: &Value,
        model: &str,
        response_time_secs: f64,
    ) -> Result<GenerationResult, ProviderError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;
        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "No message content in choice".to_string(),
            })?
            .to_string();

        let token_count = body
            .get("usage")
            .and_then(|u| u.get("completion_tokens"))
            .and_then(Value::as_u64)
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX));

        let mut metadata = BTreeMap::new();
        if let Some(reason) = choice.get("finish_reason") {
            metadata.insert("finish_reason".to_string(), reason.clone());
        }
        if let Some(usage) = body.get("usage") {
            metadata.insert("usage".to_string(), usage.clone());
        }

        Ok(GenerationResult {
            text,
            response_time_secs,
            token_count,
            model_name: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(model)
                .to_string(),
            metadata,
        })
    }

    /// Map an HTTP status code to the appropriate ProviderError.
    fn map_http_error(status: reqwest::StatusCode, body: &str, model: &str) -> ProviderError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "Authentication failed");
                ProviderError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            404 => ProviderError::ModelNotFound {
                model: model.to_string(),
            },
            429 => {
                // "Rate limit reached ... try again in 20s"
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim_end_matches(['s', '.']).parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                ProviderError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            code if code >= 500 => ProviderError::Connection {
                message: format!("Server error ({code}): {body}"),
            },
            code => ProviderError::Api {
                status: code,
                message: body.to_string(),
            },
        }
    }

    async fn generate_once(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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
            return Err(Self::map_http_error(status, &body, &self.model));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;
        Self::parse_response(&json, &self.model, start.elapsed().as_secs_f64())
    }

    async fn fetch_model(&self) -> Result<Value, ProviderError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| map_request_error(e, self.generation.timeout_secs))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(e, self.generation.timeout_secs))?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &body, &self.model));
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAi
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
        match self.fetch_model().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, model = %self.model, "Model not available");
                false
            }
        }
    }

    async fn model_info(&self) -> Result<ModelInfo, ProviderError> {
        let json = self.fetch_model().await?;
        let mut details = BTreeMap::new();
        details.insert("base_url".to_string(), self.base_url.clone());
        if let Some(owner) = json.get("owned_by").and_then(Value::as_str) {
            details.insert("owned_by".to_string(), owner.to_string());
        }
        Ok(ModelInfo {
            name: self.model.clone(),
            provider: ProviderType::OpenAi.to_string(),
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            kind: ProviderType::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "LLM_EVAL_TEST_OPENAI_KEY".to_string(),
            ..Default::default()
        }
    }

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new_with_key(
            &test_config(),
            &GenerationConfig::default(),
            &RetryConfig::default(),
            "sk-test".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "message": {"role": "assistant", "content": "Tokyo"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2}
        });
        let result = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o-mini", 0.3).unwrap();
        assert_eq!(result.text, "Tokyo");
        assert_eq!(result.token_count, 2);
        assert_eq!(result.model_name, "gpt-4o-mini-2024-07-18");
        assert_eq!(result.metadata["finish_reason"], "stop");
    }

    #[test]
    fn test_oversized_completion_tokens_saturate() {
        let body = json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"completion_tokens": 1u64 << 40}
        });
        let result = OpenAiCompatibleProvider::parse_response(&body, "m", 0.1).unwrap();
        assert_eq!(result.token_count, u32::MAX);
    }

    #[test]
    fn test_parse_response_no_choices() {
        let result = OpenAiCompatibleProvider::parse_response(&json!({"choices": []}), "m", 0.0);
        assert!(matches!(result, Err(ProviderError::ResponseParse { .. })));
    }

    #[test]
    fn test_request_body() {
        let body = provider().request_body("What is 7?", &GenerationConfig::default());
        assert_eq!(body["messages"][0]["content"], "What is 7?");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_http_error_mapping_401() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "unauthorized",
            "m",
        );
        assert!(matches!(err, ProviderError::AuthFailed { .. }));
    }

    #[test]
    fn test_http_error_mapping_429() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "Rate limit reached, try again in 20s"}}"#,
            "m",
        );
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: 20
            }
        ));
    }

    #[test]
    fn test_http_error_mapping_500_is_transient() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom",
            "m",
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_new_missing_key() {
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("LLM_EVAL_TEST_OPENAI_KEY") };
        let result = OpenAiCompatibleProvider::new(
            &test_config(),
            &GenerationConfig::default(),
            &RetryConfig::default(),
        );
        assert!(matches!(result, Err(ProviderError::AuthFailed { .. })));
    }

    #[test]
    fn test_local_server_needs_no_key() {
        let mut config = test_config();
        config.api_key_env = "LLM_EVAL_TEST_KEY_NEVER_SET".to_string();
        config.base_url = Some("http://localhost:8000/v1/".to_string());
        let provider = OpenAiCompatibleProvider::new(
            &config,
            &GenerationConfig::default(),
            &RetryConfig::default(),
        )
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }
}
