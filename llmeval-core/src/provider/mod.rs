//! LLM provider abstraction.
//!
//! Every backend implements [`LlmProvider`]; the benchmark runner and the
//! evaluator only see the trait, so backends can be swapped or faked freely.
//!
//! - [`OllamaProvider`]: local Ollama server (`/api/generate`)
//! - [`OpenAiCompatibleProvider`]: OpenAI, DeepSeek, vLLM, LM Studio
//! - [`ReplayProvider`]: canned responses loaded from JSON
//! - [`CachedProvider`]: memoising decorator over any provider
//!
//! Use [`create_provider`] to build one from configuration, or
//! [`detect_provider`] to find one in the environment.

pub mod cached;
pub mod detect;
pub mod ollama;
pub mod openai_compat;
pub mod replay;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, RetryConfig};
use crate::error::ProviderError;

pub use cached::{CacheStats, CachedProvider};
pub use detect::{DetectedProvider, detect_provider};
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatibleProvider;
pub use replay::ReplayProvider;

/// Supported provider backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Ollama,
    OpenAi,
    Replay,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Replay => "replay",
        })
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "deepseek" | "vllm" | "lmstudio" => Ok(Self::OpenAi),
            "replay" => Ok(Self::Replay),
            other => Err(ProviderError::InvalidConfig {
                message: format!("Unknown provider '{other}'"),
            }),
        }
    }
}

/// Sampling parameters for a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub timeout_secs: u64,
    /// Attempts after the first failure for transient errors.
    pub retry_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ProviderError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidConfig {
                message: format!("Temperature must be between 0 and 2, got {}", self.temperature),
            });
        }
        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidConfig {
                message: "max_tokens must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ProviderError::InvalidConfig {
                message: format!("top_p must be between 0 and 1, got {}", self.top_p),
            });
        }
        Ok(())
    }
}

/// Output of a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub response_time_secs: f64,
    /// Tokens produced, or 0 when the backend does not report it.
    pub token_count: u32,
    pub model_name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Model metadata reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Capability interface implemented by every model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier (backend-specific).
    fn model(&self) -> &str;

    fn provider_type(&self) -> ProviderType;

    /// Default sampling parameters used when a call passes `None`.
    fn config(&self) -> &GenerationConfig;

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<GenerationResult, ProviderError>;

    /// Generate for several prompts, in order.
    async fn generate_batch(
        &self,
        prompts: &[String],
        config: Option<&GenerationConfig>,
    ) -> Result<Vec<GenerationResult>, ProviderError> {
        let mut results = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            results.push(self.generate(prompt, config).await?);
        }
        Ok(results)
    }

    /// Whether the backend is reachable and serves this model.
    async fn is_available(&self) -> bool;

    async fn model_info(&self) -> Result<ModelInfo, ProviderError>;

    /// Response cache counters, for providers wrapped in [`CachedProvider`].
    async fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

#[async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for Arc<P> {
    fn model(&self) -> &str {
        (**self).model()
    }

    fn provider_type(&self) -> ProviderType {
        (**self).provider_type()
    }

    fn config(&self) -> &GenerationConfig {
        (**self).config()
    }

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<GenerationResult, ProviderError> {
        (**self).generate(prompt, config).await
    }

    async fn generate_batch(
        &self,
        prompts: &[String],
        config: Option<&GenerationConfig>,
    ) -> Result<Vec<GenerationResult>, ProviderError> {
        (**self).generate_batch(prompts, config).await
    }

    async fn is_available(&self) -> bool {
        (**self).is_available().await
    }

    async fn model_info(&self) -> Result<ModelInfo, ProviderError> {
        (**self).model_info().await
    }

    async fn cache_stats(&self) -> Option<CacheStats> {
        (**self).cache_stats().await
    }
}

/// Build the provider described by `config`, wrapped in a cache when enabled.
pub fn create_provider(
    config: &ProviderConfig,
    generation: &GenerationConfig,
    retry: &RetryConfig,
) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    generation.validate()?;
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderType::Ollama => Arc::new(OllamaProvider::new(config, generation, retry)?),
        ProviderType::OpenAi => Arc::new(OpenAiCompatibleProvider::new(config, generation, retry)?),
        ProviderType::Replay => Arc::new(ReplayProvider::from_config(config, generation)?),
    };
    if config.cache {
        Ok(Arc::new(
            CachedProvider::new(provider).with_capacity(config.cache_capacity),
        ))
    } else {
        Ok(provider)
    }
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries `RateLimited` (respecting `retry_after_secs`), `Timeout` and
/// `Connection`. Permanent errors return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Classify a transport-level reqwest failure.
pub(crate) fn map_request_error(err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { timeout_secs }
    } else {
        ProviderError::Connection {
            message: format!("Request failed: {err}"),
        }
    }
}

/// Build an HTTP client honouring the per-request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Connection {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Backoff delay honouring a server-provided retry-after, capped at
/// `max_backoff_ms`.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &ProviderError) -> u64 {
    let computed = compute_exponential_backoff(config, attempt);
    if let ProviderError::RateLimited { retry_after_secs } = err {
        let requested = retry_after_secs
            .saturating_mul(1000)
            .min(config.max_backoff_ms);
        return requested.max(computed);
    }
    computed
}

fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Up to 25% jitter
        let jitter = (capped as f64 * 0.25 * rand::thread_rng().r#gen::<f64>()) as u64;
        capped + jitter
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_generation_config_validation() {
        assert!(GenerationConfig::default().validate().is_ok());

        let hot = GenerationConfig {
            temperature: 2.5,
            ..Default::default()
        };
        assert!(matches!(hot.validate(), Err(ProviderError::InvalidConfig { .. })));

        let empty = GenerationConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let top_p = GenerationConfig {
            top_p: 1.5,
            ..Default::default()
        };
        assert!(top_p.validate().is_err());
    }

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!("Ollama".parse::<ProviderType>().unwrap(), ProviderType::Ollama);
        assert_eq!("deepseek".parse::<ProviderType>().unwrap(), ProviderType::OpenAi);
        assert!("carrier-pigeon".parse::<ProviderType>().is_err());
        assert_eq!(ProviderType::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 0), 100);
        assert_eq!(compute_exponential_backoff(&config, 2), 400);
        assert_eq!(compute_exponential_backoff(&config, 6), 1_000);
    }

    #[test]
    fn test_rate_limit_backoff_respects_server() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let err = ProviderError::RateLimited {
            retry_after_secs: 2,
        };
        assert_eq!(compute_backoff(&config, 0, &err), 2_000);
    }

    #[test]
    fn test_huge_retry_after_is_capped() {
        let err = ProviderError::RateLimited {
            retry_after_secs: u64::MAX / 100,
        };
        assert_eq!(compute_backoff(&fast_retry(3), 0, &err), 2);

        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let err = ProviderError::RateLimited {
            retry_after_secs: 99_999_999_999_999_999,
        };
        assert_eq!(compute_backoff(&config, 0, &err), config.max_backoff_ms);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_retry(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ProviderError::Connection {
                    message: "refused".into(),
                })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_retry(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::ModelNotFound {
                model: "ghost".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(ProviderError::ModelNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_retry(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Timeout { timeout_secs: 1 })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
