//! Error types for the llm-eval core library.
//!
//! Uses `thiserror` for public API error types: provider failures, benchmark
//! data problems, configuration errors, and statistics input errors.

use std::path::PathBuf;

use llmeval_stats::StatsError;

/// Top-level error type for the evaluation library.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {message}")]
    Dataset { message: String },

    #[error("Comparison error: {message}")]
    Comparison { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid generation config: {message}")]
    InvalidConfig { message: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Connection { .. }
        )
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),
}

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EvalError::Provider(ProviderError::RateLimited {
            retry_after_secs: 30,
        });
        assert_eq!(
            err.to_string(),
            "Provider error: Rate limited by provider, retry after 30s"
        );
    }

    #[test]
    fn test_stats_error_converts() {
        let err: EvalError = StatsError::invalid_argument("Total must be positive, got 0").into();
        assert!(matches!(err, EvalError::Stats(StatsError::InvalidArgument(_))));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout { timeout_secs: 5 }.is_transient());
        assert!(
            ProviderError::Connection {
                message: "refused".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::ModelNotFound {
                model: "x".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Api {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
    }
}
