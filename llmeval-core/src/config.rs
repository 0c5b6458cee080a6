//! Configuration system for llm-eval.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/llm-eval/config.toml` and/or `.llm-eval/config.toml`
//! in the workspace directory.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use llmeval_stats::{BootstrapConfig, DEFAULT_ALPHA, DEFAULT_CONFIDENCE, DEFAULT_POWER};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::provider::{GenerationConfig, ProviderType};

/// Environment variable prefix, e.g. `LLM_EVAL_PROVIDER__MODEL`.
pub const ENV_PREFIX: &str = "LLM_EVAL_";

/// Name of the per-workspace config directory.
pub const WORKSPACE_DIR: &str = ".llm-eval";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub benchmarks: BenchmarkConfig,
}

impl EvalConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation
            .validate()
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })?;
        self.statistics.validate()?;
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "provider.model must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Which backend to evaluate and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderType,
    /// Model identifier (e.g., "llama3.2:1b", "gpt-4o-mini").
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Memoise identical generation requests.
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Maximum cached responses; unbounded when absent.
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    /// Prompt-to-response JSON map for the replay provider.
    #[serde(default)]
    pub responses_path: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderType::default(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            cache: true,
            cache_capacity: None,
            responses_path: None,
        }
    }
}

fn default_model() -> String {
    "llama3.2:1b".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

/// Exponential backoff settings for transient provider errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self.clone()
        }
    }
}

/// Statistical reporting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Confidence level for intervals.
    pub confidence: f64,
    /// Significance level for tests.
    pub alpha: f64,
    /// Target power for sample-size planning.
    pub power: f64,
    pub bootstrap_resamples: usize,
    pub seed: u64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        let bootstrap = BootstrapConfig::default();
        Self {
            confidence: DEFAULT_CONFIDENCE,
            alpha: DEFAULT_ALPHA,
            power: DEFAULT_POWER,
            bootstrap_resamples: bootstrap.resamples,
            seed: bootstrap.seed,
        }
    }
}

impl StatisticsConfig {
    pub fn bootstrap(&self) -> BootstrapConfig {
        BootstrapConfig {
            resamples: self.bootstrap_resamples,
            confidence: self.confidence,
            seed: self.seed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("confidence", self.confidence),
            ("alpha", self.alpha),
            ("power", self.power),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::Invalid {
                    message: format!("statistics.{name} must be in (0, 1), got {value}"),
                });
            }
        }
        if self.bootstrap_resamples == 0 {
            return Err(ConfigError::Invalid {
                message: "statistics.bootstrap_resamples must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Benchmark selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Evaluate only the first N items of each benchmark.
    pub sample_size: Option<usize>,
    /// JSON dataset replacing the built-in items.
    pub dataset_path: Option<PathBuf>,
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "llm-eval", "llm-eval")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit config file (passed as argument, must exist)
/// 2. Environment variables (prefixed with `LLM_EVAL_`)
/// 3. Workspace-local config (`.llm-eval/config.toml`)
/// 4. User config (`~/.config/llm-eval/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<EvalConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_DIR).join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (LLM_EVAL_PROVIDER__MODEL, LLM_EVAL_STATISTICS__ALPHA, etc.)
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    let config: EvalConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(WORKSPACE_DIR).join("config.toml").exists())
}

/// Write the default configuration to `<workspace>/.llm-eval/config.toml`.
///
/// Refuses to overwrite an existing file. Returns the path written.
pub fn write_default_config(workspace: &Path) -> Result<PathBuf, ConfigError> {
    let dir = workspace.join(WORKSPACE_DIR);
    let path = dir.join("config.toml");
    if path.exists() {
        return Err(ConfigError::Invalid {
            message: format!("{} already exists", path.display()),
        });
    }
    let content = toml::to_string_pretty(&EvalConfig::default()).map_err(|e| {
        ConfigError::Invalid {
            message: format!("Failed to serialize default config: {e}"),
        }
    })?;
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::Invalid {
        message: format!("Failed to create {}: {e}", dir.display()),
    })?;
    std::fs::write(&path, content).map_err(|e| ConfigError::Invalid {
        message: format!("Failed to write {}: {e}", path.display()),
    })?;
    Ok(path)
}
