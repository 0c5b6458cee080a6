//! Zero-config provider discovery from API keys and a local Ollama server.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use super::ProviderType;
use super::ollama::DEFAULT_OLLAMA_URL;
use crate::config::ProviderConfig;

pub const DEEPSEEK_URL: &str = "https://api.deepseek.com/v1";

const OLLAMA_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// A backend found in the environment, with the model to use by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedProvider {
    /// Short label such as "openai" or "deepseek".
    pub name: &'static str,
    pub kind: ProviderType,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

impl DetectedProvider {
    /// Point `config` at this backend; `model` wins over the detected default.
    pub fn apply(&self, config: &mut ProviderConfig, model: Option<&str>) {
        config.kind = self.kind;
        config.model = model.unwrap_or(&self.model).to_string();
        config.base_url = self.base_url.clone();
        if let Some(env) = &self.api_key_env {
            config.api_key_env = env.clone();
        }
    }
}

/// Hosted backends whose API key is set, checked in priority order.
pub fn detect_from_env<F>(lookup: F) -> Option<DetectedProvider>
where
    F: Fn(&str) -> Option<String>,
{
    let has_key = |name: &str| lookup(name).is_some_and(|v| !v.trim().is_empty());

    if has_key("OPENAI_API_KEY") {
        return Some(DetectedProvider {
            name: "openai",
            kind: ProviderType::OpenAi,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
        });
    }
    if has_key("DEEPSEEK_API_KEY") {
        return Some(DetectedProvider {
            name: "deepseek",
            kind: ProviderType::OpenAi,
            model: "deepseek-chat".to_string(),
            base_url: Some(DEEPSEEK_URL.to_string()),
            api_key_env: Some("DEEPSEEK_API_KEY".to_string()),
        });
    }
    None
}

/// Whether an Ollama server answers `/api/version` within one second.
pub async fn ollama_reachable(base_url: &str) -> bool {
    let url = format!("{}/api/version", base_url.trim_end_matches('/'));
    let client = match Client::builder().timeout(OLLAMA_CHECK_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "Cannot build HTTP client for the Ollama check");
            return false;
        }
    };
    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(url = %url, error = %e, "Ollama not reachable");
            false
        }
    }
}

/// Detect a backend: API keys first, then a local Ollama server.
pub async fn detect_provider_with<F>(lookup: F, ollama_url: &str) -> Option<DetectedProvider>
where
    F: Fn(&str) -> Option<String>,
{
    let mut detected = detect_from_env(lookup);
    if detected.is_none() && ollama_reachable(ollama_url).await {
        detected = Some(DetectedProvider {
            name: "ollama",
            kind: ProviderType::Ollama,
            model: "llama3.2:1b".to_string(),
            base_url: Some(ollama_url.to_string()),
            api_key_env: None,
        });
    }
    if let Some(found) = &detected {
        info!(provider = found.name, model = %found.model, "Provider detected");
    }
    detected
}

/// Detect a backend from the process environment and the default Ollama URL.
pub async fn detect_provider() -> Option<DetectedProvider> {
    detect_provider_with(|name| std::env::var(name).ok(), DEFAULT_OLLAMA_URL).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_openai_key_takes_priority() {
        let found = detect_from_env(env(&[
            ("DEEPSEEK_API_KEY", "ds-key"),
            ("OPENAI_API_KEY", "sk-key"),
        ]))
        .unwrap();
        assert_eq!(found.name, "openai");
        assert_eq!(found.model, "gpt-4o-mini");
        assert_eq!(found.base_url, None);
    }

    #[test]
    fn test_deepseek_uses_compatible_endpoint() {
        let found = detect_from_env(env(&[("DEEPSEEK_API_KEY", "ds-key")])).unwrap();
        assert_eq!(found.kind, ProviderType::OpenAi);
        assert_eq!(found.base_url.as_deref(), Some(DEEPSEEK_URL));

        let mut config = ProviderConfig::default();
        found.apply(&mut config, None);
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.base_url.as_deref(), Some(DEEPSEEK_URL));
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        assert_eq!(detect_from_env(env(&[("OPENAI_API_KEY", "  ")])), None);
        assert_eq!(detect_from_env(env(&[])), None);
    }

    #[test]
    fn test_explicit_model_overrides_detected_default() {
        let found = detect_from_env(env(&[("OPENAI_API_KEY", "sk")])).unwrap();
        let mut config = ProviderConfig::default();
        found.apply(&mut config, Some("gpt-4o"));
        assert_eq!(config.kind, ProviderType::OpenAi);
        assert_eq!(config.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_nothing_detected_without_keys_or_server() {
        // Port 9 (discard) has no HTTP server.
        let found = detect_provider_with(env(&[]), "http://127.0.0.1:9").await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_keys_skip_the_ollama_check() {
        let found = detect_provider_with(env(&[("OPENAI_API_KEY", "sk")]), "http://127.0.0.1:9")
            .await
            .unwrap();
        assert_eq!(found.name, "openai");
    }
}
