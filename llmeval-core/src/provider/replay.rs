//! Offline provider answering from a recorded prompt -> response map.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use super::{GenerationConfig, GenerationResult, LlmProvider, ModelInfo, ProviderType};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

pub struct ReplayProvider {
    model: String,
    responses: HashMap<String, String>,
    generation: GenerationConfig,
}

impl ReplayProvider {
    pub fn new(model: impl Into<String>, responses: HashMap<String, String>) -> Self {
        Self {
            model: model.into(),
            responses,
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Build from configuration; `responses_path` is optional and an absent
    /// path yields a provider that only gives the fallback reply.
    pub fn from_config(
        config: &ProviderConfig,
        generation: &GenerationConfig,
    ) -> Result<Self, ProviderError> {
        let responses = match &config.responses_path {
            Some(path) => Self::load_responses(path)?,
            None => HashMap::new(),
        };
        Ok(Self::new(config.model.clone(), responses).with_generation_config(generation.clone()))
    }

    fn load_responses(path: &Path) -> Result<HashMap<String, String>, ProviderError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProviderError::InvalidConfig {
            message: format!("Cannot read responses file {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| ProviderError::InvalidConfig {
            message: format!("Invalid responses file {}: {e}", path.display()),
        })
    }

    fn reply(&self, prompt: &str) -> String {
        self.responses
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| format!("Mock response to: {prompt}"))
    }
}

#[async_trait]
impl LlmProvider for ReplayProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Replay
    }

    fn config(&self) -> &GenerationConfig {
        &self.generation
    }

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<GenerationResult, ProviderError> {
        config.unwrap_or(&self.generation).validate()?;
        let start = Instant::now();
        let text = self.reply(prompt);
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "recorded".to_string(),
            serde_json::Value::Bool(self.responses.contains_key(prompt)),
        );
        Ok(GenerationResult {
            token_count: u32::try_from(text.split_whitespace().count())
                .unwrap_or(u32::MAX),
            text,
            response_time_secs: start.elapsed().as_secs_f64(),
            model_name: self.model.clone(),
            metadata,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn model_info(&self) -> Result<ModelInfo, ProviderError> {
        let mut details = BTreeMap::new();
        details.insert("recorded_prompts".to_string(), self.responses.len().to_string());
        Ok(ModelInfo {
            name: self.model.clone(),
            provider: ProviderType::Replay.to_string(),
            details,
        })
    }
}
