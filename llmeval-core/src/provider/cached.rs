//! Memoising decorator over any [`LlmProvider`].

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::{GenerationConfig, GenerationResult, LlmProvider, ModelInfo, ProviderType};
use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate_percent: f64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, GenerationResult>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn insert(&mut self, key: String, result: GenerationResult, capacity: Option<usize>) {
        if self.entries.insert(key.clone(), result).is_none() {
            self.order.push_back(key);
        }
        if let Some(capacity) = capacity {
            while self.entries.len() > capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Caches `generate` results keyed by model, prompt and sampling parameters.
///
/// Errors are never cached. Without a capacity the cache lives as long as the
/// provider and is never evicted; with one, the oldest entries go first.
pub struct CachedProvider<P> {
    inner: P,
    capacity: Option<usize>,
    state: Mutex<CacheState>,
}

impl<P: LlmProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            capacity: None,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Keep at most `capacity` responses; `None` is unbounded.
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let lookups = state.hits + state.misses;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
            hit_rate_percent: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64 * 100.0
            },
        }
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = CacheState::default();
    }

    fn cache_key(&self, prompt: &str, config: &GenerationConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model().as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(config.temperature.to_le_bytes());
        hasher.update(config.max_tokens.to_le_bytes());
        hasher.update(config.top_p.to_le_bytes());
        hasher.update(config.top_k.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for CachedProvider<P> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    fn provider_type(&self) -> ProviderType {
        self.inner.provider_type()
    }

    fn config(&self) -> &GenerationConfig {
        self.inner.config()
    }

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<GenerationResult, ProviderError> {
        let effective = config.unwrap_or_else(|| self.inner.config());
        let key = self.cache_key(prompt, effective);

        {
            let mut state = self.state.lock().await;
            if let Some(hit) = state.entries.get(&key).cloned() {
                state.hits += 1;
                debug!(model = %self.inner.model(), "Cache hit");
                return Ok(hit);
            }
            state.misses += 1;
        }

        // Lock released while the backend runs.
        let result = self.inner.generate(prompt, config).await?;
        self.state
            .lock()
            .await
            .insert(key, result.clone(), self.capacity);
        Ok(result)
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn model_info(&self) -> Result<ModelInfo, ProviderError> {
        self.inner.model_info().await
    }

    async fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ReplayProvider;

    fn cached() -> CachedProvider<ReplayProvider> {
        CachedProvider::new(ReplayProvider::new(
            "fixture",
            HashMap::from([("What is 7?".to_string(), "7".to_string())]),
        ))
    }

    #[tokio::test]
    async fn test_repeated_prompt_hits_cache() {
        let provider = cached();
        let first = provider.generate("What is 7?", None).await.unwrap();
        let second = provider.generate("What is 7?", None).await.unwrap();
        assert_eq!(first, second);

        let stats = provider.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate_percent, 50.0);
        assert_eq!(provider.cache_stats().await, Some(stats));
    }

    #[tokio::test]
    async fn test_sampling_parameters_are_part_of_key() {
        let provider = cached();
        let cold = GenerationConfig {
            temperature: 0.0,
            ..Default::default()
        };
        provider.generate("What is 7?", None).await.unwrap();
        provider.generate("What is 7?", Some(&cold)).await.unwrap();
        let stats = provider.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let provider = cached();
        let bad = GenerationConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(provider.generate("x", Some(&bad)).await.is_err());
        assert_eq!(provider.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_entry() {
        let provider = cached().with_capacity(Some(2));
        for prompt in ["one", "two", "three"] {
            provider.generate(prompt, None).await.unwrap();
        }
        assert_eq!(provider.stats().await.entries, 2);

        // "one" was evicted, "three" is still cached.
        provider.generate("three", None).await.unwrap();
        provider.generate("one", None).await.unwrap();
        let stats = provider.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 4);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn test_clear_resets_state() {
        let provider = cached();
        provider.generate("What is 7?", None).await.unwrap();
        provider.clear().await;
        assert_eq!(provider.stats().await, CacheStats::default());
    }
}
