//! Whole-model evaluation: speed, answer quality, hallucination, and the
//! academic benchmark suite with confidence intervals.

use chrono::{DateTime, Utc};
use llmeval_stats::{
    AccuracyStatistics, BootstrapConfig, accuracy_statistics, bootstrap_interval,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::benchmarks::{
    BenchmarkOutcome, BenchmarkRunner, UNCERTAINTY_MARKERS, expresses_uncertainty,
};
use crate::error::{EvalError, Result};
use crate::provider::{CacheStats, GenerationConfig, LlmProvider};

/// Prompts timed by [`ModelEvaluator::evaluate_performance`].
pub const PERFORMANCE_PROMPTS: [&str; 10] = [
    "What is Python?",
    "Explain machine learning in one sentence.",
    "What is 2+2?",
    "Name three programming languages.",
    "What is the capital of France?",
    "Define artificial intelligence.",
    "What is a neural network?",
    "Explain what an API is.",
    "What does CPU stand for?",
    "What is cloud computing?",
];

/// Questions with no truthful factual answer.
pub const HALLUCINATION_PROMPTS: [&str; 2] =
    ["Who won the 2025 World Cup?", "What is the capital of Atlantis?"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCase {
    pub prompt: String,
    pub expected: String,
}

impl QualityCase {
    pub fn new(prompt: &str, expected: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            expected: expected.to_string(),
        }
    }
}

pub fn default_quality_set() -> Vec<QualityCase> {
    vec![
        QualityCase::new("What is 5+3?", "8"),
        QualityCase::new("What is the capital of Japan?", "Tokyo"),
        QualityCase::new("How many continents are there?", "7"),
        QualityCase::new("What year did World War 2 end?", "1945"),
        QualityCase::new("What is H2O?", "water"),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub avg_tokens_per_response: f64,
    pub tokens_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub accuracy: f64,
    pub coherence_score: f64,
    pub hallucination_rate: f64,
}

impl QualityMetrics {
    /// Worst-case values recorded when the quality phase fails.
    pub fn failed() -> Self {
        Self {
            accuracy: 0.0,
            coherence_score: 0.0,
            hallucination_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedMetrics {
    pub performance: PerformanceMetrics,
    pub quality: QualityMetrics,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub model_name: String,
    pub accuracy: f64,
    pub avg_response_time: f64,
    /// Tokens per second.
    pub token_efficiency: f64,
    pub hallucination_rate: f64,
    pub coherence_score: f64,
    pub overall_score: f64,
    pub detailed_metrics: DetailedMetrics,
    pub evaluated_at: DateTime<Utc>,
}

/// One benchmark with its interval estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub outcome: BenchmarkOutcome,
    pub statistics: AccuracyStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicResults {
    pub model_name: String,
    pub dataset: String,
    pub benchmarks: Vec<BenchmarkStatistics>,
    pub aggregate_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub evaluated_at: DateTime<Utc>,
}

/// Response passes the coherence heuristic.
pub fn is_coherent(response: &str) -> bool {
    response.chars().count() > 10
        && !response.starts_with("Error")
        && response.matches('.').count() <= 10
}

/// Weighted blend of speed, accuracy, coherence and non-hallucination.
pub fn overall_score(performance: &PerformanceMetrics, quality: &QualityMetrics) -> f64 {
    let speed = (2.0 / performance.avg_response_time.max(0.1)).min(1.0);
    speed * 0.2
        + quality.accuracy * 0.3
        + quality.coherence_score * 0.2
        + (1.0 - quality.hallucination_rate) * 0.3
}

pub struct ModelEvaluator<P> {
    runner: BenchmarkRunner<P>,
    generation: GenerationConfig,
    bootstrap: BootstrapConfig,
    performance_samples: usize,
}

impl<P: LlmProvider> ModelEvaluator<P> {
    pub fn new(provider: P) -> Self {
        let generation = provider.config().clone();
        Self {
            runner: BenchmarkRunner::new(provider),
            generation,
            bootstrap: BootstrapConfig::default(),
            performance_samples: PERFORMANCE_PROMPTS.len(),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Number of timed prompts used by [`Self::evaluate_all`], capped at ten.
    pub fn with_performance_samples(mut self, num_samples: usize) -> Self {
        self.performance_samples = num_samples.min(PERFORMANCE_PROMPTS.len());
        self
    }

    /// Replace the benchmark runner, e.g. to inject a dataset.
    pub fn with_runner(
        mut self,
        configure: impl FnOnce(BenchmarkRunner<P>) -> BenchmarkRunner<P>,
    ) -> Self {
        self.runner = configure(self.runner);
        self
    }

    pub fn provider(&self) -> &P {
        self.runner.provider()
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let result = self.provider().generate(prompt, Some(&self.generation)).await?;
        Ok(result.text)
    }

    /// Time up to ten fixed prompts.
    pub async fn evaluate_performance(&self, num_samples: usize) -> Result<PerformanceMetrics> {
        if num_samples == 0 {
            return Err(EvalError::InvalidArgument {
                message: "num_samples must be positive".to_string(),
            });
        }
        let prompts: Vec<String> = PERFORMANCE_PROMPTS
            .iter()
            .take(num_samples)
            .map(|p| p.to_string())
            .collect();
        let results = self
            .provider()
            .generate_batch(&prompts, Some(&self.generation))
            .await?;

        let times: Vec<f64> = results.iter().map(|r| r.response_time_secs).collect();
        let tokens: Vec<f64> = results
            .iter()
            .map(|r| {
                if r.token_count > 0 {
                    r.token_count as f64
                } else {
                    r.text.len() as f64 / 4.0
                }
            })
            .collect();

        let n = times.len() as f64;
        let total_time: f64 = times.iter().sum();
        let total_tokens: f64 = tokens.iter().sum();
        Ok(PerformanceMetrics {
            avg_response_time: total_time / n,
            min_response_time: times.iter().copied().fold(f64::INFINITY, f64::min),
            max_response_time: times.iter().copied().fold(0.0, f64::max),
            avg_tokens_per_response: total_tokens / n,
            tokens_per_second: if total_time > 0.0 {
                total_tokens / total_time
            } else {
                0.0
            },
        })
    }

    /// Accuracy and coherence over `test_set`, then hallucination rate.
    pub async fn evaluate_quality(&self, test_set: &[QualityCase]) -> Result<QualityMetrics> {
        let mut correct = 0usize;
        let mut coherent = 0usize;
        for case in test_set {
            let response = self.chat(&case.prompt).await?;
            if response.to_lowercase().contains(&case.expected.to_lowercase()) {
                correct += 1;
            }
            if is_coherent(&response) {
                coherent += 1;
            }
        }

        let mut hallucinations = 0usize;
        for prompt in HALLUCINATION_PROMPTS {
            let response = self.chat(prompt).await?;
            if !expresses_uncertainty(&response, &UNCERTAINTY_MARKERS) {
                hallucinations += 1;
            }
        }

        let rate = |count: usize| {
            if test_set.is_empty() {
                0.0
            } else {
                count as f64 / test_set.len() as f64
            }
        };
        Ok(QualityMetrics {
            accuracy: rate(correct),
            coherence_score: rate(coherent),
            hallucination_rate: hallucinations as f64 / HALLUCINATION_PROMPTS.len() as f64,
        })
    }

    /// Performance and quality with the default prompts. A failing phase is
    /// recorded in `errors` and scored with worst-case fallbacks.
    pub async fn evaluate_all(&self) -> EvaluationResults {
        let model_name = self.provider().model().to_string();
        info!(model = %model_name, "Starting evaluation");
        let mut errors = Vec::new();

        let performance = match self.evaluate_performance(self.performance_samples).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Performance evaluation failed");
                errors.push(format!("Performance: {e}"));
                PerformanceMetrics::default()
            }
        };

        let quality = match self.evaluate_quality(&default_quality_set()).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Quality evaluation failed");
                errors.push(format!("Quality: {e}"));
                QualityMetrics::failed()
            }
        };

        let overall_score = overall_score(&performance, &quality);
        info!(model = %model_name, overall_score, errors = errors.len(), "Evaluation complete");

        EvaluationResults {
            model_name,
            accuracy: quality.accuracy,
            avg_response_time: performance.avg_response_time,
            token_efficiency: performance.tokens_per_second,
            hallucination_rate: quality.hallucination_rate,
            coherence_score: quality.coherence_score,
            overall_score,
            detailed_metrics: DetailedMetrics {
                performance,
                quality,
                errors,
            },
            evaluated_at: Utc::now(),
        }
    }

    /// Run all benchmarks and attach Wilson and bootstrap intervals.
    pub async fn evaluate_academic(
        &self,
        sample_size: Option<usize>,
        confidence: f64,
    ) -> Result<AcademicResults> {
        let suite = self
            .runner
            .run_all_sampled(sample_size.or(self.runner.sample_size()))
            .await?;

        let bootstrap = self.bootstrap.with_confidence(confidence);
        let mut benchmarks = Vec::with_capacity(suite.outcomes.len());
        for outcome in suite.outcomes {
            let mut statistics = accuracy_statistics(
                outcome.correct as i64,
                outcome.total as i64,
                None,
                confidence,
            )?;
            statistics.bootstrap_ci = Some(bootstrap_interval(&outcome.outcomes, &bootstrap)?);
            benchmarks.push(BenchmarkStatistics {
                outcome,
                statistics,
            });
        }

        Ok(AcademicResults {
            model_name: suite.model,
            dataset: suite.dataset,
            benchmarks,
            aggregate_score: suite.aggregate_score,
            cache: self.provider().cache_stats().await,
            evaluated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ReplayProvider;
    use std::collections::HashMap;

    fn replay(pairs: &[(&str, &str)]) -> ReplayProvider {
        ReplayProvider::new(
            "fixture",
            pairs
                .iter()
                .map(|(p, r)| (p.to_string(), r.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_coherence_heuristic() {
        assert!(is_coherent("Water is a molecule of hydrogen and oxygen."));
        assert!(!is_coherent("Short."));
        assert!(!is_coherent("Error: the model failed to respond"));
        assert!(!is_coherent("a. b. c. d. e. f. g. h. i. j. k."));
    }

    #[test]
    fn test_overall_score_weights() {
        let fast = PerformanceMetrics {
            avg_response_time: 0.5,
            ..Default::default()
        };
        let perfect = QualityMetrics {
            accuracy: 1.0,
            coherence_score: 1.0,
            hallucination_rate: 0.0,
        };
        assert!((overall_score(&fast, &perfect) - 1.0).abs() < 1e-12);

        // 4s responses earn half the speed credit.
        let slow = PerformanceMetrics {
            avg_response_time: 4.0,
            ..Default::default()
        };
        assert!((overall_score(&slow, &perfect) - 0.9).abs() < 1e-12);

        // Failed phases still produce a score: speed is capped at 1.
        let failed = overall_score(&PerformanceMetrics::default(), &QualityMetrics::failed());
        assert!((failed - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_quality_metrics() {
        let provider = replay(&[
            ("What is 5+3?", "5 plus 3 equals 8."),
            ("What is the capital of Japan?", "The capital of Japan is Tokyo."),
            ("Who won the 2025 World Cup?", "I don't know, that is uncertain."),
        ]);
        let evaluator = ModelEvaluator::new(provider);
        let quality = evaluator
            .evaluate_quality(&default_quality_set()[..2])
            .await
            .unwrap();
        assert_eq!(quality.accuracy, 1.0);
        assert_eq!(quality.coherence_score, 1.0);
        // Atlantis falls back to a canned reply without uncertainty markers.
        assert_eq!(quality.hallucination_rate, 0.5);
    }

    #[tokio::test]
    async fn test_performance_caps_at_prompt_list() {
        let evaluator = ModelEvaluator::new(replay(&[]));
        let perf = evaluator.evaluate_performance(50).await.unwrap();
        assert!(perf.avg_tokens_per_response > 0.0);
        assert!(perf.min_response_time <= perf.max_response_time);
        assert!(evaluator.evaluate_performance(0).await.is_err());
    }

    #[tokio::test]
    async fn test_evaluate_all_records_phase_errors() {
        let bad = GenerationConfig {
            max_tokens: 0,
            ..Default::default()
        };
        let evaluator = ModelEvaluator::new(replay(&[])).with_generation_config(bad);
        let results = evaluator.evaluate_all().await;
        assert_eq!(results.detailed_metrics.errors.len(), 2);
        assert!(results.detailed_metrics.errors[0].starts_with("Performance: "));
        assert!(results.detailed_metrics.errors[1].starts_with("Quality: "));
        assert_eq!(results.hallucination_rate, 1.0);
        assert_eq!(results.avg_response_time, 0.0);
        assert!((results.overall_score - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_academic_attaches_intervals() {
        let evaluator = ModelEvaluator::new(replay(&[]))
            .with_bootstrap(BootstrapConfig::default().with_resamples(500));
        let academic = evaluator.evaluate_academic(Some(2), 0.95).await.unwrap();
        assert_eq!(academic.benchmarks.len(), 3);
        for bench in &academic.benchmarks {
            assert_eq!(bench.outcome.total, 2);
            let stats = &bench.statistics;
            assert!(stats.wilson_ci.lower <= stats.accuracy + 1e-12);
            assert!(stats.accuracy <= stats.wilson_ci.upper + 1e-12);
            assert!(stats.bootstrap_ci.is_some());
        }
        assert!(academic.cache.is_none());
    }
}
