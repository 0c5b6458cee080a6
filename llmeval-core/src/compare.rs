//! Paired comparison of two models on the same benchmark items, and a
//! leaderboard ranking any number of models by overall score.

use llmeval_stats::{
    Agreement, ContingencyTable, DEFAULT_POWER, EffectSize, McNemarResult, ProportionMethod,
    ProportionTestResult, SampleSize, cohens_h, cohens_kappa, interpret_kappa, mcnemar_from_table,
    proportion_test, required_sample_size,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::benchmarks::{BenchmarkKind, BenchmarkOutcome, BenchmarkRunner};
use crate::error::{EvalError, Result};
use crate::evaluator::{EvaluationResults, ModelEvaluator};
use crate::provider::LlmProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub benchmark: BenchmarkKind,
    pub model_a: String,
    pub model_b: String,
    pub accuracy_a: f64,
    pub accuracy_b: f64,
    pub mcnemar: McNemarResult,
    pub effect_size: EffectSize,
    pub proportion_test: ProportionTestResult,
    pub kappa: f64,
    pub agreement: Agreement,
    /// Items per model needed to detect the observed effect at 80% power.
    pub required_sample_size: SampleSize,
}

/// Compare two runs of the same benchmark item-by-item.
pub fn compare_outcomes(
    a: &BenchmarkOutcome,
    b: &BenchmarkOutcome,
    alpha: f64,
) -> Result<ModelComparison> {
    if a.kind != b.kind {
        return Err(EvalError::Comparison {
            message: format!("Cannot compare {} with {}", a.kind, b.kind),
        });
    }
    if a.total != b.total || a.outcomes.len() != b.outcomes.len() {
        return Err(EvalError::Comparison {
            message: format!(
                "Models were evaluated on different item counts ({} vs {})",
                a.total, b.total
            ),
        });
    }

    // Outcomes already record correctness.
    let table = ContingencyTable::from_correctness(&a.outcomes, &b.outcomes)?;
    let mcnemar = mcnemar_from_table(table, alpha)?;
    let effect_size = cohens_h(a.accuracy(), b.accuracy())?;
    let proportion_test = proportion_test(
        a.correct as i64,
        b.correct as i64,
        a.total as i64,
        ProportionMethod::default(),
        alpha,
    )?;
    let kappa = cohens_kappa(&a.outcomes, &b.outcomes)?;
    let required_sample_size = required_sample_size(effect_size.h, DEFAULT_POWER, alpha)?;

    info!(
        benchmark = %a.kind,
        model_a = %a.model,
        model_b = %b.model,
        p_value = mcnemar.p_value,
        h = effect_size.h,
        "Models compared"
    );

    Ok(ModelComparison {
        benchmark: a.kind,
        model_a: a.model.clone(),
        model_b: b.model.clone(),
        accuracy_a: a.accuracy(),
        accuracy_b: b.accuracy(),
        mcnemar,
        effect_size,
        proportion_test,
        kappa,
        agreement: interpret_kappa(kappa),
        required_sample_size,
    })
}

/// Run `kind` on both models concurrently, then compare.
pub async fn compare_models<A, B>(
    runner_a: &BenchmarkRunner<A>,
    runner_b: &BenchmarkRunner<B>,
    kind: BenchmarkKind,
    alpha: f64,
) -> Result<ModelComparison>
where
    A: LlmProvider,
    B: LlmProvider,
{
    let (a, b) = futures::try_join!(runner_a.run(kind), runner_b.run(kind))?;
    compare_outcomes(&a, &b, alpha)
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub model: String,
    pub overall_score: f64,
    pub accuracy: f64,
    pub avg_response_time: f64,
    pub coherence_score: f64,
}

impl From<&EvaluationResults> for LeaderboardEntry {
    fn from(results: &EvaluationResults) -> Self {
        Self {
            model: results.model_name.clone(),
            overall_score: results.overall_score,
            accuracy: results.accuracy,
            avg_response_time: results.avg_response_time,
            coherence_score: results.coherence_score,
        }
    }
}

/// Evaluated models ranked best first, plus the ones that were unreachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Sort entries by overall score, highest first.
pub fn rank_models(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    entries
}

/// Run the full evaluation on every available model and rank the results.
///
/// Models whose provider is not available are skipped with a warning.
pub async fn leaderboard<P: LlmProvider>(evaluators: &[ModelEvaluator<P>]) -> Leaderboard {
    let mut entries = Vec::with_capacity(evaluators.len());
    let mut skipped = Vec::new();
    for evaluator in evaluators {
        let model = evaluator.provider().model().to_string();
        if !evaluator.provider().is_available().await {
            warn!(model = %model, "Model not available, skipping");
            skipped.push(model);
            continue;
        }
        let results = evaluator.evaluate_all().await;
        info!(model = %model, overall = results.overall_score, "Model evaluated");
        entries.push(LeaderboardEntry::from(&results));
    }
    Leaderboard {
        entries: rank_models(entries),
        skipped,
    }
}
