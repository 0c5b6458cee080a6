//! Rendering evaluation results as Markdown, LaTeX and JSON.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::benchmarks::BenchmarkKind;
use crate::compare::{Leaderboard, ModelComparison};
use crate::error::Result;
use crate::evaluator::{AcademicResults, EvaluationResults};

/// Markdown report for a full evaluation.
pub fn markdown_report(results: &EvaluationResults) -> Result<String> {
    let details = &results.detailed_metrics;
    let mut out = String::new();
    out.push_str(&format!("# Evaluation Report: {}\n\n", results.model_name));
    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!("| Accuracy | {:.1}% |\n", results.accuracy * 100.0));
    out.push_str(&format!(
        "| Avg Response Time | {:.2}s |\n",
        results.avg_response_time
    ));
    out.push_str(&format!(
        "| Token Efficiency | {:.1} tokens/s |\n",
        results.token_efficiency
    ));
    out.push_str(&format!(
        "| Hallucination Rate | {:.1}% |\n",
        results.hallucination_rate * 100.0
    ));
    out.push_str(&format!(
        "| Coherence Score | {:.1}% |\n",
        results.coherence_score * 100.0
    ));
    out.push_str(&format!(
        "| **Overall Score** | **{:.2}/1.00** |\n\n",
        results.overall_score
    ));

    out.push_str("## Performance Details\n\n");
    out.push_str(&format!(
        "```json\n{}\n```\n\n",
        serde_json::to_string_pretty(&details.performance)?
    ));
    out.push_str("## Quality Details\n\n");
    out.push_str(&format!(
        "```json\n{}\n```\n\n",
        serde_json::to_string_pretty(&details.quality)?
    ));

    if !details.errors.is_empty() {
        out.push_str("## Errors\n\n");
        for error in &details.errors {
            out.push_str(&format!("- {error}\n"));
        }
        out.push('\n');
    }

    out.push_str("---\n");
    out.push_str(&format!(
        "Generated by llm-eval v{} at {}\n",
        env!("CARGO_PKG_VERSION"),
        results.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    Ok(out)
}

/// Markdown table of benchmark accuracies with interval estimates.
pub fn academic_markdown(results: &AcademicResults) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Academic Evaluation: {}\n\n", results.model_name));
    out.push_str(&format!("Dataset: `{}`\n\n", results.dataset));
    out.push_str("| Benchmark | Accuracy | Wilson CI | Bootstrap CI | n |\n");
    out.push_str("|-----------|----------|-----------|--------------|---|\n");
    for bench in &results.benchmarks {
        let stats = &bench.statistics;
        let bootstrap = stats
            .bootstrap_ci
            .map(|ci| format!("[{:.1}%, {:.1}%]", ci.lower * 100.0, ci.upper * 100.0))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {:.1}% | [{:.1}%, {:.1}%] | {} | {} |\n",
            bench.outcome.kind,
            stats.accuracy * 100.0,
            stats.wilson_ci.lower * 100.0,
            stats.wilson_ci.upper * 100.0,
            bootstrap,
            stats.total
        ));
    }
    out.push_str(&format!(
        "\nAggregate score: {:.1}%\n",
        results.aggregate_score * 100.0
    ));
    if let Some(cache) = &results.cache {
        out.push_str(&format!(
            "Cache: {} hits, {} misses ({:.1}% hit rate)\n",
            cache.hits, cache.misses, cache.hit_rate_percent
        ));
    }
    out
}

fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            _ => out.push(ch),
        }
    }
    out
}

fn latex_cell(result: &AcademicResults, kind: BenchmarkKind) -> String {
    result
        .benchmarks
        .iter()
        .find(|b| b.outcome.kind == kind)
        .map(|b| {
            let s = &b.statistics;
            format!(
                "{:.1} [{:.1}, {:.1}]",
                s.accuracy * 100.0,
                s.wilson_ci.lower * 100.0,
                s.wilson_ci.upper * 100.0
            )
        })
        .unwrap_or_else(|| "--".to_string())
}

/// LaTeX `tabular` with one row per model; each cell is `accuracy [lower, upper]`
/// in percent using the Wilson interval.
pub fn latex_table(results: &[AcademicResults]) -> String {
    let confidence = results
        .iter()
        .flat_map(|r| r.benchmarks.first())
        .map(|b| b.statistics.confidence_level)
        .next()
        .unwrap_or(llmeval_stats::DEFAULT_CONFIDENCE);

    let mut out = String::new();
    out.push_str("\\begin{table}[ht]\n");
    out.push_str("\\centering\n");
    out.push_str(&format!(
        "\\begin{{tabular}}{{l{}}}\n",
        "c".repeat(BenchmarkKind::ALL.len() + 1)
    ));
    out.push_str("\\hline\n");
    let header: Vec<&str> = BenchmarkKind::ALL.iter().map(|k| k.display_name()).collect();
    out.push_str(&format!("Model & {} & Aggregate \\\\\n", header.join(" & ")));
    out.push_str("\\hline\n");
    for result in results {
        let cells: Vec<String> = BenchmarkKind::ALL
            .iter()
            .map(|kind| latex_cell(result, *kind))
            .collect();
        out.push_str(&format!(
            "{} & {} & {:.1} \\\\\n",
            escape_latex(&result.model_name),
            cells.join(" & "),
            result.aggregate_score * 100.0
        ));
    }
    out.push_str("\\hline\n");
    out.push_str("\\end{tabular}\n");
    out.push_str(&format!(
        "\\caption{{Benchmark accuracy (\\%) with {:.0}\\% Wilson confidence intervals.}}\n",
        confidence * 100.0
    ));
    out.push_str("\\end{table}\n");
    out
}

/// Markdown summary of a paired comparison.
pub fn comparison_markdown(cmp: &ModelComparison) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# {} vs {} on {}\n\n",
        cmp.model_a, cmp.model_b, cmp.benchmark
    ));
    out.push_str("| Statistic | Value |\n");
    out.push_str("|-----------|-------|\n");
    out.push_str(&format!("| Accuracy A | {:.1}% |\n", cmp.accuracy_a * 100.0));
    out.push_str(&format!("| Accuracy B | {:.1}% |\n", cmp.accuracy_b * 100.0));
    out.push_str(&format!(
        "| McNemar chi2 | {:.3} (p = {:.4}) |\n",
        cmp.mcnemar.statistic, cmp.mcnemar.p_value
    ));
    out.push_str(&format!(
        "| Cohen's h | {:.3} ({}) |\n",
        cmp.effect_size.h,
        cmp.effect_size.magnitude.as_str()
    ));
    out.push_str(&format!(
        "| Proportion z | {:.3} (p = {:.4}) |\n",
        cmp.proportion_test.z_statistic, cmp.proportion_test.p_value
    ));
    out.push_str(&format!(
        "| Cohen's kappa | {:.3} ({}) |\n",
        cmp.kappa, cmp.agreement
    ));
    out.push_str(&format!(
        "| Items needed per model | {} |\n\n",
        cmp.required_sample_size
    ));
    out.push_str(&format!("{}\n", cmp.mcnemar.conclusion));
    out
}

/// Markdown leaderboard, best model first.
pub fn leaderboard_markdown(board: &Leaderboard) -> String {
    let mut out = String::from("# Model Leaderboard\n\n");
    out.push_str("| Rank | Model | Score | Accuracy | Speed (s) |\n");
    out.push_str("|------|-------|-------|----------|-----------|\n");
    for (rank, entry) in board.entries.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {:.1}% | {:.1}% | {:.2} |\n",
            rank + 1,
            entry.model,
            entry.overall_score * 100.0,
            entry.accuracy * 100.0,
            entry.avg_response_time
        ));
    }
    if !board.skipped.is_empty() {
        out.push_str(&format!("\nSkipped (unavailable): {}\n", board.skipped.join(", ")));
    }
    out
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write `content` to `path`, creating parent directories.
pub fn save_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!(path = %path.display(), "Report saved");
    Ok(())
}
