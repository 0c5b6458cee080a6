//! CLI subcommand handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use futures::future::join_all;
use llmeval_core::config::{config_exists, load_config, write_default_config};
use llmeval_core::report::{self, save_report};
use llmeval_core::{
    BenchmarkKind, BenchmarkRunner, EvalConfig, JsonDataset, LlmProvider, ModelEvaluator,
    ProviderConfig, ProviderType, compare_models, create_provider, detect_provider, leaderboard,
};
use llmeval_stats::wilson_interval;
use tracing::{info, warn};

use crate::{Commands, ConfigAction, Overrides};

type DynProvider = Arc<dyn LlmProvider>;

/// Handle a CLI subcommand.
pub(crate) async fn handle_command(
    command: Commands,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    let resolved = match &command {
        Commands::Stats { .. } => overrides.clone(),
        Commands::Quick { .. } => resolve_auto(overrides, true).await?,
        _ => resolve_auto(overrides, false).await?,
    };
    let overrides = &resolved;
    match command {
        Commands::Quick {
            sample_size,
            output,
        } => {
            let config = resolve_config(workspace, overrides)?;
            let provider = build_provider(&config.provider, &config)?;
            println!("Provider:    {}", config.provider.kind);
            println!("Model:       {}", config.provider.model);
            println!("Sample size: {sample_size}");
            if !provider.is_available().await {
                bail!(
                    "Provider {} is not responding or model '{}' is missing",
                    config.provider.kind,
                    config.provider.model
                );
            }

            let runner = build_runner(provider.clone(), &config, Some(sample_size), None)?;
            let suite = runner.run_all().await?;
            for outcome in &suite.outcomes {
                println!(
                    "{:<12} {:>6.1}%",
                    outcome.kind.display_name(),
                    outcome.accuracy() * 100.0
                );
            }
            println!("{:<12} {:>6.1}%", "Overall", suite.aggregate_score * 100.0);
            if let Some(stats) = provider.cache_stats().await {
                println!("Cache:       {:.0}% hit rate", stats.hit_rate_percent);
            }

            if let Some(path) = output {
                let saved = serde_json::json!({
                    "model": config.provider.model,
                    "provider": config.provider.kind,
                    "sample_size": sample_size,
                    "results": suite,
                });
                save_report(&path, &report::to_json(&saved)?)?;
                println!("Results written to {}", path.display());
            }
            Ok(())
        }
        Commands::Run { output, samples } => {
            let config = resolve_config(workspace, overrides)?;
            let provider = build_provider(&config.provider, &config)?;
            let evaluator = ModelEvaluator::new(provider)
                .with_bootstrap(config.statistics.bootstrap())
                .with_performance_samples(samples);
            let results = evaluator.evaluate_all().await;

            println!("Model:              {}", results.model_name);
            println!("Accuracy:           {:.1}%", results.accuracy * 100.0);
            println!("Avg response time:  {:.2}s", results.avg_response_time);
            println!("Token efficiency:   {:.1} tokens/s", results.token_efficiency);
            println!("Hallucination rate: {:.1}%", results.hallucination_rate * 100.0);
            println!("Coherence:          {:.1}%", results.coherence_score * 100.0);
            println!("Overall score:      {:.2}/1.00", results.overall_score);
            for error in &results.detailed_metrics.errors {
                warn!(%error, "Evaluation phase failed");
            }

            save_report(&output, &report::markdown_report(&results)?)?;
            println!("Report written to {}", output.display());
            Ok(())
        }
        Commands::Benchmark {
            benchmark,
            sample_size,
            dataset,
            output,
        } => {
            let config = resolve_config(workspace, overrides)?;
            let provider = build_provider(&config.provider, &config)?;
            let runner = build_runner(provider, &config, sample_size, dataset.as_deref())?;

            let outcomes = match benchmark {
                Some(name) => {
                    let kind: BenchmarkKind = name.parse()?;
                    vec![runner.run(kind).await?]
                }
                None => runner.run_all().await?.outcomes,
            };
            let confidence = config.statistics.confidence;
            for outcome in &outcomes {
                let ci = wilson_interval(outcome.correct as i64, outcome.total as i64, confidence)?;
                println!(
                    "{:<12} {:>6.1}% ({}/{})  {:.0}% CI [{:.1}%, {:.1}%]",
                    outcome.kind.display_name(),
                    outcome.accuracy() * 100.0,
                    outcome.correct,
                    outcome.total,
                    confidence * 100.0,
                    ci.lower * 100.0,
                    ci.upper * 100.0
                );
            }
            if let Some(path) = output {
                save_report(&path, &report::to_json(&outcomes)?)?;
                println!("Results written to {}", path.display());
            }
            Ok(())
        }
        Commands::Academic {
            sample_size,
            confidence,
            dataset,
            output,
            latex,
        } => {
            let config = resolve_config(workspace, overrides)?;
            let confidence = confidence.unwrap_or(config.statistics.confidence);
            let provider = build_provider(&config.provider, &config)?;
            let runner =
                build_runner(provider.clone(), &config, sample_size, dataset.as_deref())?;
            let evaluator = ModelEvaluator::new(provider)
                .with_bootstrap(config.statistics.bootstrap())
                .with_runner(|_| runner);

            let results = evaluator.evaluate_academic(None, confidence).await?;
            println!("{}", report::academic_markdown(&results));

            if let Some(path) = output {
                save_report(&path, &report::to_json(&results)?)?;
                println!("Results written to {}", path.display());
            }
            if let Some(path) = latex {
                save_report(&path, &report::latex_table(std::slice::from_ref(&results)))?;
                println!("LaTeX table written to {}", path.display());
            }
            Ok(())
        }
        Commands::Compare {
            models,
            leaderboard,
            sample_size,
            alpha,
            output,
        } => {
            let models: Vec<String> = models
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if models.len() < 2 {
                bail!("Compare needs at least two models, got {}", models.len());
            }
            let config = resolve_config(workspace, overrides)?;
            if leaderboard || models.len() > 2 {
                return handle_leaderboard(&config, &models, output.as_deref()).await;
            }

            let alpha = alpha.unwrap_or(config.statistics.alpha);
            let runner_a = model_runner(&config, &models[0], sample_size)?;
            let runner_b = model_runner(&config, &models[1], sample_size)?;

            let mut comparisons = Vec::with_capacity(BenchmarkKind::ALL.len());
            for kind in BenchmarkKind::ALL {
                let comparison = compare_models(&runner_a, &runner_b, kind, alpha)
                    .await
                    .with_context(|| format!("Comparison on {kind} failed"))?;
                println!("{}", report::comparison_markdown(&comparison));
                comparisons.push(comparison);
            }
            if let Some(path) = output {
                save_report(&path, &report::to_json(&comparisons)?)?;
                println!("Results written to {}", path.display());
            }
            Ok(())
        }
        Commands::Providers => handle_providers(workspace, overrides).await,
        Commands::Config { action } => handle_config(action, workspace, overrides),
        Commands::Stats { action } => crate::stats::handle_stats(action),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            if config_exists(Some(workspace)) {
                info!("An existing configuration will be layered under the new file");
            }
            let path = write_default_config(workspace)
                .map_err(|e| anyhow::anyhow!("Failed to create config: {e}"))?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = resolve_config(workspace, overrides)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_leaderboard(
    config: &EvalConfig,
    models: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let evaluators = models
        .iter()
        .map(|model| {
            let provider = model_provider(config, model)?;
            Ok(ModelEvaluator::new(provider).with_bootstrap(config.statistics.bootstrap()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let board = leaderboard(&evaluators).await;
    if board.entries.is_empty() {
        bail!("None of the models is available: {}", board.skipped.join(", "));
    }
    println!("{}", report::leaderboard_markdown(&board));
    if let Some(path) = output {
        save_report(path, &report::to_json(&board)?)?;
        println!("Results written to {}", path.display());
    }
    Ok(())
}

async fn handle_providers(workspace: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = resolve_config(workspace, overrides)?;

    let candidates: Vec<(ProviderType, anyhow::Result<DynProvider>)> =
        [ProviderType::Ollama, ProviderType::OpenAi, ProviderType::Replay]
            .into_iter()
            .map(|kind| {
                let provider_config = ProviderConfig {
                    kind,
                    cache: false,
                    ..config.provider.clone()
                };
                (kind, build_provider(&provider_config, &config))
            })
            .collect();

    let checks = candidates.iter().map(|(kind, provider)| async move {
        let status = match provider {
            Ok(p) => {
                if p.is_available().await {
                    format!("available ({})", p.model())
                } else {
                    format!("unreachable or model '{}' missing", p.model())
                }
            }
            Err(e) => format!("not configured: {e:#}"),
        };
        (*kind, status)
    });

    for (kind, status) in join_all(checks).await {
        let marker = if kind == config.provider.kind { "*" } else { " " };
        println!("{marker} {:<8} {status}", kind.to_string());
    }
    Ok(())
}

/// Replace `--provider auto` with the backend found in the environment.
/// With `implicit`, a missing `--provider` is treated as `auto` too.
async fn resolve_auto(overrides: &Overrides, implicit: bool) -> anyhow::Result<Overrides> {
    let requested = match overrides.provider.as_deref() {
        Some(p) => p.eq_ignore_ascii_case("auto"),
        None => implicit,
    };
    if !requested || overrides.detected.is_some() {
        return Ok(overrides.clone());
    }
    let detected = detect_provider().await.context(
        "No provider detected. Set OPENAI_API_KEY or DEEPSEEK_API_KEY, \
         or start Ollama (ollama serve)",
    )?;
    Ok(Overrides {
        provider: None,
        detected: Some(detected),
        ..overrides.clone()
    })
}

/// Layered configuration with command-line overrides applied on top.
fn resolve_config(workspace: &Path, overrides: &Overrides) -> anyhow::Result<EvalConfig> {
    let mut config = load_config(Some(workspace), overrides.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
    if let Some(model) = &overrides.model {
        config.provider.model = model.clone();
    }
    if let Some(provider) = &overrides.provider {
        config.provider.kind = provider.parse()?;
    }
    if let Some(detected) = &overrides.detected {
        detected.apply(&mut config.provider, overrides.model.as_deref());
    }
    if overrides.no_cache {
        config.provider.cache = false;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn build_provider(provider: &ProviderConfig, config: &EvalConfig) -> anyhow::Result<DynProvider> {
    let retry = config
        .retry
        .with_max_retries(config.generation.retry_attempts);
    create_provider(provider, &config.generation, &retry)
        .with_context(|| format!("Failed to create {} provider", provider.kind))
}

fn build_runner(
    provider: DynProvider,
    config: &EvalConfig,
    sample_size: Option<usize>,
    dataset: Option<&Path>,
) -> anyhow::Result<BenchmarkRunner<DynProvider>> {
    let runner = BenchmarkRunner::new(provider)
        .with_sample_size(sample_size.or(config.benchmarks.sample_size));
    match dataset.or(config.benchmarks.dataset_path.as_deref()) {
        Some(path) => {
            let dataset = JsonDataset::load(path)
                .with_context(|| format!("Failed to load dataset {}", path.display()))?;
            Ok(runner.with_dataset(dataset))
        }
        None => Ok(runner),
    }
}

fn model_provider(config: &EvalConfig, model: &str) -> anyhow::Result<DynProvider> {
    let provider_config = ProviderConfig {
        model: model.to_string(),
        ..config.provider.clone()
    };
    build_provider(&provider_config, config)
}

fn model_runner(
    config: &EvalConfig,
    model: &str,
    sample_size: Option<usize>,
) -> anyhow::Result<BenchmarkRunner<DynProvider>> {
    build_runner(model_provider(config, model)?, config, sample_size, None)
}
