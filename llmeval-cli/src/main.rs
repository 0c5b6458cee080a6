//! llm-eval CLI: evaluate language models and analyse the results.
//!
//! Runs evaluations against a configured provider and offers offline
//! statistical calculators for results obtained elsewhere.

mod commands;
mod stats;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// llm-eval: LLM evaluation with publication-grade statistics
#[derive(Parser, Debug)]
#[command(name = "llm-eval", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model to evaluate (overrides configuration)
    #[arg(short, long)]
    model: Option<String>,

    /// Provider: ollama, openai, deepseek, replay or auto (overrides configuration)
    #[arg(short, long)]
    provider: Option<String>,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Zero-config evaluation with an auto-detected provider
    Quick {
        /// Items per benchmark
        #[arg(short = 'n', long, default_value_t = 20)]
        sample_size: usize,
        /// Write JSON results to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Full evaluation: speed, accuracy, coherence, hallucination
    Run {
        /// Markdown report path
        #[arg(short, long, default_value = "report.md")]
        output: PathBuf,
        /// Number of performance prompts (max 10)
        #[arg(long, default_value_t = 10)]
        samples: usize,
    },
    /// Run MMLU, TruthfulQA and HellaSwag
    Benchmark {
        /// Run a single benchmark (mmlu, truthfulqa, hellaswag)
        #[arg(short, long)]
        benchmark: Option<String>,
        /// Evaluate only the first N items of each benchmark
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,
        /// JSON dataset replacing the built-in items
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Write JSON results to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Benchmarks with confidence intervals, for papers
    Academic {
        /// Evaluate only the first N items of each benchmark
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,
        /// Confidence level for intervals
        #[arg(long)]
        confidence: Option<f64>,
        /// JSON dataset replacing the built-in items
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Write JSON results to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write a LaTeX table to this path
        #[arg(long)]
        latex: Option<PathBuf>,
    },
    /// Compare models: a paired test for two, a leaderboard for more
    Compare {
        /// Comma-separated model names (e.g. llama3.2:1b,mistral:7b)
        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        models: Vec<String>,
        /// Rank by full evaluation even when comparing two models
        #[arg(long)]
        leaderboard: bool,
        /// Evaluate only the first N items of each benchmark (paired mode)
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,
        /// Significance level
        #[arg(long)]
        alpha: Option<f64>,
        /// Write JSON results to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show which providers are reachable
    Providers,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Offline statistical calculators
    Stats {
        #[command(subcommand)]
        action: StatsAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create a default config file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum StatsAction {
    /// Wilson score interval for an accuracy
    Wilson {
        correct: i64,
        total: i64,
        #[arg(long, default_value_t = llmeval_stats::DEFAULT_CONFIDENCE)]
        confidence: f64,
    },
    /// Bootstrap interval from per-item outcomes (e.g. "1,0,1,1")
    Bootstrap {
        outcomes: String,
        #[arg(long, default_value_t = llmeval_stats::DEFAULT_CONFIDENCE)]
        confidence: f64,
        #[arg(long, default_value_t = 10_000)]
        resamples: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// McNemar's test from a paired contingency table
    Mcnemar {
        /// Items both models got right
        #[arg(long, default_value_t = 0)]
        both_correct: usize,
        /// Items only model A got right
        #[arg(long)]
        a_only: usize,
        /// Items only model B got right
        #[arg(long)]
        b_only: usize,
        /// Items both models got wrong
        #[arg(long, default_value_t = 0)]
        both_wrong: usize,
        #[arg(long, default_value_t = llmeval_stats::DEFAULT_ALPHA)]
        alpha: f64,
    },
    /// Cohen's h between two proportions
    EffectSize { p1: f64, p2: f64 },
    /// Items per model needed to detect an effect size
    SampleSize {
        effect_size: f64,
        #[arg(long, default_value_t = llmeval_stats::DEFAULT_POWER)]
        power: f64,
        #[arg(long, default_value_t = llmeval_stats::DEFAULT_ALPHA)]
        alpha: f64,
    },
    /// Descriptive statistics over repeated-run accuracies
    Describe {
        #[arg(required = true, num_args = 1..)]
        values: Vec<f64>,
    },
}

/// Command-line overrides applied on top of the layered configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub no_cache: bool,
    /// Backend found by auto-detection; replaces the configured provider.
    pub detected: Option<llmeval_core::DetectedProvider>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "llm-eval", "llm-eval")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "llm-eval.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let overrides = Overrides {
        config: cli.config,
        model: cli.model,
        provider: cli.provider,
        no_cache: cli.no_cache,
        detected: None,
    };
    commands::handle_command(cli.command, &workspace, &overrides).await
}
