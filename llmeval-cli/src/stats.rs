//! Offline statistical calculators for results obtained elsewhere.

use anyhow::{Context, bail};
use llmeval_stats::{
    BootstrapConfig, ContingencyTable, SampleSize, bootstrap_interval, cohens_h, describe,
    mcnemar_from_table, required_sample_size, wilson_interval,
};

use crate::StatsAction;

pub(crate) fn handle_stats(action: StatsAction) -> anyhow::Result<()> {
    match action {
        StatsAction::Wilson {
            correct,
            total,
            confidence,
        } => {
            let ci = wilson_interval(correct, total, confidence)?;
            println!(
                "Accuracy: {:.2}% ({correct}/{total})",
                correct as f64 / total as f64 * 100.0
            );
            println!(
                "{:.0}% Wilson CI: [{:.2}%, {:.2}%] (width {:.2} pp)",
                confidence * 100.0,
                ci.lower * 100.0,
                ci.upper * 100.0,
                ci.width() * 100.0
            );
        }
        StatsAction::Bootstrap {
            outcomes,
            confidence,
            resamples,
            seed,
        } => {
            let outcomes = parse_outcomes(&outcomes)?;
            let config = BootstrapConfig::default()
                .with_confidence(confidence)
                .with_resamples(resamples)
                .with_seed(seed);
            let ci = bootstrap_interval(&outcomes, &config)?;
            let correct = outcomes.iter().filter(|&&o| o).count();
            println!(
                "Accuracy: {:.2}% ({correct}/{})",
                correct as f64 / outcomes.len() as f64 * 100.0,
                outcomes.len()
            );
            println!(
                "{:.0}% bootstrap CI ({resamples} resamples, seed {seed}): [{:.2}%, {:.2}%]",
                confidence * 100.0,
                ci.lower * 100.0,
                ci.upper * 100.0
            );
        }
        StatsAction::Mcnemar {
            both_correct,
            a_only,
            b_only,
            both_wrong,
            alpha,
        } => {
            let table = ContingencyTable {
                both_correct,
                a_only,
                b_only,
                both_wrong,
            };
            let result = mcnemar_from_table(table, alpha)?;
            println!("Chi-squared: {:.4}", result.statistic);
            println!("p-value:     {:.4}", result.p_value);
            println!("{}", result.conclusion);
        }
        StatsAction::EffectSize { p1, p2 } => {
            let effect = cohens_h(p1, p2)?;
            println!("Cohen's h: {:.4}", effect.h);
            println!("{}", effect.interpretation);
        }
        StatsAction::SampleSize {
            effect_size,
            power,
            alpha,
        } => match required_sample_size(effect_size, power, alpha)? {
            SampleSize::PerGroup(n) => println!(
                "{n} items per model to detect h={effect_size} (power {power}, alpha {alpha})"
            ),
            SampleSize::Unbounded => println!("A zero effect cannot be detected by any sample"),
        },
        StatsAction::Describe { values } => {
            let stats = describe(&values);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

/// Parse per-item outcomes such as `"1,0,1"` or `"true false true"`.
pub(crate) fn parse_outcomes(input: &str) -> anyhow::Result<Vec<bool>> {
    let outcomes = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| match token.to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "y" => Ok(true),
            "0" | "false" | "f" | "n" => Ok(false),
            other => bail!("Invalid outcome '{other}', expected 1/0 or true/false"),
        })
        .collect::<anyhow::Result<Vec<bool>>>()
        .context("Failed to parse outcomes")?;
    if outcomes.is_empty() {
        bail!("No outcomes given");
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_outcomes_mixed_separators() {
        assert_eq!(
            parse_outcomes("1,0, true  F").unwrap(),
            vec![true, false, true, false]
        );
    }

    #[test]
    fn test_parse_outcomes_rejects_garbage() {
        assert!(parse_outcomes("1,2").is_err());
        assert!(parse_outcomes(" , ").is_err());
    }

    #[test]
    fn test_handlers_reject_invalid_input() {
        let action = StatsAction::Wilson {
            correct: 5,
            total: 0,
            confidence: 0.95,
        };
        assert!(handle_stats(action).is_err());
        assert!(handle_stats(StatsAction::EffectSize { p1: 1.5, p2: 0.5 }).is_err());
    }

    #[test]
    fn test_handlers_accept_valid_input() {
        assert!(
            handle_stats(StatsAction::Mcnemar {
                both_correct: 70,
                a_only: 20,
                b_only: 5,
                both_wrong: 5,
                alpha: 0.05,
            })
            .is_ok()
        );
        assert!(
            handle_stats(StatsAction::Describe {
                values: vec![0.8, 0.82, 0.85]
            })
            .is_ok()
        );
    }
}
