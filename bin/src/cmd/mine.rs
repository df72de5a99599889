//! Mine command implementation.

use super::{fmt_metric, load_config, truncate};
use crate::data;
use anyhow::{Result, bail};
use forja::eval::EvaluationMode;
use forja::{MiningConfig, MiningSession, RunSummary};
use std::path::PathBuf;

/// Arguments of `forja mine`.
pub(crate) struct MineArgs {
    pub(crate) data: PathBuf,
    pub(crate) config: Option<PathBuf>,
    pub(crate) output: PathBuf,
    pub(crate) registry: Option<PathBuf>,
    pub(crate) label: Option<String>,
    pub(crate) generations: Option<usize>,
    pub(crate) population: Option<usize>,
    pub(crate) seed: Option<u64>,
    pub(crate) mode: Option<String>,
}

/// Run a mining session and print its summary.
pub(crate) fn run_mine(args: MineArgs) -> Result<()> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Factor Mining                           ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let config = resolve_config(&args)?;
    let panel = data::load_panel(&args.data)?;
    let (rows, assets) = panel.shape();

    println!("Data:        {}", args.data.display());
    println!("Panel:       {} timestamps x {} assets", rows, assets);
    println!("Features:    {}", panel.column_names().join(", "));
    println!(
        "Population:  {} for {} generations",
        config.evolution.population_size, config.evolution.generations
    );
    println!("Output:      {}", args.output.display());
    if let Some(registry) = &args.registry {
        println!("Registry:    {}", registry.display());
    }
    println!();

    let mut session = MiningSession::new(panel, config)?.with_checkpoint_dir(&args.output);
    if let Some(registry) = &args.registry {
        session = session.with_registry_dir(registry);
    }
    if let Some(label) = &args.label {
        session = session.with_label(label);
    }

    let summary = session.run()?;
    print_summary(&summary);
    Ok(())
}

/// Apply command-line overrides on top of the configuration file.
fn resolve_config(args: &MineArgs) -> Result<MiningConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(generations) = args.generations {
        config.evolution.generations = generations;
    }
    if let Some(population) = args.population {
        config.evolution.population_size = population;
    }
    if let Some(seed) = args.seed {
        config.evolution.seed = Some(seed);
    }
    if let Some(mode) = &args.mode {
        config.fitness.mode = parse_mode(mode)?;
    }
    config.validate()?;
    Ok(config)
}

fn parse_mode(mode: &str) -> Result<EvaluationMode> {
    match mode.to_lowercase().as_str() {
        "ic" => Ok(EvaluationMode::Ic),
        "portfolio" => Ok(EvaluationMode::Portfolio),
        other => bail!("Unknown mode: {}. Valid options: ic, portfolio", other),
    }
}

fn print_summary(summary: &RunSummary) {
    let result = &summary.result;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("RESULT");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!("Termination:   {:?}", result.termination);
    println!("Generations:   {}", result.history.len());
    println!("Evaluations:   {}", result.total_evaluations);
    println!("Runtime:       {:.1}s", result.runtime_secs);
    println!("Promoted:      {}", summary.promoted);
    if result.dimension_fallbacks > 0 {
        println!("Dim fallbacks: {}", result.dimension_fallbacks);
    }
    println!();

    match (&result.best_expression, &result.best) {
        (Some(expression), Some(best)) => {
            println!("Best factor:   {}", expression);
            println!("  Fitness:     {:.4}", best.fitness);
            println!("  IC:          {:.4}", best.ic);
            println!("  Rank IC:     {:.4}", best.rank_ic);
            println!("  IC IR:       {:.4}", best.ic_ir);
            println!("  Coverage:    {:.1}%", best.coverage * 100.0);
            if let Some(sharpe) = best.sharpe {
                println!("  Sharpe:      {:.2}", sharpe);
            }
        }
        _ => println!("No valid factor found."),
    }

    if result.top.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<4} {:>10} {:>8} {:>8} {:>8}  {}",
        "#", "Fitness", "IC", "RankIC", "Sharpe", "Expression"
    );
    println!("{}", "─".repeat(100));
    for (i, factor) in result.top.iter().enumerate() {
        let r = &factor.result;
        println!(
            "{:<4} {:>10.4} {:>8.4} {:>8.4} {:>8}  {}",
            i + 1,
            r.fitness,
            r.ic,
            r.rank_ic,
            fmt_metric(r.sharpe, 2),
            truncate(&factor.expression, 60)
        );
    }
}
