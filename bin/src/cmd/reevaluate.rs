//! Reevaluate command implementation.

use super::{fmt_metric, load_config, truncate};
use crate::data;
use anyhow::Result;
use forja::eval::FitnessEvaluator;
use forja::evolve::FactorFitness;
use forja::registry::{FactorRegistry, ListQuery, hashed_normalization};
use std::path::Path;
use std::sync::Arc;

/// Re-score every registry entry against the panel in `data_path`.
pub(crate) fn reevaluate(
    data_path: &Path,
    registry_dir: &Path,
    config: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Factor Re-evaluation                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let config = load_config(config)?;
    let registry = FactorRegistry::open(registry_dir, config.registry.clone())?;
    if registry.is_empty() {
        println!("Registry {} is empty.", registry_dir.display());
        return Ok(());
    }

    let panel = data::load_panel(data_path)?;
    let fitness = FactorFitness::new(Arc::new(panel), FitnessEvaluator::new(config.fitness)?)?
        .with_normalization(Some(hashed_normalization(config.registry.clip_range)));

    let entries = registry.list(&ListQuery::default());
    let expressions: Vec<String> = entries.iter().map(|e| e.expression.clone()).collect();
    println!("Scoring {} entries against {}\n", expressions.len(), data_path.display());

    let mut rows: Vec<_> = entries
        .iter()
        .zip(fitness.reevaluate(&expressions))
        .map(|(entry, (_, result))| (*entry, result))
        .collect();
    rows.sort_by(|a, b| b.1.fitness.total_cmp(&a.1.fitness));

    println!(
        "{:<16} {:>9} {:>9} {:>8} {:>8} {:>6}  {}",
        "ID", "Stored", "Fitness", "IC", "Sharpe", "Valid", "Inner expression"
    );
    println!("{}", "─".repeat(110));
    for (entry, result) in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:<16} {:>9} {:>9.3} {:>8.4} {:>8} {:>6}  {}",
            entry.id,
            fmt_metric(entry.fitness, 3),
            result.fitness,
            result.ic,
            fmt_metric(result.sharpe, 2),
            if result.valid { "yes" } else { "no" },
            truncate(&entry.inner_expression, 50)
        );
    }

    let valid = rows.iter().filter(|(_, r)| r.valid).count();
    println!("\nValid on new data: {} of {}", valid, rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::write_sample_csv;
    use forja::RegistryConfig;
    use std::fs;

    #[test]
    fn test_reevaluate_imported_entries() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("panel.csv");
        write_sample_csv(&csv, 150, 4);

        let registry_dir = dir.path().join("registry");
        let candidates = dir.path().join("candidates.json");
        fs::write(
            &candidates,
            r#"[{"expression": "Volume", "fitness": 20.0}, {"expression": "ts_mean(Close, 5)"}]"#,
        )
        .unwrap();
        let mut registry = FactorRegistry::open(&registry_dir, RegistryConfig::default()).unwrap();
        assert_eq!(registry.import_external(&candidates, None, None).unwrap(), 2);

        reevaluate(&csv, &registry_dir, None, Some(1)).unwrap();
    }

    #[test]
    fn test_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        reevaluate(&dir.path().join("absent.csv"), dir.path(), None, None).unwrap();
    }
}
