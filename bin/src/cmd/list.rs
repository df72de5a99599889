//! List command implementation.

use super::{fmt_metric, truncate};
use anyhow::{Result, bail};
use forja::registry::{FactorRegistry, ListQuery, RegistryEntry, SortKey, Tier};
use forja::RegistryConfig;
use std::path::Path;

/// List registry entries matching the filters.
pub(crate) fn list_factors(
    registry_dir: &Path,
    min_sharpe: Option<f64>,
    max_turnover: Option<f64>,
    tier: Option<&str>,
    sort: &str,
    limit: Option<usize>,
    format: &str,
) -> Result<()> {
    let query = ListQuery {
        min_sharpe,
        max_turnover,
        tier: tier.map(parse_tier).transpose()?,
        sort_by: sort.parse::<SortKey>()?,
        limit,
    };
    let registry = FactorRegistry::open(registry_dir, RegistryConfig::default())?;
    let entries = registry.list(&query);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        "text" => print_table(&registry, &entries),
        other => bail!("Unknown format: {}. Valid options: text, json", other),
    }
    Ok(())
}

pub(crate) fn parse_tier(tier: &str) -> Result<Tier> {
    match tier.to_lowercase().as_str() {
        "moderate" => Ok(Tier::Moderate),
        "high" => Ok(Tier::High),
        other => bail!("Unknown tier: {}. Valid options: moderate, high", other),
    }
}

fn print_table(registry: &FactorRegistry, entries: &[&RegistryEntry]) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Factor Registry                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Registry: {}", registry.dir().display());
    println!(
        "Entries:  {} high, {} moderate\n",
        registry.tier(Tier::High).len(),
        registry.tier(Tier::Moderate).len()
    );

    if entries.is_empty() {
        println!("No entries match.");
        return;
    }

    println!(
        "{:<16} {:<8} {:>9} {:>8} {:>8} {:>9} {:>5}  {}",
        "ID", "Tier", "Fitness", "IC", "Sharpe", "Turnover", "Gen", "Inner expression"
    );
    println!("{}", "─".repeat(110));
    for entry in entries {
        println!(
            "{:<16} {:<8} {:>9} {:>8} {:>8} {:>9} {:>5}  {}",
            entry.id,
            entry.tier,
            fmt_metric(entry.fitness, 3),
            fmt_metric(entry.ic, 4),
            fmt_metric(entry.sharpe, 2),
            fmt_metric(entry.turnover, 1),
            entry.added_at_gen,
            truncate(&entry.inner_expression, 50)
        );
    }
    println!("\nTotal: {} entries", entries.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier() {
        assert_eq!(parse_tier("High").unwrap(), Tier::High);
        assert_eq!(parse_tier("moderate").unwrap(), Tier::Moderate);
        assert!(parse_tier("low").is_err());
    }

    #[test]
    fn test_list_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        list_factors(dir.path(), None, None, None, "fitness", None, "json").unwrap();
        assert!(list_factors(dir.path(), None, None, None, "alpha", None, "text").is_err());
        assert!(list_factors(dir.path(), None, None, None, "fitness", None, "xml").is_err());
    }
}
