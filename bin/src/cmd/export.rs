//! Export command implementation.

use crate::data;
use anyhow::{Context, Result, bail};
use forja::expr::{DimensionTracker, PrimitiveSet, RegistryOptions, parse_expr};
use forja::ops::OperatorLibrary;
use forja::registry::FactorRegistry;
use forja::traits::{CLOSE_COLUMN, RETURN_COLUMN};
use forja::{FactorDefinition, RegistryConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Export a registry entry or an expression as a factor definition.
///
/// Without `data_path`, every column the expression names is taken to exist.
pub(crate) fn export_factor(
    factor: &str,
    registry_dir: &Path,
    name: Option<String>,
    format: &str,
    output: Option<&Path>,
    data_path: Option<&Path>,
) -> Result<()> {
    let (expression, default_name) = resolve(factor, registry_dir)?;
    let name = name.unwrap_or(default_name);

    let columns = match data_path {
        Some(path) => data::load_panel(path)?.column_names(),
        None => assumed_columns(&expression)?,
    };
    let primitives = PrimitiveSet::build(
        &columns,
        &OperatorLibrary::with_defaults(),
        &RegistryOptions::default(),
    )?;
    let definition =
        FactorDefinition::from_expression(name, &expression, &DimensionTracker::default(), &primitives)?;

    let rendered = match format {
        "json" => definition.to_json()?,
        "rust" => definition.render_rust(),
        other => bail!("Unknown format: {}. Valid options: json, rust", other),
    };

    match output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} to {}", definition.name, path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Expression text and default name for a registry id or raw expression.
fn resolve(factor: &str, registry_dir: &Path) -> Result<(String, String)> {
    if registry_dir.exists() {
        let registry = FactorRegistry::open(registry_dir, RegistryConfig::default())?;
        if let Some(entry) = registry.get(factor) {
            return Ok((entry.expression.clone(), format!("factor_{}", entry.id)));
        }
    }
    Ok((factor.to_string(), "factor".to_string()))
}

fn assumed_columns(expression: &str) -> Result<Vec<String>> {
    let expr = parse_expr(expression)?;
    let mut columns: BTreeSet<String> = expr.columns().into_iter().map(str::to_string).collect();
    columns.insert(CLOSE_COLUMN.to_string());
    columns.insert(RETURN_COLUMN.to_string());
    Ok(columns.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_expression_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("factor.json");
        export_factor(
            "div(Close, ts_mean(Close, 10))",
            &dir.path().join("missing"),
            Some("mean_reversion".into()),
            "json",
            Some(&out),
            None,
        )
        .unwrap();

        let definition = FactorDefinition::from_json(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(definition.name, "mean_reversion");
        assert_eq!(definition.inner_expression.to_string(), "div(Close, ts_mean(Close, 10))");
    }

    #[test]
    fn test_export_rust() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("factor.rs");
        export_factor("ts_delta(Volume, 5)", dir.path(), None, "rust", Some(&out), None).unwrap();
        let code = fs::read_to_string(&out).unwrap();
        assert!(code.contains("pub const NAME: &str = \"factor\";"));
        assert!(code.contains("pub const INPUTS: &[&str] = &[\"Volume\"];"));
    }

    #[test]
    fn test_export_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_factor("abs(Close)", dir.path(), None, "yaml", None, None).is_err());
    }

    #[test]
    fn test_assumed_columns() {
        assert_eq!(assumed_columns("abs(Volume)").unwrap(), vec!["Close", "Volume", "return"]);
    }
}
