//! Import command implementation.

use anyhow::Result;
use forja::registry::{FactorRegistry, Tier};
use forja::RegistryConfig;
use std::path::Path;

/// Import external candidates into the registry.
pub(crate) fn import_candidates(
    file: &Path,
    registry_dir: &Path,
    min_sharpe: Option<f64>,
    max_turnover: Option<f64>,
) -> Result<()> {
    let mut registry = FactorRegistry::open(registry_dir, RegistryConfig::default())?;
    let before = registry.len();
    let added = registry.import_external(file, min_sharpe, max_turnover)?;

    println!("Imported {} of the candidates in {}", added, file.display());
    println!(
        "Registry now holds {} entries ({} high, {} moderate), was {}",
        registry.len(),
        registry.tier(Tier::High).len(),
        registry.tier(Tier::Moderate).len(),
        before
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_import_then_reimport() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("candidates.json");
        fs::write(
            &file,
            r#"[
                {"expression": "ts_mean(Close, 10)", "fitness": 12.0, "sharpe": 1.2},
                {"expression": "abs(Volume)", "sharpe": 0.1}
            ]"#,
        )
        .unwrap();
        let registry_dir = dir.path().join("registry");

        import_candidates(&file, &registry_dir, Some(0.5), None).unwrap();
        import_candidates(&file, &registry_dir, Some(0.5), None).unwrap();

        let registry = FactorRegistry::open(&registry_dir, RegistryConfig::default()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tier(Tier::High).len(), 1);
    }
}
