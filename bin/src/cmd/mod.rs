//! CLI subcommand modules.
//!
//! This module contains the implementations for all forja CLI subcommands.

pub(crate) mod export;
pub(crate) mod import;
pub(crate) mod list;
pub(crate) mod mine;
pub(crate) mod operators;
pub(crate) mod reevaluate;

use anyhow::Result;
use forja::MiningConfig;
use std::path::Path;

/// Load a configuration file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<MiningConfig> {
    match path {
        Some(path) => MiningConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e)),
        None => Ok(MiningConfig::default()),
    }
}

/// Format an optional metric for a table cell.
pub(crate) fn fmt_metric(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

/// Shorten an expression to `width` characters.
pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_metric() {
        assert_eq!(fmt_metric(Some(1.23456), 2), "1.23");
        assert_eq!(fmt_metric(None, 2), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abs(Close)", 20), "abs(Close)");
        assert_eq!(truncate("ts_mean(Close, 10)", 10), "ts_mean...");
    }

    #[test]
    fn test_load_config_default() {
        assert_eq!(load_config(None).unwrap(), MiningConfig::default());
    }
}
