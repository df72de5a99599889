//! Tiered, append-only factor registry.
//!
//! Entries live in two JSON arrays, `factors_moderate.json` and
//! `factors_high.json`. An expression appears at most once across both
//! tiers and across every run that shares the directory.

use crate::io::{read_json, write_json_atomic};
use crate::normalize::{DEFAULT_CLIP_RANGE, Normalized};
use forja_eval::FitnessResult;
use forja_expr::{Expr, parse_expr};
use forja_traits::{ForjaError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Quality tier of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Fitness at or above the moderate threshold.
    Moderate,
    /// Fitness at or above the high threshold.
    High,
}

impl Tier {
    /// File holding the tier.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Moderate => "factors_moderate.json",
            Self::High => "factors_high.json",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moderate => f.pad("moderate"),
            Self::High => f.pad("high"),
        }
    }
}

/// Promotion thresholds and wrapper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Minimum fitness for the moderate tier.
    pub moderate_threshold: f64,
    /// Minimum fitness for the high tier.
    pub high_threshold: f64,
    /// Clip bound of the normalization wrapper.
    pub clip_range: f64,
    /// Hall-of-fame members written per checkpoint.
    pub checkpoint_top_n: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            moderate_threshold: 5.0,
            high_threshold: 10.0,
            clip_range: DEFAULT_CLIP_RANGE,
            checkpoint_top_n: 20,
        }
    }
}

impl RegistryConfig {
    /// Checks threshold ordering and the clip bound.
    pub fn validate(&self) -> Result<()> {
        if !self.moderate_threshold.is_finite() || !self.high_threshold.is_finite() {
            return Err(ForjaError::InvalidConfig("tier thresholds must be finite".into()));
        }
        if self.high_threshold < self.moderate_threshold {
            return Err(ForjaError::InvalidConfig(
                "high_threshold cannot be below moderate_threshold".into(),
            ));
        }
        if !self.clip_range.is_finite() || self.clip_range <= 0.0 {
            return Err(ForjaError::InvalidConfig("clip_range must be positive".into()));
        }
        Ok(())
    }

    /// Tier a fitness qualifies for.
    pub fn tier_for(&self, fitness: f64) -> Option<Tier> {
        if fitness >= self.high_threshold {
            Some(Tier::High)
        } else if fitness >= self.moderate_threshold {
            Some(Tier::Moderate)
        } else {
            None
        }
    }
}

/// A promoted factor. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// First 16 hex characters of the SHA-256 of `expression`.
    pub id: String,
    /// Full expression including the normalization wrapper.
    pub expression: String,
    /// Expression inside the wrapper.
    pub inner_expression: String,
    /// Z-score window of the wrapper.
    pub normalize_window: usize,
    /// Clip bound of the wrapper.
    pub clip_range: f64,
    /// Scalar fitness at promotion.
    pub fitness: Option<f64>,
    /// Mean IC.
    pub ic: Option<f64>,
    /// Mean rank-IC.
    pub rank_ic: Option<f64>,
    /// IC information ratio.
    pub ic_ir: Option<f64>,
    /// Annualized Sharpe ratio.
    pub sharpe: Option<f64>,
    /// Compounded total return.
    pub returns: Option<f64>,
    /// Annualized turnover.
    pub turnover: Option<f64>,
    /// Maximum drawdown.
    pub max_drawdown: Option<f64>,
    /// Fraction of long cells.
    pub long_ratio: Option<f64>,
    /// Fraction of short cells.
    pub short_ratio: Option<f64>,
    /// Raw coverage.
    pub coverage: Option<f64>,
    /// Whether the score was valid.
    pub valid: bool,
    /// Tier the entry lives in.
    pub tier: Tier,
    /// Generation of first promotion.
    pub added_at_gen: usize,
    /// Run that promoted the entry.
    pub source_run: String,
}

/// Registry id of a full expression.
pub fn entry_id(expression: &str) -> String {
    let digest = Sha256::digest(expression.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Orderings for [`FactorRegistry::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Fitness, descending.
    #[default]
    Fitness,
    /// Sharpe ratio, descending.
    Sharpe,
    /// Mean IC, descending.
    Ic,
    /// Turnover, ascending.
    Turnover,
    /// Promotion generation, ascending.
    AddedAt,
}

impl std::str::FromStr for SortKey {
    type Err = ForjaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fitness" => Ok(Self::Fitness),
            "sharpe" => Ok(Self::Sharpe),
            "ic" => Ok(Self::Ic),
            "turnover" => Ok(Self::Turnover),
            "added_at" | "added_at_gen" => Ok(Self::AddedAt),
            other => Err(ForjaError::InvalidConfig(format!("unknown sort key {other}"))),
        }
    }
}

/// Filter and ordering for [`FactorRegistry::list`].
///
/// Entries without the metric a bound refers to are excluded by that bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Minimum Sharpe ratio.
    pub min_sharpe: Option<f64>,
    /// Maximum turnover.
    pub max_turnover: Option<f64>,
    /// Restrict to one tier.
    pub tier: Option<Tier>,
    /// Ordering.
    pub sort_by: SortKey,
    /// Maximum number of entries.
    pub limit: Option<usize>,
}

impl ListQuery {
    fn matches(&self, entry: &RegistryEntry) -> bool {
        let sharpe_ok = self
            .min_sharpe
            .is_none_or(|min| entry.sharpe.is_some_and(|s| s >= min));
        let turnover_ok = self
            .max_turnover
            .is_none_or(|max| entry.turnover.is_some_and(|t| t <= max));
        let tier_ok = self.tier.is_none_or(|tier| entry.tier == tier);
        sharpe_ok && turnover_ok && tier_ok
    }

    fn compare(&self, a: &RegistryEntry, b: &RegistryEntry) -> Ordering {
        let descending = |x: Option<f64>, y: Option<f64>| {
            let key = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(f64::NEG_INFINITY);
            key(y).total_cmp(&key(x))
        };
        match self.sort_by {
            SortKey::Fitness => descending(a.fitness, b.fitness),
            SortKey::Sharpe => descending(a.sharpe, b.sharpe),
            SortKey::Ic => descending(a.ic, b.ic),
            SortKey::Turnover => {
                let key = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(f64::INFINITY);
                key(a.turnover).total_cmp(&key(b.turnover))
            }
            SortKey::AddedAt => a.added_at_gen.cmp(&b.added_at_gen),
        }
    }
}

/// A candidate produced outside this registry.
#[derive(Debug, Clone, Deserialize)]
struct ExternalCandidate {
    expression: String,
    #[serde(default)]
    fitness: Option<f64>,
    #[serde(default)]
    ic: Option<f64>,
    #[serde(default)]
    rank_ic: Option<f64>,
    #[serde(default)]
    ic_ir: Option<f64>,
    #[serde(default)]
    sharpe: Option<f64>,
    #[serde(default, alias = "total_return")]
    returns: Option<f64>,
    #[serde(default)]
    turnover: Option<f64>,
    #[serde(default)]
    max_drawdown: Option<f64>,
    #[serde(default)]
    long_ratio: Option<f64>,
    #[serde(default)]
    short_ratio: Option<f64>,
    #[serde(default)]
    coverage: Option<f64>,
    #[serde(default)]
    added_at_gen: Option<usize>,
    #[serde(default)]
    source_run: Option<String>,
}

/// The on-disk registry.
#[derive(Debug)]
pub struct FactorRegistry {
    dir: PathBuf,
    config: RegistryConfig,
    run_id: String,
    moderate: Vec<RegistryEntry>,
    high: Vec<RegistryEntry>,
    known: HashSet<String>,
}

impl FactorRegistry {
    /// Opens the registry in `dir`, loading existing tier files.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or unreadable tier files.
    pub fn open(dir: impl Into<PathBuf>, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let load = |tier: Tier| -> Result<Vec<RegistryEntry>> {
            let path = dir.join(tier.file_name());
            if path.exists() { read_json(&path) } else { Ok(Vec::new()) }
        };
        let moderate = load(Tier::Moderate)?;
        let high = load(Tier::High)?;
        let known = moderate
            .iter()
            .chain(&high)
            .map(|e| e.expression.clone())
            .collect();

        debug!(dir = %dir.display(), moderate = moderate.len(), high = high.len(), "opened factor registry");
        Ok(Self {
            dir,
            config,
            run_id: format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")),
            moderate,
            high,
            known,
        })
    }

    /// Sets the identifier recorded as `source_run`.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// The registry directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The configuration.
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Identifier recorded for entries promoted by this handle.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of entries across both tiers.
    pub fn len(&self) -> usize {
        self.moderate.len() + self.high.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a full expression is already registered.
    pub fn contains(&self, expression: &str) -> bool {
        self.known.contains(expression)
    }

    /// Entries of one tier, in insertion order.
    pub fn tier(&self, tier: Tier) -> &[RegistryEntry] {
        match tier {
            Tier::Moderate => &self.moderate,
            Tier::High => &self.high,
        }
    }

    /// Looks an entry up by id.
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.moderate.iter().chain(&self.high).find(|e| e.id == id)
    }

    /// Promotes a scored inner expression.
    ///
    /// Returns the tier it was written to, or `None` when the result is
    /// invalid, below the moderate threshold, or already registered.
    ///
    /// # Errors
    ///
    /// Fails when the tier file cannot be written.
    pub fn promote(
        &mut self,
        inner: &Expr,
        result: &FitnessResult,
        generation: usize,
    ) -> Result<Option<Tier>> {
        if !result.valid || !result.fitness.is_finite() {
            return Ok(None);
        }
        let Some(tier) = self.config.tier_for(result.fitness) else {
            return Ok(None);
        };
        let normalized = Normalized::from_inner(inner, self.config.clip_range);
        if self.known.contains(&normalized.expression) {
            return Ok(None);
        }

        let entry = RegistryEntry {
            id: entry_id(&normalized.expression),
            expression: normalized.expression,
            inner_expression: normalized.inner_expression,
            normalize_window: normalized.spec.window,
            clip_range: normalized.spec.clip_range,
            fitness: Some(result.fitness),
            ic: Some(result.ic),
            rank_ic: Some(result.rank_ic),
            ic_ir: Some(result.ic_ir),
            sharpe: result.sharpe,
            returns: result.total_return,
            turnover: result.turnover,
            max_drawdown: result.max_drawdown,
            long_ratio: result.long_ratio,
            short_ratio: result.short_ratio,
            coverage: Some(result.coverage),
            valid: true,
            tier,
            added_at_gen: generation,
            source_run: self.run_id.clone(),
        };
        let (id, expression) = (entry.id.clone(), entry.expression.clone());
        self.commit(vec![entry])?;
        info!(%id, %tier, fitness = result.fitness, %expression, "promoted factor");
        Ok(Some(tier))
    }

    /// Merges a JSON array of externally produced candidates.
    ///
    /// Each candidate needs an `expression`, full or inner, and may carry
    /// metrics. Candidates below `min_sharpe`, above `max_turnover`, with a
    /// fitness under the moderate threshold, or already registered are
    /// skipped; unparseable ones are skipped with a warning. Candidates
    /// without a fitness go to the moderate tier.
    ///
    /// Returns the number of entries added.
    ///
    /// # Errors
    ///
    /// Fails when the file is not a JSON array or a tier file cannot be
    /// written.
    pub fn import_external(
        &mut self,
        path: &Path,
        min_sharpe: Option<f64>,
        max_turnover: Option<f64>,
    ) -> Result<usize> {
        let raw: Vec<serde_json::Value> = read_json(path)?;
        let default_source = format!(
            "external:{}",
            path.file_name().map_or_else(
                || path.display().to_string(),
                |name| name.to_string_lossy().into_owned()
            )
        );

        let mut staged: Vec<RegistryEntry> = Vec::new();
        let mut seen = HashSet::new();
        for (position, value) in raw.into_iter().enumerate() {
            let candidate: ExternalCandidate = match serde_json::from_value(value) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(position, error = %e, "skipping malformed external candidate");
                    continue;
                }
            };
            let expr = match parse_expr(&candidate.expression) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!(position, expression = %candidate.expression, error = %e, "skipping unparseable external candidate");
                    continue;
                }
            };

            if min_sharpe.is_some_and(|min| candidate.sharpe.is_none_or(|s| s < min))
                || max_turnover.is_some_and(|max| candidate.turnover.is_none_or(|t| t > max))
            {
                continue;
            }
            let tier = match candidate.fitness {
                Some(fitness) => match self.config.tier_for(fitness) {
                    Some(tier) => tier,
                    None => continue,
                },
                None => Tier::Moderate,
            };

            let normalized = Normalized::from_any(&expr, self.config.clip_range);
            if self.known.contains(&normalized.expression)
                || !seen.insert(normalized.expression.clone())
            {
                continue;
            }
            staged.push(RegistryEntry {
                id: entry_id(&normalized.expression),
                expression: normalized.expression,
                inner_expression: normalized.inner_expression,
                normalize_window: normalized.spec.window,
                clip_range: normalized.spec.clip_range,
                fitness: candidate.fitness,
                ic: candidate.ic,
                rank_ic: candidate.rank_ic,
                ic_ir: candidate.ic_ir,
                sharpe: candidate.sharpe,
                returns: candidate.returns,
                turnover: candidate.turnover,
                max_drawdown: candidate.max_drawdown,
                long_ratio: candidate.long_ratio,
                short_ratio: candidate.short_ratio,
                coverage: candidate.coverage,
                valid: true,
                tier,
                added_at_gen: candidate.added_at_gen.unwrap_or(0),
                source_run: candidate
                    .source_run
                    .unwrap_or_else(|| default_source.clone()),
            });
        }

        let added = staged.len();
        self.commit(staged)?;
        info!(path = %path.display(), added, "imported external candidates");
        Ok(added)
    }

    /// Entries matching `query`, ordered and truncated as requested.
    pub fn list(&self, query: &ListQuery) -> Vec<&RegistryEntry> {
        let mut entries: Vec<&RegistryEntry> = self
            .moderate
            .iter()
            .chain(&self.high)
            .filter(|e| query.matches(e))
            .collect();
        entries.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        entries
    }

    /// Writes each tier with its new entries, then records them in memory.
    ///
    /// A tier whose write fails keeps none of its new entries, so a later
    /// promotion of the same expression retries the write.
    fn commit(&mut self, entries: Vec<RegistryEntry>) -> Result<()> {
        let (high, moderate): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.tier == Tier::High);
        for (tier, fresh) in [(Tier::Moderate, moderate), (Tier::High, high)] {
            if fresh.is_empty() {
                continue;
            }
            let mut next = self.tier(tier).to_vec();
            next.extend(fresh.iter().cloned());
            write_json_atomic(&self.dir.join(tier.file_name()), &next)?;

            self.known.extend(fresh.iter().map(|e| e.expression.clone()));
            match tier {
                Tier::Moderate => self.moderate = next,
                Tier::High => self.high = next,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::tests::valid_result;
    use std::fs;

    fn registry(dir: &Path) -> FactorRegistry {
        FactorRegistry::open(dir, RegistryConfig::default())
            .unwrap()
            .with_run_id("test_run")
    }

    #[test]
    fn test_tiers() {
        let config = RegistryConfig::default();
        assert_eq!(config.tier_for(12.0), Some(Tier::High));
        assert_eq!(config.tier_for(5.0), Some(Tier::Moderate));
        assert_eq!(config.tier_for(4.9), None);

        let bad = RegistryConfig {
            high_threshold: 1.0,
            moderate_threshold: 2.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_promote_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        let inner = parse_expr("ts_mean(Close, 10)").unwrap();

        assert_eq!(reg.promote(&inner, &valid_result(12.0), 3).unwrap(), Some(Tier::High));
        assert_eq!(reg.promote(&inner, &valid_result(12.0), 4).unwrap(), None);
        assert_eq!(reg.promote(&inner, &valid_result(6.0), 5).unwrap(), None);
        assert_eq!(reg.len(), 1);

        let entry = &reg.tier(Tier::High)[0];
        assert_eq!(entry.id, entry_id(&entry.expression));
        assert_eq!(entry.id.len(), 16);
        assert_eq!(entry.added_at_gen, 3);
        assert_eq!(entry.source_run, "test_run");
        assert!(dir.path().join("factors_high.json").exists());
        assert!(!dir.path().join("factors_moderate.json").exists());
    }

    #[test]
    fn test_failed_write_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        let inner = parse_expr("ts_std(Close, 20)").unwrap();

        // A directory where the temporary tier file goes makes the write fail.
        let blocker = dir.path().join("factors_high.json.tmp");
        fs::create_dir(&blocker).unwrap();
        assert!(reg.promote(&inner, &valid_result(15.0), 2).is_err());
        assert!(reg.is_empty());
        assert!(!dir.path().join("factors_high.json").exists());

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(reg.promote(&inner, &valid_result(15.0), 3).unwrap(), Some(Tier::High));
        let stored: Vec<RegistryEntry> = read_json(&dir.path().join("factors_high.json")).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].added_at_gen, 3);
        assert!(reg.contains(&stored[0].expression));
    }

    #[test]
    fn test_failed_import_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = dir.path().join("candidates.json");
        fs::write(&candidates, r#"[{"expression": "abs(Close)"}, {"expression": "abs(Close)"}]"#).unwrap();
        let mut reg = registry(&dir.path().join("registry"));

        let blocker = dir.path().join("registry").join("factors_moderate.json.tmp");
        fs::create_dir(&blocker).unwrap();
        assert!(reg.import_external(&candidates, None, None).is_err());
        assert!(reg.is_empty());

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(reg.import_external(&candidates, None, None).unwrap(), 1);
        assert_eq!(reg.tier(Tier::Moderate).len(), 1);
    }

    #[test]
    fn test_dedup_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let inner = parse_expr("div(Close, ts_mean(Close, 20))").unwrap();

        let mut first = registry(dir.path());
        first.promote(&inner, &valid_result(6.0), 1).unwrap();
        let expression = first.tier(Tier::Moderate)[0].expression.clone();

        let mut second = FactorRegistry::open(dir.path(), RegistryConfig::default())
            .unwrap()
            .with_run_id("another_run");
        assert!(second.contains(&expression));
        assert_eq!(second.promote(&inner, &valid_result(20.0), 9).unwrap(), None);
        assert_eq!(second.len(), 1);

        let stored: Vec<RegistryEntry> =
            read_json(&dir.path().join(Tier::Moderate.file_name())).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].expression, expression);
    }

    #[test]
    fn test_rejects_weak_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        let inner = parse_expr("abs(Volume)").unwrap();
        assert_eq!(reg.promote(&inner, &valid_result(1.0), 0).unwrap(), None);
        assert_eq!(reg.promote(&inner, &FitnessResult::invalid(50.0, "bad", 0.0), 0).unwrap(), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_import_external() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        reg.promote(&parse_expr("abs(Volume)").unwrap(), &valid_result(6.0), 0).unwrap();

        let path = dir.path().join("batch.json");
        fs::write(
            &path,
            r#"[
                {"expression": "ts_mean(Close, 5)", "sharpe": 1.2, "turnover": 30.0, "fitness": 11.0},
                {"expression": "sanitize(clip(ts_zscore(sanitize(Close), 20), 3.0))", "sharpe": 0.8, "turnover": 10.0},
                {"expression": "abs(Volume)", "sharpe": 2.0, "turnover": 5.0},
                {"expression": "ts_mean(Close,", "sharpe": 2.0, "turnover": 5.0},
                {"expression": "neg(Close)", "sharpe": 0.1, "turnover": 5.0},
                {"expression": "neg(Volume)", "sharpe": 1.0, "turnover": 500.0},
                {"sharpe": 3.0}
            ]"#,
        )
        .unwrap();

        let added = reg.import_external(&path, Some(0.5), Some(100.0)).unwrap();
        assert_eq!(added, 2);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.tier(Tier::High).len(), 1);

        let wrapped = reg
            .tier(Tier::Moderate)
            .iter()
            .find(|e| e.inner_expression == "Close")
            .unwrap();
        assert_eq!(wrapped.normalize_window, 20);
        assert_eq!(wrapped.source_run, "external:batch.json");

        assert_eq!(reg.import_external(&path, Some(0.5), Some(100.0)).unwrap(), 0);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        for (text, fitness, sharpe, turnover) in [
            ("abs(Volume)", 6.0, 0.5, 10.0),
            ("ts_mean(Close, 10)", 12.0, 2.0, 80.0),
            ("neg(Close)", 8.0, 1.0, 20.0),
        ] {
            let result = FitnessResult {
                sharpe: Some(sharpe),
                turnover: Some(turnover),
                ..valid_result(fitness)
            };
            reg.promote(&parse_expr(text).unwrap(), &result, 0).unwrap();
        }

        let all = reg.list(&ListQuery::default());
        let fitness: Vec<f64> = all.iter().filter_map(|e| e.fitness).collect();
        assert_eq!(fitness, vec![12.0, 8.0, 6.0]);

        let query = ListQuery {
            min_sharpe: Some(0.8),
            max_turnover: Some(50.0),
            ..Default::default()
        };
        let filtered = reg.list(&query);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].inner_expression, "neg(Close)");

        let by_turnover = reg.list(&ListQuery {
            sort_by: SortKey::Turnover,
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(by_turnover.len(), 2);
        assert_eq!(by_turnover[0].turnover, Some(10.0));

        let high = reg.list(&ListQuery {
            tier: Some(Tier::High),
            ..Default::default()
        });
        assert_eq!(high.len(), 1);
        assert_eq!("sharpe".parse::<SortKey>().unwrap(), SortKey::Sharpe);
    }
}
