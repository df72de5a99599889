//! Per-generation checkpoints and the final run result.

use crate::io::{read_json, write_json_atomic};
use crate::normalize::Normalized;
use forja_eval::FitnessResult;
use forja_evolve::{GenerationStats, MiningResult, RankedFactor, Snapshot};
use forja_expr::parse_expr;
use forja_traits::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CHECKPOINT_PREFIX: &str = "checkpoint_gen_";
/// File name of the final result.
pub const FINAL_RESULT_FILE: &str = "final_result.json";

/// One hall-of-fame member as stored in a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFactor {
    /// Full expression including the normalization wrapper.
    pub expression: String,
    /// Expression the search produced.
    pub inner_expression: String,
    /// Z-score window of the wrapper.
    pub normalize_window: usize,
    /// Clip bound of the wrapper.
    pub clip_range: f64,
    /// Scalar fitness.
    pub fitness: f64,
    /// Mean IC.
    pub ic: f64,
    /// Mean rank-IC.
    pub rank_ic: f64,
    /// Annualized Sharpe ratio.
    pub sharpe: Option<f64>,
    /// Compounded total return.
    pub returns: Option<f64>,
    /// Annualized turnover.
    pub turnover: Option<f64>,
    /// Fraction of long cells.
    pub long_ratio: Option<f64>,
    /// Fraction of short cells.
    pub short_ratio: Option<f64>,
    /// Raw coverage.
    pub coverage: f64,
    /// Whether the score was valid.
    pub valid: bool,
}

impl CheckpointFactor {
    /// Builds the stored form of a ranked factor. Unparseable expressions
    /// are stored without a wrapper.
    pub fn from_ranked(factor: &RankedFactor, clip_range: f64) -> Self {
        let (expression, inner_expression, normalize_window, clip_range) =
            match parse_expr(&factor.expression) {
                Ok(expr) => {
                    let n = Normalized::from_any(&expr, clip_range);
                    (n.expression, n.inner_expression, n.spec.window, n.spec.clip_range)
                }
                Err(e) => {
                    debug!(expression = %factor.expression, error = %e, "storing unparsed expression");
                    (factor.expression.clone(), factor.expression.clone(), 0, clip_range)
                }
            };
        let r: &FitnessResult = &factor.result;
        Self {
            expression,
            inner_expression,
            normalize_window,
            clip_range,
            fitness: r.fitness,
            ic: r.ic,
            rank_ic: r.rank_ic,
            sharpe: r.sharpe,
            returns: r.total_return,
            turnover: r.turnover,
            long_ratio: r.long_ratio,
            short_ratio: r.short_ratio,
            coverage: r.coverage,
            valid: r.valid,
        }
    }
}

/// Contents of a `checkpoint_gen_NNNN.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last completed generation.
    pub generation: usize,
    /// Fitness evaluations so far.
    pub total_evaluations: usize,
    /// Best fitness so far.
    pub best_fitness: Option<f64>,
    /// Best hall-of-fame members.
    pub top_factors: Vec<CheckpointFactor>,
    /// Stats of every generation so far.
    pub fitness_history: Vec<GenerationStats>,
}

impl Checkpoint {
    /// Builds a checkpoint keeping the best `top_n` members.
    pub fn from_snapshot(snapshot: &Snapshot, top_n: usize, clip_range: f64) -> Self {
        Self {
            generation: snapshot.generation,
            total_evaluations: snapshot.total_evaluations,
            best_fitness: snapshot.best_fitness,
            top_factors: snapshot
                .hall_of_fame
                .iter()
                .take(top_n)
                .map(|f| CheckpointFactor::from_ranked(f, clip_range))
                .collect(),
            fitness_history: snapshot.history.clone(),
        }
    }
}

/// Directory of checkpoint files for one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint for `generation`.
    pub fn path_for(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("{CHECKPOINT_PREFIX}{generation:04}.json"))
    }

    /// Writes a checkpoint, replacing any earlier one for the same generation.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        let path = self.path_for(checkpoint.generation);
        write_json_atomic(&path, checkpoint)?;
        debug!(path = %path.display(), "checkpoint written");
        Ok(path)
    }

    /// Generations that have a checkpoint file, ascending.
    pub fn generations(&self) -> Result<Vec<usize>> {
        let mut generations = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(generation) = name
                .to_str()
                .and_then(|n| n.strip_prefix(CHECKPOINT_PREFIX))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse().ok())
            else {
                continue;
            };
            generations.push(generation);
        }
        generations.sort_unstable();
        Ok(generations)
    }

    /// Loads the checkpoint of `generation`.
    pub fn load(&self, generation: usize) -> Result<Checkpoint> {
        read_json(&self.path_for(generation))
    }

    /// Loads the most recent readable checkpoint.
    ///
    /// Corrupt files are skipped with a warning.
    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        for generation in self.generations()?.into_iter().rev() {
            match self.load(generation) {
                Ok(checkpoint) => return Ok(Some(checkpoint)),
                Err(e) => warn!(generation, error = %e, "skipping unreadable checkpoint"),
            }
        }
        Ok(None)
    }

    /// Writes `final_result.json`.
    pub fn write_final(&self, result: &MiningResult) -> Result<PathBuf> {
        let path = self.dir.join(FINAL_RESULT_FILE);
        write_json_atomic(&path, result)?;
        Ok(path)
    }

    /// Loads `final_result.json`, if present.
    pub fn load_final(&self) -> Result<Option<MiningResult>> {
        let path = self.dir.join(FINAL_RESULT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::derive_window;
    use forja_evolve::Termination;

    pub(crate) fn valid_result(fitness: f64) -> FitnessResult {
        FitnessResult {
            valid: true,
            error: None,
            sharpe: Some(1.5),
            total_return: Some(0.2),
            turnover: Some(40.0),
            ic: 0.05,
            ..FitnessResult::invalid(fitness, "", 0.9)
        }
    }

    fn snapshot(generation: usize) -> Snapshot {
        Snapshot {
            generation,
            total_evaluations: 42,
            best_fitness: Some(12.0),
            hall_of_fame: vec![
                RankedFactor {
                    expression: "ts_mean(Close, 10)".into(),
                    result: valid_result(12.0),
                },
                RankedFactor {
                    expression: "abs(Volume)".into(),
                    result: valid_result(6.0),
                },
            ],
            history: vec![],
        }
    }

    #[test]
    fn test_checkpoint_format() {
        let checkpoint = Checkpoint::from_snapshot(&snapshot(5), 1, 3.0);
        assert_eq!(checkpoint.top_factors.len(), 1);

        let factor = &checkpoint.top_factors[0];
        assert_eq!(factor.inner_expression, "ts_mean(Close, 10)");
        assert_eq!(factor.normalize_window, derive_window("ts_mean(Close, 10)"));
        assert!(factor.expression.starts_with("sanitize(clip(ts_zscore(sanitize(ts_mean(Close, 10)),"));
        assert_eq!(factor.returns, Some(0.2));

        let json: serde_json::Value = serde_json::to_value(&checkpoint).unwrap();
        for key in ["generation", "total_evaluations", "best_fitness", "top_factors", "fitness_history"] {
            assert!(json.get(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_store_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("run")).unwrap();
        assert!(store.latest().unwrap().is_none());

        for generation in [5, 10, 15] {
            store.write(&Checkpoint::from_snapshot(&snapshot(generation), 10, 3.0)).unwrap();
        }
        assert!(store.path_for(5).ends_with("checkpoint_gen_0005.json"));
        assert_eq!(store.generations().unwrap(), vec![5, 10, 15]);

        fs::write(store.path_for(20), "{ not json").unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.generation, 15);
        assert_eq!(latest.top_factors.len(), 2);
    }

    #[test]
    fn test_final_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert!(store.load_final().unwrap().is_none());

        let result = MiningResult {
            best_expression: Some("abs(Volume)".into()),
            best: Some(valid_result(3.0)),
            top: vec![],
            history: vec![],
            runtime_secs: 1.0,
            total_evaluations: 10,
            termination: Termination::Completed,
            dimension_fallbacks: 0,
        };
        store.write_final(&result).unwrap();
        let back = store.load_final().unwrap().unwrap();
        assert_eq!(back.best_expression.as_deref(), Some("abs(Volume)"));
        assert_eq!(back.termination, Termination::Completed);
    }
}
