//! Persistence of run progress.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::registry::FactorRegistry;
use forja_evolve::{MiningResult, RankedFactor, RunSink, Snapshot};
use forja_expr::parse_expr;
use forja_traits::{ForjaError, Result};
use tracing::{info, warn};

/// Writes checkpoints and promotes hall-of-fame members into a registry.
#[derive(Debug)]
pub struct RegistrySink {
    checkpoints: CheckpointStore,
    registry: Option<FactorRegistry>,
    promoted: usize,
}

impl RegistrySink {
    /// Persists to `checkpoints` and, when given, promotes into `registry`.
    pub const fn new(checkpoints: CheckpointStore, registry: Option<FactorRegistry>) -> Self {
        Self {
            checkpoints,
            registry,
            promoted: 0,
        }
    }

    /// Entries promoted so far.
    pub const fn promoted(&self) -> usize {
        self.promoted
    }

    /// The registry, if any.
    pub const fn registry(&self) -> Option<&FactorRegistry> {
        self.registry.as_ref()
    }

    /// The checkpoint store.
    pub const fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Promotes every factor, logging failed writes and carrying on.
    ///
    /// Fails after the loop when any write failed.
    fn promote_all(&mut self, factors: &[RankedFactor], generation: usize) -> Result<()> {
        let Some(registry) = self.registry.as_mut() else {
            return Ok(());
        };
        let mut failed = 0;
        for factor in factors {
            let inner = match parse_expr(&factor.expression) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!(expression = %factor.expression, error = %e, "cannot promote unparseable expression");
                    continue;
                }
            };
            match registry.promote(&inner, &factor.result, generation) {
                Ok(Some(_)) => self.promoted += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(expression = %factor.expression, error = %e, "promotion failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(ForjaError::Other(format!(
                "{failed} of {} promotions failed",
                factors.len()
            )));
        }
        Ok(())
    }
}

impl RunSink for RegistrySink {
    fn checkpoint(&mut self, snapshot: &Snapshot) -> Result<()> {
        let (top_n, clip_range) = self
            .registry
            .as_ref()
            .map_or((usize::MAX, crate::normalize::DEFAULT_CLIP_RANGE), |r| {
                (r.config().checkpoint_top_n, r.config().clip_range)
            });
        let path = self
            .checkpoints
            .write(&Checkpoint::from_snapshot(snapshot, top_n, clip_range))?;
        info!(generation = snapshot.generation, path = %path.display(), "checkpoint saved");
        self.promote_all(&snapshot.hall_of_fame, snapshot.generation)
    }

    fn finish(&mut self, result: &MiningResult) -> Result<()> {
        let path = self.checkpoints.write_final(result)?;
        info!(path = %path.display(), promoted = self.promoted, "final result saved");
        let generation = result.history.last().map_or(0, |s| s.generation);
        self.promote_all(&result.top, generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::tests::valid_result;
    use crate::registry::{RegistryConfig, Tier};
    use forja_evolve::Termination;

    fn ranked(expression: &str, fitness: f64) -> RankedFactor {
        RankedFactor {
            expression: expression.into(),
            result: valid_result(fitness),
        }
    }

    #[test]
    fn test_checkpoint_promotes_hall_of_fame() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("checkpoints")).unwrap();
        let registry =
            FactorRegistry::open(dir.path().join("registry"), RegistryConfig::default()).unwrap();
        let mut sink = RegistrySink::new(store, Some(registry));

        let snapshot = Snapshot {
            generation: 5,
            total_evaluations: 100,
            best_fitness: Some(11.0),
            hall_of_fame: vec![
                ranked("ts_mean(Close, 10)", 11.0),
                ranked("abs(Volume)", 6.0),
                ranked("neg(Close)", 1.0),
                ranked("not valid (", 9.0),
            ],
            history: vec![],
        };
        sink.checkpoint(&snapshot).unwrap();
        sink.checkpoint(&Snapshot { generation: 10, ..snapshot }).unwrap();

        assert_eq!(sink.promoted(), 2);
        let registry = sink.registry().unwrap();
        assert_eq!(registry.tier(Tier::High).len(), 1);
        assert_eq!(registry.tier(Tier::Moderate).len(), 1);
        assert_eq!(registry.tier(Tier::High)[0].added_at_gen, 5);
        assert_eq!(sink.checkpoints().generations().unwrap(), vec![5, 10]);
    }

    #[test]
    fn test_failed_promotion_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("checkpoints")).unwrap();
        let registry_dir = dir.path().join("registry");
        let registry = FactorRegistry::open(&registry_dir, RegistryConfig::default()).unwrap();
        let mut sink = RegistrySink::new(store, Some(registry));

        let blocker = registry_dir.join("factors_moderate.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        let snapshot = Snapshot {
            generation: 1,
            total_evaluations: 10,
            best_fitness: Some(11.0),
            hall_of_fame: vec![ranked("abs(Volume)", 6.0), ranked("ts_mean(Close, 10)", 11.0)],
            history: vec![],
        };
        assert!(sink.checkpoint(&snapshot).is_err());
        assert_eq!(sink.promoted(), 1);
        assert_eq!(sink.registry().unwrap().tier(Tier::High).len(), 1);
        assert!(sink.registry().unwrap().tier(Tier::Moderate).is_empty());

        std::fs::remove_dir(&blocker).unwrap();
        sink.checkpoint(&Snapshot { generation: 2, ..snapshot }).unwrap();
        assert_eq!(sink.promoted(), 2);
        assert_eq!(sink.registry().unwrap().tier(Tier::Moderate)[0].added_at_gen, 2);
    }

    #[test]
    fn test_finish_writes_final_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let mut sink = RegistrySink::new(store, None);

        let result = MiningResult {
            best_expression: Some("ts_mean(Close, 10)".into()),
            best: Some(valid_result(11.0)),
            top: vec![ranked("ts_mean(Close, 10)", 11.0)],
            history: vec![],
            runtime_secs: 0.1,
            total_evaluations: 3,
            termination: Termination::EarlyStopped,
            dimension_fallbacks: 0,
        };
        sink.finish(&result).unwrap();
        assert_eq!(sink.promoted(), 0);
        let back = sink.checkpoints().load_final().unwrap().unwrap();
        assert_eq!(back.termination, Termination::EarlyStopped);
    }
}
