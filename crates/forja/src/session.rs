//! Wiring a panel and a configuration into a run.

use crate::config::MiningConfig;
use forja_eval::FitnessEvaluator;
use forja_evolve::{FactorFitness, Miner, MiningResult, RunSink, StopHandle};
use forja_expr::{DimensionTracker, PrimitiveSet};
use forja_ops::OperatorLibrary;
use forja_registry::{CheckpointStore, FactorRegistry, RegistrySink, hashed_normalization};
use forja_traits::{Panel, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A configured mining run over one panel.
#[derive(Debug, Clone)]
pub struct MiningSession {
    config: MiningConfig,
    panel: Arc<Panel>,
    label: Option<String>,
    checkpoint_dir: Option<PathBuf>,
    registry_dir: Option<PathBuf>,
    run_id: Option<String>,
}

impl MiningSession {
    /// Validates `config` against `panel`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn new(panel: Panel, config: MiningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            panel: Arc::new(panel),
            label: None,
            checkpoint_dir: None,
            registry_dir: None,
            run_id: None,
        })
    }

    /// Scores against a label column instead of the next-period return.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>) -> Self {
        self.label = Some(name.into());
        self
    }

    /// Writes checkpoints and the final result to `dir`.
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Promotes hall-of-fame members into the registry in `dir`.
    #[must_use]
    pub fn with_registry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.registry_dir = Some(dir.into());
        self
    }

    /// Identifier recorded on promoted entries.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// The configuration.
    pub const fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Primitive set for the panel's feature columns.
    pub fn primitives(&self) -> Result<PrimitiveSet> {
        PrimitiveSet::build(
            &self.panel.column_names(),
            &OperatorLibrary::with_defaults(),
            &self.config.primitives,
        )
    }

    /// Builds the miner and its sink.
    ///
    /// # Errors
    ///
    /// Fails when mandatory columns or the label are missing, or when the
    /// output directories cannot be created.
    pub fn prepare(&self) -> Result<PreparedRun> {
        let primitives = self.primitives()?;
        let evaluator = FitnessEvaluator::new(self.config.fitness.clone())?;
        let mut fitness = FactorFitness::new(Arc::clone(&self.panel), evaluator)?
            .with_normalization(Some(hashed_normalization(self.config.registry.clip_range)));
        if let Some(label) = &self.label {
            fitness = fitness.with_label(label)?;
        }

        let sink = match &self.checkpoint_dir {
            Some(dir) => {
                let store = CheckpointStore::open(dir)?;
                let registry = match &self.registry_dir {
                    Some(dir) => {
                        let registry = FactorRegistry::open(dir, self.config.registry.clone())?;
                        Some(match &self.run_id {
                            Some(id) => registry.with_run_id(id.clone()),
                            None => registry,
                        })
                    }
                    None => None,
                };
                Some(RegistrySink::new(store, registry))
            }
            None => None,
        };

        let (rows, assets) = self.panel.shape();
        info!(rows, assets, terminals = primitives.terminals().len(), "prepared mining run");
        let miner = Miner::new(
            self.config.evolution.clone(),
            Arc::new(fitness),
            primitives,
            DimensionTracker::default(),
        )?;
        Ok(PreparedRun { miner, sink })
    }

    /// Prepares and runs to completion.
    pub fn run(&self) -> Result<RunSummary> {
        self.prepare()?.run()
    }
}

/// A run ready to start.
#[derive(Debug)]
pub struct PreparedRun {
    miner: Miner,
    sink: Option<RegistrySink>,
}

impl PreparedRun {
    /// Handle that stops the run at the next generation boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.miner.stop_handle()
    }

    /// Runs the search.
    pub fn run(mut self) -> Result<RunSummary> {
        let result = match self.sink.as_mut() {
            Some(sink) => {
                let mut sinks: [&mut dyn RunSink; 1] = [sink];
                self.miner.run(&mut sinks)?
            }
            None => self.miner.run(&mut [])?,
        };
        Ok(RunSummary {
            result,
            promoted: self.sink.as_ref().map_or(0, RegistrySink::promoted),
        })
    }
}

/// Result of a session.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The miner's result.
    pub result: MiningResult,
    /// Entries promoted into the registry.
    pub promoted: usize,
}
