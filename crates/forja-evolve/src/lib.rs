#![doc(issue_tracker_base_url = "https://github.com/factordynamics/forja/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Evolutionary search for Forja.
//!
//! A [`Miner`] grows a population of typed expression trees, scores them
//! through a [`FitnessFunction`] and keeps the best in a [`HallOfFame`].
//! Progress is reported to [`RunSink`]s at checkpoints.

pub mod config;
pub mod engine;
pub mod fitness_fn;
pub mod hall_of_fame;
pub mod memory;
pub mod stats;
pub mod variation;

pub use config::{EvolutionConfig, MutationWeights};
pub use engine::{
    Miner, MiningResult, RankedFactor, RunSink, Snapshot, StopHandle, Termination,
};
pub use fitness_fn::{FactorFitness, FitnessFunction, Normalization, WindowFn};
pub use hall_of_fame::{HallOfFame, Member};
pub use memory::{CollectTrigger, MemoryMonitor, resident_memory_mb};
pub use stats::GenerationStats;
pub use variation::{MutationKind, SlotKind, Variation};
