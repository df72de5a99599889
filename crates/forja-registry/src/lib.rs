#![doc(issue_tracker_base_url = "https://github.com/factordynamics/forja/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Persistence for Forja runs.
//!
//! - [`normalize`]: the hash-derived normalization wrapper
//! - [`checkpoint`]: per-generation checkpoints and the final result
//! - [`registry`]: the tiered factor registry
//! - [`export`]: standalone factor definitions
//! - [`sink`]: a [`forja_evolve::RunSink`] tying them to a run

pub mod checkpoint;
pub mod export;
mod io;
pub mod normalize;
pub mod registry;
pub mod sink;

pub use checkpoint::{Checkpoint, CheckpointFactor, CheckpointStore, FINAL_RESULT_FILE};
pub use export::{FactorDefinition, FactorInput};
pub use normalize::{
    DEFAULT_CLIP_RANGE, NormalizationSpec, Normalized, WINDOW_CHOICES, derive_window,
    hashed_normalization,
};
pub use registry::{
    FactorRegistry, ListQuery, RegistryConfig, RegistryEntry, SortKey, Tier, entry_id,
};
pub use sink::RegistrySink;
