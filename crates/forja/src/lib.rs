#![doc(issue_tracker_base_url = "https://github.com/factordynamics/forja/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # forja
//!
//! Genetic-programming factor mining over multi-asset panels.
//!
//! forja is an umbrella crate that re-exports the forja sub-crates and wires
//! them into a [`MiningSession`]: a panel and a [`MiningConfig`] in, a
//! [`MiningResult`] plus checkpoints and promoted registry entries out.
//!
//! ## Quick Start
//!
//! ```no_run
//! use forja::{MiningConfig, MiningSession, Panel, Result};
//!
//! # fn load_panel() -> Panel { unimplemented!() }
//! # fn main() -> Result<()> {
//! let panel: Panel = load_panel();
//! let config = MiningConfig::default();
//!
//! let summary = MiningSession::new(panel, config)?
//!     .with_checkpoint_dir("runs/latest")
//!     .with_registry_dir("registry")
//!     .run()?;
//!
//! if let Some(best) = &summary.result.best_expression {
//!     println!("best factor: {best}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Panels, frames, dimensions, the operator boundary and errors
//! - [`ops`] - The numeric operator library
//! - [`expr`] - Typed expression trees, generation and evaluation
//! - [`eval`] - IC and portfolio fitness
//! - [`evolve`] - The evolutionary search loop
//! - [`registry`] - Checkpoints, the factor registry and export

/// The version of the forja crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod session;

pub use config::MiningConfig;
pub use session::{MiningSession, PreparedRun, RunSummary};

// ============================================================================
// Sub-crates
// ============================================================================

/// Core types and the operator boundary.
pub mod traits {
    pub use forja_traits::*;
}

/// Numeric operators.
pub mod ops {
    pub use forja_ops::*;
}

/// Expression trees, primitives, generation and evaluation.
pub mod expr {
    pub use forja_expr::*;
}

/// Fitness scoring.
pub mod eval {
    pub use forja_eval::*;
}

/// Evolutionary search.
pub mod evolve {
    pub use forja_evolve::*;
}

/// Persistence and export.
pub mod registry {
    pub use forja_registry::*;
}

// Re-export the most used types at top level
pub use forja_eval::{EvaluationMode, FitnessConfig, FitnessResult};
pub use forja_evolve::{EvolutionConfig, MiningResult, StopHandle, Termination};
pub use forja_expr::{Expr, parse_expr};
pub use forja_registry::{FactorDefinition, FactorRegistry, RegistryConfig};
pub use forja_traits::{Dimension, ForjaError, Frame, Panel, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Common imports.
pub mod prelude {
    pub use crate::{
        Dimension, EvolutionConfig, Expr, FitnessConfig, ForjaError, Frame, MiningConfig,
        MiningSession, Panel, RegistryConfig, Result, parse_expr,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    #[test]
    fn test_error_types() {
        let _result: Result<()> = Ok(());
        let _error: ForjaError = ForjaError::InvalidData("test".to_string());
    }
}
