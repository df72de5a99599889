//! Evolution parameters.

use forja_traits::{ForjaError, Result};
use serde::{Deserialize, Serialize};

/// Relative weights of the mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationWeights {
    /// Replace a random subtree with a freshly grown one.
    pub subtree: f64,
    /// Replace an operator node with one of its series arguments.
    pub shrink: f64,
    /// Swap one node for a compatible node of the same arity and kind.
    pub point: f64,
}

impl Default for MutationWeights {
    fn default() -> Self {
        Self {
            subtree: 0.5,
            shrink: 0.2,
            point: 0.3,
        }
    }
}

/// Run-wide parameters of the evolutionary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Individuals per generation.
    pub population_size: usize,
    /// Generations after the initial one.
    pub generations: usize,
    /// Contestants per tournament.
    pub tournament_size: usize,
    /// Probability that a pair of parents is recombined.
    pub crossover_prob: f64,
    /// Probability that an offspring is mutated.
    pub mutation_prob: f64,
    /// Mutation operator weights.
    pub mutation_weights: MutationWeights,
    /// Hall-of-fame members copied unchanged into every generation.
    pub elite_size: usize,
    /// Hall-of-fame capacity.
    pub hall_of_fame_size: usize,
    /// Minimum height of initial trees.
    pub init_min_depth: usize,
    /// Maximum height of initial trees.
    pub init_max_depth: usize,
    /// Hard height limit for any individual.
    pub max_depth: usize,
    /// Hard node-count limit for any individual.
    pub max_nodes: usize,
    /// Generations without improvement before stopping; 0 disables.
    pub early_stop_patience: usize,
    /// Smallest gain in best fitness that counts as improvement.
    pub early_stop_min_delta: f64,
    /// Checkpoint interval in generations; 0 disables periodic checkpoints.
    pub checkpoint_every: usize,
    /// Forced collection interval in generations; 0 disables.
    pub gc_every: usize,
    /// Resident memory ceiling in MiB.
    pub memory_limit_mb: Option<f64>,
    /// Terminate instead of collecting when over the memory ceiling.
    pub abort_on_memory_limit: bool,
    /// Evaluate pending individuals in parallel.
    pub parallel: bool,
    /// Random seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Entries reported in the final result.
    pub top_n: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 200,
            generations: 30,
            tournament_size: 3,
            crossover_prob: 0.7,
            mutation_prob: 0.2,
            mutation_weights: MutationWeights::default(),
            elite_size: 5,
            hall_of_fame_size: 50,
            init_min_depth: 1,
            init_max_depth: 4,
            max_depth: 8,
            max_nodes: 40,
            early_stop_patience: 10,
            early_stop_min_delta: 1e-4,
            checkpoint_every: 5,
            gc_every: 10,
            memory_limit_mb: None,
            abort_on_memory_limit: false,
            parallel: true,
            seed: None,
            top_n: 20,
        }
    }
}

impl EvolutionConfig {
    /// Checks sizes, probabilities and limits.
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(ForjaError::InvalidConfig(msg.to_string()));

        if self.population_size < 2 {
            return fail("population_size must be at least 2");
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return fail("tournament_size must be in 1..=population_size");
        }
        for p in [self.crossover_prob, self.mutation_prob] {
            if !(0.0..=1.0).contains(&p) {
                return fail("probabilities must be in [0, 1]");
            }
        }
        let w = self.mutation_weights;
        let weights = [w.subtree, w.shrink, w.point];
        if weights.iter().any(|x| !x.is_finite() || *x < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return fail("mutation weights must be non-negative with a positive sum");
        }
        if self.elite_size > self.population_size {
            return fail("elite_size cannot exceed population_size");
        }
        if self.hall_of_fame_size < self.elite_size.max(1) {
            return fail("hall_of_fame_size must hold at least the elites");
        }
        if self.init_min_depth > self.init_max_depth {
            return fail("init_min_depth cannot exceed init_max_depth");
        }
        if self.init_max_depth > self.max_depth {
            return fail("init_max_depth cannot exceed max_depth");
        }
        if self.max_nodes == 0 {
            return fail("max_nodes must be positive");
        }
        if !self.early_stop_min_delta.is_finite() || self.early_stop_min_delta < 0.0 {
            return fail("early_stop_min_delta must be non-negative");
        }
        if let Some(limit) = self.memory_limit_mb
            && !(limit.is_finite() && limit > 0.0)
        {
            return fail("memory_limit_mb must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            EvolutionConfig {
                population_size: 1,
                ..Default::default()
            },
            EvolutionConfig {
                tournament_size: 0,
                ..Default::default()
            },
            EvolutionConfig {
                crossover_prob: 1.5,
                ..Default::default()
            },
            EvolutionConfig {
                elite_size: 60,
                hall_of_fame_size: 50,
                ..Default::default()
            },
            EvolutionConfig {
                init_max_depth: 10,
                max_depth: 8,
                ..Default::default()
            },
            EvolutionConfig {
                mutation_weights: MutationWeights {
                    subtree: 0.0,
                    shrink: 0.0,
                    point: 0.0,
                },
                ..Default::default()
            },
            EvolutionConfig {
                memory_limit_mb: Some(-1.0),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EvolutionConfig =
            serde_json::from_str(r#"{"population_size": 50, "seed": 7}"#).unwrap();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.tournament_size, 3);
    }
}
