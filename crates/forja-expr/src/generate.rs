//! Random, type-safe tree generation.
//!
//! Argument slots are filled by kind: window slots always receive a window
//! terminal, constant slots a constant terminal, series slots an operator or
//! a column whose dimension the slot accepts. Candidates whose dimensions do
//! not compose are regenerated a bounded number of times before falling back
//! to the `Close` column.

use crate::dimension::DimensionTracker;
use crate::primitives::{Primitive, PrimitiveSet};
use crate::tree::Expr;
use forja_traits::{ArgKind, CLOSE_COLUMN, DimensionSet, OperatorCategory};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

const MAX_ATTEMPTS: usize = 32;
const CONSTANT_LEAF_PROB: f64 = 0.15;

/// Tree growth strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowMethod {
    /// Every branch reaches the target depth.
    Full,
    /// Branches may stop early at a terminal.
    Grow,
}

/// Generates random expressions from a [`PrimitiveSet`].
#[derive(Debug, Clone, Copy)]
pub struct TreeGenerator<'a> {
    primitives: &'a PrimitiveSet,
    tracker: &'a DimensionTracker,
    max_nodes: usize,
}

impl<'a> TreeGenerator<'a> {
    /// Creates a generator; trees larger than `max_nodes` are rejected.
    pub const fn new(
        primitives: &'a PrimitiveSet,
        tracker: &'a DimensionTracker,
        max_nodes: usize,
    ) -> Self {
        Self {
            primitives,
            tracker,
            max_nodes,
        }
    }

    /// Generates one well-typed tree with height in `min_depth..=max_depth`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        method: GrowMethod,
        min_depth: usize,
        max_depth: usize,
    ) -> Expr {
        let max_depth = max_depth.max(min_depth);
        for _ in 0..MAX_ATTEMPTS {
            let depth = rng.random_range(min_depth..=max_depth);
            let candidate = self.series(rng, method, 0, min_depth, depth, DimensionSet::ALL, false);
            if candidate.height() >= min_depth
                && candidate.node_count() <= self.max_nodes
                && self.primitives.typecheck(&candidate, self.tracker).is_ok()
            {
                return candidate;
            }
        }
        debug!("tree generation exhausted its attempts, using {CLOSE_COLUMN}");
        Expr::column(CLOSE_COLUMN)
    }

    /// Generates a subtree for mutation; any well-typed series tree qualifies.
    pub fn subtree<R: Rng + ?Sized>(&self, rng: &mut R, max_depth: usize) -> Expr {
        self.generate(rng, GrowMethod::Grow, 0, max_depth)
    }

    /// Ramped half-and-half: depths spread over `min_depth..=max_depth`,
    /// alternating between full and grow trees.
    pub fn ramped_half_and_half<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        min_depth: usize,
        max_depth: usize,
    ) -> Vec<Expr> {
        let max_depth = max_depth.max(min_depth);
        let depths = max_depth - min_depth + 1;
        (0..count)
            .map(|i| {
                let depth = min_depth + (i / 2) % depths;
                let method = if i % 2 == 0 {
                    GrowMethod::Full
                } else {
                    GrowMethod::Grow
                };
                self.generate(rng, method, min_depth, depth)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn series<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        method: GrowMethod,
        depth: usize,
        min_depth: usize,
        max_depth: usize,
        accepted: DimensionSet,
        allow_constant: bool,
    ) -> Expr {
        let at_limit = depth >= max_depth;
        let must_grow = depth < min_depth;
        let grow = !at_limit
            && (must_grow
                || method == GrowMethod::Full
                || rng.random_bool(self.operator_probability()));

        if grow {
            let candidates: Vec<&Primitive> = self.primitives.primitives().collect();
            if let Some(primitive) = candidates.choose(rng) {
                return self.apply(rng, primitive, method, depth, min_depth, max_depth);
            }
        }
        self.leaf(rng, accepted, allow_constant)
    }

    fn apply<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        primitive: &Primitive,
        method: GrowMethod,
        depth: usize,
        min_depth: usize,
        max_depth: usize,
    ) -> Expr {
        let arithmetic = primitive.category() == OperatorCategory::Arithmetic;
        let args = primitive
            .args()
            .iter()
            .enumerate()
            .map(|(position, kind)| match kind {
                ArgKind::Window => self.window(rng),
                ArgKind::Constant => self.constant(rng),
                ArgKind::Series(accepted) => self.series(
                    rng,
                    method,
                    depth + 1,
                    min_depth,
                    max_depth,
                    *accepted,
                    arithmetic && position == 1,
                ),
            })
            .collect();
        Expr::apply(primitive.name(), args)
    }

    fn leaf<R: Rng + ?Sized>(&self, rng: &mut R, accepted: DimensionSet, allow_constant: bool) -> Expr {
        if allow_constant && rng.random_bool(CONSTANT_LEAF_PROB) {
            return self.constant(rng);
        }
        let columns: Vec<&str> = self
            .primitives
            .terminals()
            .iter()
            .filter(|t| accepted.contains(t.dimension))
            .map(|t| t.name.as_str())
            .collect();
        columns
            .choose(rng)
            .map_or_else(|| Expr::column(CLOSE_COLUMN), |name| Expr::column(*name))
    }

    fn window<R: Rng + ?Sized>(&self, rng: &mut R) -> Expr {
        Expr::window(self.primitives.windows().choose(rng).copied().unwrap_or(10))
    }

    fn constant<R: Rng + ?Sized>(&self, rng: &mut R) -> Expr {
        Expr::constant(self.primitives.constants().choose(rng).copied().unwrap_or(1.0))
    }

    fn operator_probability(&self) -> f64 {
        let operators = self.primitives.len() as f64;
        let terminals = self.primitives.terminals().len() as f64;
        if operators + terminals == 0.0 {
            0.0
        } else {
            operators / (operators + terminals)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::build_registry;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (PrimitiveSet, DimensionTracker) {
        let set = build_registry(&["Close", "Volume", "return", "fwd_return"], true, true).unwrap();
        (set, DimensionTracker::default())
    }

    #[test]
    fn test_generated_trees_typecheck() {
        let (set, tracker) = setup();
        let generator = TreeGenerator::new(&set, &tracker, 40);
        let mut rng = StdRng::seed_from_u64(7);
        for tree in generator.ramped_half_and_half(&mut rng, 60, 1, 4) {
            assert!(tree.height() <= 4, "{tree}");
            assert!(tree.node_count() <= 40, "{tree}");
            assert!(!tree.columns().contains("fwd_return"), "{tree}");
            if tree.height() > 0 {
                assert!(set.typecheck(&tree, &tracker).is_ok(), "{tree}");
            }
        }
    }

    #[test]
    fn test_generation_is_seeded() {
        let (set, tracker) = setup();
        let generator = TreeGenerator::new(&set, &tracker, 40);
        let a = generator.ramped_half_and_half(&mut StdRng::seed_from_u64(3), 10, 1, 3);
        let b = generator.ramped_half_and_half(&mut StdRng::seed_from_u64(3), 10, 1, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_method_reaches_depth() {
        let (set, tracker) = setup();
        let generator = TreeGenerator::new(&set, &tracker, 200);
        let mut rng = StdRng::seed_from_u64(11);
        let tree = generator.generate(&mut rng, GrowMethod::Full, 2, 2);
        assert!(tree.height() == 2 || tree == Expr::column(CLOSE_COLUMN));
    }
}
