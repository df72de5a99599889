//! Crossover and mutation under static limits.
//!
//! Every operator returns trees that respect the height and node limits and
//! pass the dimension typecheck. An offspring that would violate any of them
//! is replaced by its parent.

use crate::config::MutationWeights;
use forja_expr::{
    DimensionTracker, Expr, GrowMethod, Node, NodeId, PrimitiveSet, TreeGenerator,
};
use forja_traits::ArgKind;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Kind of the argument slot a node occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A series argument (or the root).
    Series,
    /// A window argument.
    Window,
    /// A constant argument.
    Constant,
}

/// The mutation operator applied to an offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Replace a subtree with a freshly grown one.
    Subtree,
    /// Hoist a series argument over its operator.
    Shrink,
    /// Swap a single node.
    Point,
}

/// Applies genetic operators.
#[derive(Debug, Clone, Copy)]
pub struct Variation<'a> {
    primitives: &'a PrimitiveSet,
    tracker: &'a DimensionTracker,
    max_depth: usize,
    max_nodes: usize,
    weights: MutationWeights,
}

impl<'a> Variation<'a> {
    /// Creates the operators with static limits.
    pub const fn new(
        primitives: &'a PrimitiveSet,
        tracker: &'a DimensionTracker,
        max_depth: usize,
        max_nodes: usize,
        weights: MutationWeights,
    ) -> Self {
        Self {
            primitives,
            tracker,
            max_depth,
            max_nodes,
            weights,
        }
    }

    /// Slot kind of every node of `expr`.
    pub fn slot_kinds(&self, expr: &Expr) -> Vec<SlotKind> {
        expr.parents()
            .into_iter()
            .map(|parent| match parent {
                None => SlotKind::Series,
                Some((pid, position)) => match expr.node(pid) {
                    Node::Operator { name, .. } => self
                        .primitives
                        .get(name)
                        .and_then(|p| p.args().get(position).copied())
                        .map_or(SlotKind::Series, |kind| match kind {
                            ArgKind::Series(_) => SlotKind::Series,
                            ArgKind::Window => SlotKind::Window,
                            ArgKind::Constant => SlotKind::Constant,
                        }),
                    _ => SlotKind::Series,
                },
            })
            .collect()
    }

    /// Whether `expr` respects the limits and typechecks.
    pub fn is_admissible(&self, expr: &Expr) -> bool {
        matches!(expr.node(expr.root()), Node::Operator { .. } | Node::Column(_))
            && expr.height() <= self.max_depth
            && expr.node_count() <= self.max_nodes
            && self.primitives.typecheck(expr, self.tracker).is_ok()
    }

    fn or_parent(&self, candidate: Expr, parent: &Expr) -> Expr {
        if self.is_admissible(&candidate) {
            candidate
        } else {
            parent.clone()
        }
    }

    /// Subtree crossover between type-compatible points.
    pub fn crossover<R: Rng + ?Sized>(&self, rng: &mut R, a: &Expr, b: &Expr) -> (Expr, Expr) {
        let kinds_a = self.slot_kinds(a);
        let kinds_b = self.slot_kinds(b);

        let point_a = rng.random_range(0..a.node_count());
        let kind = kinds_a[point_a];
        let matches: Vec<NodeId> = (0..b.node_count()).filter(|&i| kinds_b[i] == kind).collect();
        let Some(&point_b) = matches.choose(rng) else {
            return (a.clone(), b.clone());
        };

        let child_a = a.replace_subtree(point_a, &b.subtree(point_b));
        let child_b = b.replace_subtree(point_b, &a.subtree(point_a));
        (self.or_parent(child_a, a), self.or_parent(child_b, b))
    }

    /// Picks a mutation operator by weight.
    pub fn choose_mutation<R: Rng + ?Sized>(&self, rng: &mut R) -> MutationKind {
        let w = self.weights;
        let total = w.subtree + w.shrink + w.point;
        let draw = rng.random_range(0.0..total);
        if draw < w.subtree {
            MutationKind::Subtree
        } else if draw < w.subtree + w.shrink {
            MutationKind::Shrink
        } else {
            MutationKind::Point
        }
    }

    /// Applies a weighted random mutation.
    pub fn mutate<R: Rng + ?Sized>(&self, rng: &mut R, expr: &Expr) -> Expr {
        match self.choose_mutation(rng) {
            MutationKind::Subtree => self.subtree_mutation(rng, expr),
            MutationKind::Shrink => self.shrink_mutation(rng, expr),
            MutationKind::Point => self.point_mutation(rng, expr),
        }
    }

    /// Replaces a random series subtree with a freshly grown tree.
    pub fn subtree_mutation<R: Rng + ?Sized>(&self, rng: &mut R, expr: &Expr) -> Expr {
        let kinds = self.slot_kinds(expr);
        let series: Vec<NodeId> = (0..expr.node_count())
            .filter(|&i| kinds[i] == SlotKind::Series)
            .collect();
        let Some(&point) = series.choose(rng) else {
            return expr.clone();
        };

        let budget = self.max_depth.saturating_sub(expr.depth_of(point)).min(3);
        let generator = TreeGenerator::new(self.primitives, self.tracker, self.max_nodes);
        let method = if rng.random_bool(0.5) {
            GrowMethod::Grow
        } else {
            GrowMethod::Full
        };
        let fresh = generator.generate(rng, method, 0, budget);
        self.or_parent(expr.replace_subtree(point, &fresh), expr)
    }

    /// Replaces a random operator node with one of its series arguments.
    pub fn shrink_mutation<R: Rng + ?Sized>(&self, rng: &mut R, expr: &Expr) -> Expr {
        let kinds = self.slot_kinds(expr);
        let hoistable: Vec<(NodeId, NodeId)> = (0..expr.node_count())
            .flat_map(|id| {
                expr.children(id)
                    .iter()
                    .filter(|&&c| {
                        kinds[c] == SlotKind::Series
                            && matches!(expr.node(c), Node::Operator { .. } | Node::Column(_))
                    })
                    .map(move |&c| (id, c))
                    .collect::<Vec<_>>()
            })
            .collect();
        let Some(&(operator, child)) = hoistable.choose(rng) else {
            return expr.clone();
        };
        self.or_parent(expr.replace_subtree(operator, &expr.subtree(child)), expr)
    }

    /// Swaps one node for a compatible alternative.
    ///
    /// Operators are swapped for primitives with the same argument kinds,
    /// columns for other columns, windows and constants for other terminals
    /// of their kind.
    pub fn point_mutation<R: Rng + ?Sized>(&self, rng: &mut R, expr: &Expr) -> Expr {
        let id = rng.random_range(0..expr.node_count());
        let replacement = match expr.node(id) {
            Node::Operator { name, .. } => {
                let Some(current) = self.primitives.get(name) else {
                    return expr.clone();
                };
                let peers: Vec<&str> = self
                    .primitives
                    .primitives()
                    .filter(|p| p.name() != name && p.args() == current.args())
                    .map(|p| p.name())
                    .collect();
                peers.choose(rng).map(|peer| Node::Operator {
                    name: (*peer).to_string(),
                    children: Vec::new(),
                })
            }
            Node::Column(name) => {
                let others: Vec<&str> = self
                    .primitives
                    .terminals()
                    .iter()
                    .map(|t| t.name.as_str())
                    .filter(|t| t != name)
                    .collect();
                others.choose(rng).map(|c| Node::Column((*c).to_string()))
            }
            Node::Window(w) => {
                let others: Vec<usize> = self
                    .primitives
                    .windows()
                    .iter()
                    .copied()
                    .filter(|x| x != w)
                    .collect();
                others.choose(rng).map(|x| Node::Window(*x))
            }
            Node::Constant(c) => {
                let others: Vec<f64> = self
                    .primitives
                    .constants()
                    .iter()
                    .copied()
                    .filter(|x| x != c)
                    .collect();
                others.choose(rng).map(|x| Node::Constant(*x))
            }
        };

        match replacement {
            Some(node) => self.or_parent(expr.replace_node(id, node), expr),
            None => expr.clone(),
        }
    }
}
