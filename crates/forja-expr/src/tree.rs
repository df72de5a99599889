//! Arena-backed expression trees.
//!
//! Nodes are stored in pre-order in a single vector; operator nodes refer to
//! their children by index. The root is always node 0. Trees are immutable
//! values: every edit returns a new [`Expr`].

use crate::parse::parse_expr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Index of a node inside an [`Expr`].
pub type NodeId = usize;

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Application of a named operator.
    Operator {
        /// Operator name.
        name: String,
        /// Child node ids, in argument order.
        children: Vec<NodeId>,
    },
    /// Reference to a panel column.
    Column(String),
    /// Numeric constant.
    Constant(f64),
    /// Rolling window length.
    Window(usize),
}

/// What a node produces when evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A panel-shaped series (operators and columns).
    Series,
    /// A window length.
    Window,
    /// A numeric constant.
    Constant,
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    nodes: Vec<Node>,
}

impl Expr {
    /// A lone column terminal.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::Column(name.into())],
        }
    }

    /// A lone constant terminal.
    pub fn constant(value: f64) -> Self {
        Self {
            nodes: vec![Node::Constant(value)],
        }
    }

    /// A lone window terminal.
    pub fn window(length: usize) -> Self {
        Self {
            nodes: vec![Node::Window(length)],
        }
    }

    /// Applies operator `name` to `args`.
    pub fn apply(name: impl Into<String>, args: Vec<Self>) -> Self {
        let total = 1 + args.iter().map(Self::node_count).sum::<usize>();
        let mut nodes = Vec::with_capacity(total);
        nodes.push(Node::Operator {
            name: name.into(),
            children: Vec::with_capacity(args.len()),
        });

        let mut child_ids = Vec::with_capacity(args.len());
        for arg in args {
            let offset = nodes.len();
            child_ids.push(offset);
            nodes.extend(arg.nodes.into_iter().map(|node| node.shifted(offset)));
        }
        if let Node::Operator { children, .. } = &mut nodes[0] {
            *children = child_ids;
        }
        Self { nodes }
    }

    /// Id of the root node.
    pub const fn root(&self) -> NodeId {
        0
    }

    /// The node with the given id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path; a lone terminal has height 0.
    pub fn height(&self) -> usize {
        self.height_of(self.root())
    }

    /// Height of the subtree rooted at `id`.
    pub fn height_of(&self, id: NodeId) -> usize {
        match &self.nodes[id] {
            Node::Operator { children, .. } => {
                1 + children.iter().map(|&c| self.height_of(c)).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Distance from the root to `id`.
    pub fn depth_of(&self, id: NodeId) -> usize {
        let parents = self.parents();
        let mut depth = 0;
        let mut cursor = id;
        while let Some((parent, _)) = parents[cursor] {
            depth += 1;
            cursor = parent;
        }
        depth
    }

    /// Children of `id` (empty for terminals).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id] {
            Node::Operator { children, .. } => children,
            _ => &[],
        }
    }

    /// Parent id and argument position for every node; `None` for the root.
    pub fn parents(&self) -> Vec<Option<(NodeId, usize)>> {
        let mut parents = vec![None; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Operator { children, .. } = node {
                for (position, &child) in children.iter().enumerate() {
                    parents[child] = Some((id, position));
                }
            }
        }
        parents
    }

    /// What node `id` produces.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        match &self.nodes[id] {
            Node::Operator { .. } | Node::Column(_) => NodeKind::Series,
            Node::Constant(_) => NodeKind::Constant,
            Node::Window(_) => NodeKind::Window,
        }
    }

    /// Copies the subtree rooted at `id` into its own expression.
    pub fn subtree(&self, id: NodeId) -> Self {
        match &self.nodes[id] {
            Node::Operator { name, children } => {
                Self::apply(name.clone(), children.iter().map(|&c| self.subtree(c)).collect())
            }
            leaf => Self {
                nodes: vec![leaf.clone()],
            },
        }
    }

    /// Returns a copy with the subtree at `id` replaced by `replacement`.
    pub fn replace_subtree(&self, id: NodeId, replacement: &Self) -> Self {
        if id == self.root() {
            return replacement.clone();
        }
        self.rebuild(self.root(), id, replacement)
    }

    fn rebuild(&self, current: NodeId, target: NodeId, replacement: &Self) -> Self {
        if current == target {
            return replacement.clone();
        }
        match &self.nodes[current] {
            Node::Operator { name, children } => Self::apply(
                name.clone(),
                children
                    .iter()
                    .map(|&c| self.rebuild(c, target, replacement))
                    .collect(),
            ),
            leaf => Self {
                nodes: vec![leaf.clone()],
            },
        }
    }

    /// Returns a copy with node `id` replaced by `node`, keeping its children.
    ///
    /// Only the operator name is taken from an operator `node`.
    pub fn replace_node(&self, id: NodeId, node: Node) -> Self {
        let mut nodes = self.nodes.clone();
        nodes[id] = match (node, &self.nodes[id]) {
            (Node::Operator { name, .. }, Node::Operator { children, .. }) => Node::Operator {
                name,
                children: children.clone(),
            },
            (replacement, _) => replacement,
        };
        Self { nodes }
    }

    /// Names of the columns the expression reads.
    pub fn columns(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Column(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names of the operators the expression applies.
    pub fn operators(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Operator { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nodes[id] {
            Node::Operator { name, children } => {
                write!(f, "{name}(")?;
                for (i, &child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.fmt_node(child, f)?;
                }
                f.write_str(")")
            }
            Node::Column(name) => f.write_str(name),
            Node::Constant(value) => f.write_str(&format_constant(*value)),
            Node::Window(length) => write!(f, "{length}"),
        }
    }
}

impl Node {
    fn shifted(self, offset: usize) -> Self {
        match self {
            Self::Operator { name, children } => Self::Operator {
                name,
                children: children.into_iter().map(|c| c + offset).collect(),
            },
            leaf => leaf,
        }
    }
}

/// Constants always carry a decimal point or exponent so they never read as windows.
fn format_constant(value: f64) -> String {
    let text = format!("{value}");
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root(), f)
    }
}

impl std::str::FromStr for Expr {
    type Err = forja_traits::ForjaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_expr(s)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_expr(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expr {
        // div(ts_mean(Close, 10), add(Volume, 2.0))
        Expr::apply(
            "div",
            vec![
                Expr::apply("ts_mean", vec![Expr::column("Close"), Expr::window(10)]),
                Expr::apply("add", vec![Expr::column("Volume"), Expr::constant(2.0)]),
            ],
        )
    }

    #[test]
    fn test_display_canonical_form() {
        assert_eq!(sample().to_string(), "div(ts_mean(Close, 10), add(Volume, 2.0))");
        assert_eq!(Expr::constant(-0.5).to_string(), "-0.5");
    }

    #[test]
    fn test_height_and_count() {
        let expr = sample();
        assert_eq!(expr.height(), 2);
        assert_eq!(expr.node_count(), 7);
        assert_eq!(Expr::column("Close").height(), 0);
    }

    #[test]
    fn test_preorder_layout() {
        let expr = sample();
        assert_eq!(expr.children(0), &[1, 4]);
        assert_eq!(expr.node(2), &Node::Column("Close".into()));
        assert_eq!(expr.kind(3), NodeKind::Window);
        assert_eq!(expr.kind(6), NodeKind::Constant);
        assert_eq!(expr.depth_of(6), 2);
        assert_eq!(expr.parents()[4], Some((0, 1)));
    }

    #[test]
    fn test_subtree_and_replace() {
        let expr = sample();
        assert_eq!(expr.subtree(4).to_string(), "add(Volume, 2.0)");

        let replaced = expr.replace_subtree(1, &Expr::column("Open"));
        assert_eq!(replaced.to_string(), "div(Open, add(Volume, 2.0))");
        assert_eq!(replaced.node_count(), 5);
        // original untouched
        assert_eq!(expr.node_count(), 7);
    }

    #[test]
    fn test_replace_node_keeps_children() {
        let expr = sample();
        let swapped = expr.replace_node(
            0,
            Node::Operator {
                name: "mul".into(),
                children: vec![],
            },
        );
        assert_eq!(swapped.to_string(), "mul(ts_mean(Close, 10), add(Volume, 2.0))");
        let rewindowed = expr.replace_node(3, Node::Window(20));
        assert_eq!(rewindowed.subtree(1).to_string(), "ts_mean(Close, 20)");
    }

    #[test]
    fn test_columns_and_operators() {
        let expr = sample();
        assert_eq!(expr.columns().into_iter().collect::<Vec<_>>(), vec!["Close", "Volume"]);
        assert!(expr.operators().contains("ts_mean"));
    }

    #[test]
    fn test_serde_as_string() {
        let expr = sample();
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, "\"div(ts_mean(Close, 10), add(Volume, 2.0))\"");
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
