//! The primitive set: operators and terminals available to the search.
//!
//! A [`PrimitiveSet`] is built once per run from the panel's column names and
//! the [`OperatorLibrary`]. Arithmetic and element-wise operators are always
//! part of it; time-series and cross-sectional operators are opt-in. Label
//! columns are never exposed as terminals.

use crate::dimension::{DimensionTracker, dimension_for_column};
use crate::tree::{Expr, Node, NodeId};
use forja_ops::OperatorLibrary;
use forja_traits::{
    ArgKind, CLOSE_COLUMN, Dimension, ForjaError, Operator, OperatorCategory, RETURN_COLUMN,
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default window terminals, in rows.
pub const DEFAULT_WINDOWS: [usize; 6] = [3, 5, 10, 20, 40, 60];

/// Default constant terminals.
pub const DEFAULT_CONSTANTS: [f64; 4] = [-1.0, 0.5, 1.0, 2.0];

const LABEL_PREFIXES: [&str; 5] = ["label", "fwd_", "forward_", "future_", "target"];

/// Options controlling which primitives a run may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Include rolling time-series operators.
    pub include_time_series: bool,
    /// Include cross-sectional operators.
    pub include_cross_sectional: bool,
    /// Window terminals.
    pub windows: Vec<usize>,
    /// Constant terminals.
    pub constants: Vec<f64>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            include_time_series: true,
            include_cross_sectional: true,
            windows: DEFAULT_WINDOWS.to_vec(),
            constants: DEFAULT_CONSTANTS.to_vec(),
        }
    }
}

impl RegistryOptions {
    /// Checks that terminal lists are usable.
    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() || self.windows.contains(&0) {
            return Err(ForjaError::InvalidConfig(
                "windows must be non-empty and positive".into(),
            ));
        }
        if self.constants.iter().any(|c| !c.is_finite()) {
            return Err(ForjaError::InvalidConfig("constants must be finite".into()));
        }
        Ok(())
    }
}

/// Whether a column holds forward-looking data and must not become a terminal.
pub fn is_label_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    LABEL_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// An operator available to the search.
#[derive(Debug, Clone)]
pub struct Primitive {
    op: Arc<dyn Operator>,
}

impl Primitive {
    /// Operator name.
    pub fn name(&self) -> &str {
        self.op.name()
    }

    /// Declared argument kinds.
    pub fn args(&self) -> &[ArgKind] {
        self.op.args()
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.op.arity()
    }

    /// How the operator traverses the panel.
    pub fn category(&self) -> OperatorCategory {
        self.op.category()
    }

    /// The callable.
    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.op
    }
}

/// A column terminal with its dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Terminal {
    /// Column name.
    pub name: String,
    /// Inferred dimension.
    pub dimension: Dimension,
}

/// Operators and terminals of one mining run.
#[derive(Debug, Clone)]
pub struct PrimitiveSet {
    primitives: BTreeMap<String, Primitive>,
    terminals: Vec<Terminal>,
    windows: Vec<usize>,
    constants: Vec<f64>,
}

impl PrimitiveSet {
    /// Builds the set from the available columns.
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::MissingColumn`] when `Close` or `return` is absent
    /// and [`ForjaError::InvalidConfig`] for unusable options.
    pub fn build<S: AsRef<str>>(
        columns: &[S],
        library: &OperatorLibrary,
        options: &RegistryOptions,
    ) -> Result<Self> {
        options.validate()?;
        for required in [CLOSE_COLUMN, RETURN_COLUMN] {
            if !columns.iter().any(|c| c.as_ref() == required) {
                return Err(ForjaError::MissingColumn(required.to_string()));
            }
        }

        let primitives = library
            .iter()
            .filter(|op| match op.category() {
                OperatorCategory::Arithmetic | OperatorCategory::Elementwise => true,
                OperatorCategory::TimeSeries => options.include_time_series,
                OperatorCategory::CrossSectional => options.include_cross_sectional,
            })
            .map(|op| {
                (
                    op.name().to_string(),
                    Primitive {
                        op: Arc::clone(op),
                    },
                )
            })
            .collect();

        let terminals = columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !is_label_column(name))
            .map(|name| Terminal {
                name: name.to_string(),
                dimension: dimension_for_column(name),
            })
            .collect();

        Ok(Self {
            primitives,
            terminals,
            windows: options.windows.clone(),
            constants: options.constants.clone(),
        })
    }

    /// All primitives in name order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.values()
    }

    /// Looks up a primitive by name.
    pub fn get(&self, name: &str) -> Option<&Primitive> {
        self.primitives.get(name)
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Whether the set has no primitives.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Column terminals.
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Dimension of a column terminal.
    pub fn terminal_dimension(&self, name: &str) -> Option<Dimension> {
        self.terminals
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.dimension)
    }

    /// Window terminals.
    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    /// Constant terminals.
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// Checks that `expr` only uses this set's primitives and terminals and
    /// that its dimensions compose. Returns the root dimension.
    pub fn typecheck(&self, expr: &Expr, tracker: &DimensionTracker) -> Result<Dimension> {
        let args_of = |name: &str| self.get(name).map(|p| p.args().to_vec());
        let column_dimension = |name: &str| {
            self.terminal_dimension(name)
                .ok_or_else(|| ForjaError::UnknownColumn(name.to_string()))
        };
        check_node(expr, expr.root(), tracker, &args_of, &column_dimension)
    }
}

/// Infers the root dimension of any expression built from `library`.
///
/// Columns take their dimension from their name.
pub fn infer_dimension(
    expr: &Expr,
    library: &OperatorLibrary,
    tracker: &DimensionTracker,
) -> Result<Dimension> {
    let args_of = |name: &str| library.get(name).map(|op| op.args().to_vec());
    let column_dimension = |name: &str| -> Result<Dimension> { Ok(dimension_for_column(name)) };
    check_node(expr, expr.root(), tracker, &args_of, &column_dimension)
}

type ArgLookup<'a> = dyn Fn(&str) -> Option<Vec<ArgKind>> + 'a;
type ColumnLookup<'a> = dyn Fn(&str) -> Result<Dimension> + 'a;

fn check_node(
    expr: &Expr,
    id: NodeId,
    tracker: &DimensionTracker,
    args_of: &ArgLookup<'_>,
    column_dimension: &ColumnLookup<'_>,
) -> Result<Dimension> {
    match expr.node(id) {
        Node::Column(name) => column_dimension(name),
        Node::Constant(_) | Node::Window(_) => Ok(Dimension::Scalar),
        Node::Operator { name, children } => {
            let kinds = args_of(name).ok_or_else(|| ForjaError::UnknownOperator(name.clone()))?;
            if kinds.len() != children.len() {
                return Err(ForjaError::Arity {
                    name: name.clone(),
                    expected: kinds.len(),
                    actual: children.len(),
                });
            }

            let mut inputs = Vec::with_capacity(children.len());
            for (position, (&child, kind)) in children.iter().zip(&kinds).enumerate() {
                let dimension = match (kind, expr.node(child)) {
                    (ArgKind::Window, Node::Window(w)) if *w > 0 => Dimension::Scalar,
                    (ArgKind::Constant, Node::Constant(_)) => Dimension::Scalar,
                    (ArgKind::Series(accepted), Node::Column(_) | Node::Operator { .. }) => {
                        let dimension =
                            check_node(expr, child, tracker, args_of, column_dimension)?;
                        if !accepted.contains(dimension) {
                            return Err(ForjaError::DimensionMismatch(format!(
                                "{name} argument {position} does not accept {dimension}"
                            )));
                        }
                        dimension
                    }
                    (ArgKind::Series(accepted), Node::Constant(_))
                        if accepted.contains(Dimension::Scalar) =>
                    {
                        Dimension::Scalar
                    }
                    (kind, node) => {
                        return Err(ForjaError::Evaluation(format!(
                            "{name} argument {position} expects {kind:?}, got {node:?}"
                        )));
                    }
                };
                inputs.push(dimension);
            }

            tracker.get_output_dimension(name, &inputs)
        }
    }
}

/// Builds a primitive set from the default operator library and terminals.
pub fn build_registry<S: AsRef<str>>(
    columns: &[S],
    include_time_series: bool,
    include_cross_sectional: bool,
) -> Result<PrimitiveSet> {
    let options = RegistryOptions {
        include_time_series,
        include_cross_sectional,
        ..RegistryOptions::default()
    };
    PrimitiveSet::build(columns, &OperatorLibrary::with_defaults(), &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expr;

    const COLUMNS: [&str; 5] = ["Close", "Volume", "return", "fwd_return_5", "label"];

    #[test]
    fn test_terminals_exclude_labels() {
        let set = build_registry(&COLUMNS, true, true).unwrap();
        let names: Vec<_> = set.terminals().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Close", "Volume", "return"]);
        assert_eq!(set.terminal_dimension("Close"), Some(Dimension::Price));
        assert_eq!(set.windows(), DEFAULT_WINDOWS);
        assert_eq!(set.constants(), DEFAULT_CONSTANTS);
    }

    #[test]
    fn test_category_flags() {
        let full = build_registry(&COLUMNS, true, true).unwrap();
        assert!(full.get("ts_mean").is_some());
        assert!(full.get("cs_rank").is_some());

        let plain = build_registry(&COLUMNS, false, false).unwrap();
        assert!(plain.get("ts_mean").is_none());
        assert!(plain.get("cs_rank").is_none());
        assert!(plain.get("add").is_some());
        assert!(plain.get("abs").is_some());
        assert!(plain.len() < full.len());
    }

    #[test]
    fn test_missing_required_columns() {
        let err = build_registry(&["Close", "Volume"], true, true).unwrap_err();
        assert!(matches!(err, ForjaError::MissingColumn(c) if c == "return"));
        let err = build_registry(&["return"], true, true).unwrap_err();
        assert!(matches!(err, ForjaError::MissingColumn(c) if c == "Close"));
    }

    #[test]
    fn test_is_label_column() {
        assert!(is_label_column("fwd_return"));
        assert!(is_label_column("Forward_ret_1"));
        assert!(is_label_column("target"));
        assert!(!is_label_column("Close"));
        assert!(!is_label_column("return"));
    }

    #[test]
    fn test_typecheck() {
        let set = build_registry(&COLUMNS, true, true).unwrap();
        let tracker = DimensionTracker::default();

        let ok = parse_expr("div(mul(Close, Volume), Close)").unwrap();
        assert_eq!(set.typecheck(&ok, &tracker).unwrap(), Dimension::Volume);

        let rejected = parse_expr("add(Close, Volume)").unwrap();
        assert!(matches!(
            set.typecheck(&rejected, &tracker),
            Err(ForjaError::DimensionMismatch(_))
        ));

        let label = parse_expr("ts_mean(fwd_return_5, 5)").unwrap();
        assert!(matches!(set.typecheck(&label, &tracker), Err(ForjaError::UnknownColumn(_))));

        let bad_window = parse_expr("ts_mean(Close, Volume)").unwrap();
        assert!(set.typecheck(&bad_window, &tracker).is_err());

        let arity = parse_expr("ts_mean(Close)").unwrap();
        assert!(matches!(set.typecheck(&arity, &tracker), Err(ForjaError::Arity { .. })));
    }

    #[test]
    fn test_infer_dimension_uses_full_library() {
        let library = OperatorLibrary::with_defaults();
        let tracker = DimensionTracker::default();
        let expr = parse_expr("sanitize(clip(ts_zscore(sanitize(Close), 20), 3.0))").unwrap();
        assert_eq!(infer_dimension(&expr, &library, &tracker).unwrap(), Dimension::Ratio);
        let unknown = parse_expr("frobnicate(Close)").unwrap();
        assert!(matches!(
            infer_dimension(&unknown, &library, &tracker),
            Err(ForjaError::UnknownOperator(_))
        ));
    }
}
