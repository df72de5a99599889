//! Operator library for discovering and looking up available operators.
//!
//! This module provides metadata and discovery functionality for all
//! operators in the forja-ops library.

use forja_traits::{Arg, ArgKind, Operator, OperatorCategory, Result};
use ndarray::Array2;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Signature of a builtin operator implementation.
pub type OperatorFn = fn(&[Arg<'_>]) -> Result<Array2<f64>>;

/// An operator backed by a plain function.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOperator {
    name: &'static str,
    category: OperatorCategory,
    args: &'static [ArgKind],
    description: &'static str,
    func: OperatorFn,
}

impl BuiltinOperator {
    /// Creates a builtin operator.
    pub const fn new(
        name: &'static str,
        category: OperatorCategory,
        args: &'static [ArgKind],
        description: &'static str,
        func: OperatorFn,
    ) -> Self {
        Self {
            name,
            category,
            args,
            description,
            func,
        }
    }

    /// Human-readable description.
    pub const fn description(&self) -> &'static str {
        self.description
    }
}

impl Operator for BuiltinOperator {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> OperatorCategory {
        self.category
    }

    fn args(&self) -> &[ArgKind] {
        self.args
    }

    fn apply(&self, args: &[Arg<'_>]) -> Result<Array2<f64>> {
        if args.len() != self.args.len() {
            return Err(forja_traits::ForjaError::Arity {
                name: self.name.to_string(),
                expected: self.args.len(),
                actual: args.len(),
            });
        }
        (self.func)(args)
    }
}

/// Metadata about an operator.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorInfo {
    /// Unique identifier used in expression text
    pub name: &'static str,

    /// Category classification
    pub category: OperatorCategory,

    /// Number of arguments
    pub arity: usize,

    /// Human-readable description
    pub description: &'static str,
}

/// Get information about all builtin operators.
#[must_use]
pub fn available_operators() -> Vec<OperatorInfo> {
    builtin_operators()
        .into_iter()
        .map(|op| OperatorInfo {
            name: op.name,
            category: op.category,
            arity: op.args.len(),
            description: op.description,
        })
        .collect()
}

/// Get information about a specific operator by name.
#[must_use]
pub fn get_operator_info(name: &str) -> Option<OperatorInfo> {
    available_operators()
        .into_iter()
        .find(|info| info.name == name)
}

fn builtin_operators() -> Vec<BuiltinOperator> {
    let mut ops = crate::arithmetic::operators();
    ops.extend(crate::elementwise::operators());
    ops.extend(crate::time_series::operators());
    ops.extend(crate::cross_sectional::operators());
    ops
}

/// Registry of callable operators keyed by name.
#[derive(Debug, Default, Clone)]
pub struct OperatorLibrary {
    operators: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorLibrary {
    /// Create a new empty library.
    pub fn new() -> Self {
        Self {
            operators: BTreeMap::new(),
        }
    }

    /// Register all builtin operators.
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        for op in builtin_operators() {
            library.register(Arc::new(op));
        }
        library
    }

    /// Register an operator, replacing any operator with the same name.
    pub fn register(&mut self, op: Arc<dyn Operator>) {
        self.operators.insert(op.name().to_string(), op);
    }

    /// Get an operator by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.operators.get(name)
    }

    /// Iterate over operators in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Operator>> {
        self.operators.values()
    }

    /// All operators in a category.
    pub fn by_category(&self, category: OperatorCategory) -> Vec<&Arc<dyn Operator>> {
        self.operators
            .values()
            .filter(|op| op.category() == category)
            .collect()
    }

    /// Operator names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.operators.keys().map(String::as_str).collect()
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_operators() {
        let ops = available_operators();
        assert!(!ops.is_empty());

        let categories: Vec<_> = ops.iter().map(|o| o.category).collect();
        assert!(categories.contains(&OperatorCategory::Arithmetic));
        assert!(categories.contains(&OperatorCategory::Elementwise));
        assert!(categories.contains(&OperatorCategory::TimeSeries));
        assert!(categories.contains(&OperatorCategory::CrossSectional));
    }

    #[test]
    fn test_operator_names_are_unique() {
        let ops = available_operators();
        let library = OperatorLibrary::with_defaults();
        assert_eq!(library.len(), ops.len());
    }

    #[test]
    fn test_get_operator_info() {
        let info = get_operator_info("ts_mean").unwrap();
        assert_eq!(info.arity, 2);
        assert_eq!(info.category, OperatorCategory::TimeSeries);

        assert!(get_operator_info("nonexistent_operator").is_none());
    }

    #[test]
    fn test_library_by_category() {
        let library = OperatorLibrary::with_defaults();
        let cs = library.by_category(OperatorCategory::CrossSectional);
        assert!(cs.iter().any(|op| op.name() == "cs_rank"));
        assert!(cs.iter().all(|op| op.category() == OperatorCategory::CrossSectional));
    }

    #[test]
    fn test_apply_checks_arity() {
        let library = OperatorLibrary::with_defaults();
        let add = library.get("add").unwrap();
        let x = Array2::<f64>::zeros((2, 2));
        let result = add.apply(&[Arg::Series(x.view())]);
        assert!(matches!(
            result,
            Err(forja_traits::ForjaError::Arity { expected: 2, actual: 1, .. })
        ));
    }
}
