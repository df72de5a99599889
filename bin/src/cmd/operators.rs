//! Operators command implementation.

use anyhow::Result;
use forja::ops::{OperatorLibrary, get_operator_info};
use forja::traits::{ArgKind, Operator};
use std::sync::Arc;

/// List the operators available to the search.
pub(crate) fn list_operators(category: Option<&str>) -> Result<()> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Available Operators                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let library = OperatorLibrary::with_defaults();
    let mut operators: Vec<&Arc<dyn Operator>> = library
        .iter()
        .filter(|op| category.is_none_or(|c| op.category().to_string().eq_ignore_ascii_case(c)))
        .collect();
    operators.sort_by(|a, b| {
        (a.category().to_string(), a.name()).cmp(&(b.category().to_string(), b.name()))
    });

    if operators.is_empty() {
        println!("No operators found for category: {}", category.unwrap_or("all"));
        return Ok(());
    }

    let mut current: Option<String> = None;
    for op in &operators {
        let category = op.category().to_string();
        if current.as_deref() != Some(category.as_str()) {
            println!("\n{}", category.to_uppercase());
            println!("{}", "─".repeat(60));
            current = Some(category);
        }
        let description = get_operator_info(op.name()).map_or("", |info| info.description);
        println!("  {:<16} {:<28} {}", op.name(), signature(op.args()), description);
    }

    println!("\nTotal: {} operators", operators.len());
    Ok(())
}

fn signature(args: &[ArgKind]) -> String {
    let kinds: Vec<&str> = args
        .iter()
        .map(|arg| match arg {
            ArgKind::Series(_) => "series",
            ArgKind::Window => "window",
            ArgKind::Constant => "constant",
        })
        .collect();
    format!("({})", kinds.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let library = OperatorLibrary::with_defaults();
        let ts_mean = library.get("ts_mean").unwrap();
        assert_eq!(signature(ts_mean.args()), "(series, window)");
        let clip = library.get("clip").unwrap();
        assert_eq!(signature(clip.args()), "(series, constant)");
    }

    #[test]
    fn test_unknown_category_is_not_an_error() {
        list_operators(Some("nonexistent")).unwrap();
    }
}
