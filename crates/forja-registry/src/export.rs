//! Standalone factor definitions.
//!
//! An exported factor names the panel columns it reads, carries its
//! normalization wrapper explicitly and documents its output dimension.
//! It can be computed directly, written as JSON, or rendered as a Rust
//! module that depends only on the `forja` crate.

use crate::normalize::{DEFAULT_CLIP_RANGE, NormalizationSpec};
use forja_expr::{DimensionTracker, ExpressionEvaluator, Expr, PrimitiveSet, infer_dimension, parse_expr};
use forja_ops::OperatorLibrary;
use forja_traits::{Dimension, ForjaError, Frame, Panel, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A panel column the factor reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorInput {
    /// Column name.
    pub name: String,
    /// Its dimension.
    pub dimension: Dimension,
}

/// A directly computable factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDefinition {
    /// Factor name.
    pub name: String,
    /// Full expression including the normalization wrapper.
    pub expression: Expr,
    /// Expression inside the wrapper.
    pub inner_expression: Expr,
    /// Wrapper parameters.
    pub normalization: NormalizationSpec,
    /// Columns read by the factor.
    pub inputs: Vec<FactorInput>,
    /// Dimension of the inner expression.
    pub inner_dimension: Dimension,
    /// Dimension of the normalized output.
    pub output_dimension: Dimension,
}

impl FactorDefinition {
    /// Builds a definition from expression text, full or inner.
    ///
    /// Inner expressions get their hash-derived window and the default clip
    /// bound. Every column must be a terminal of `primitives`.
    ///
    /// # Errors
    ///
    /// Fails on unparseable text, unknown columns or operators, and
    /// dimension violations.
    pub fn from_expression(
        name: impl Into<String>,
        text: &str,
        tracker: &DimensionTracker,
        primitives: &PrimitiveSet,
    ) -> Result<Self> {
        let parsed = parse_expr(text)?;
        let (inner, normalization) = NormalizationSpec::unwrap_full(&parsed).unwrap_or_else(|| {
            let spec = NormalizationSpec::derive(&parsed, DEFAULT_CLIP_RANGE);
            (parsed.clone(), spec)
        });

        let inputs = inner
            .columns()
            .into_iter()
            .map(|column| {
                primitives
                    .terminal_dimension(column)
                    .map(|dimension| FactorInput {
                        name: column.to_string(),
                        dimension,
                    })
                    .ok_or_else(|| ForjaError::UnknownColumn(column.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let inner_dimension = primitives.typecheck(&inner, tracker)?;
        let expression = normalization.wrap(&inner);
        let output_dimension =
            infer_dimension(&expression, &OperatorLibrary::with_defaults(), tracker)?;

        Ok(Self {
            name: name.into(),
            expression,
            inner_expression: inner,
            normalization,
            inputs,
            inner_dimension,
            output_dimension,
        })
    }

    /// Computes the factor over `inputs`.
    ///
    /// # Errors
    ///
    /// Returns [`ForjaError::MissingColumn`] for an absent input and any
    /// evaluation error.
    pub fn compute(&self, inputs: &Panel) -> Result<Frame> {
        if let Some(missing) = self.inputs.iter().find(|i| !inputs.has_column(&i.name)) {
            return Err(ForjaError::MissingColumn(missing.name.clone()));
        }
        let factor = ExpressionEvaluator::default().evaluate(
            &self.inner_expression,
            inputs,
            true,
            self.normalization.window,
            self.normalization.clip_range,
        )?;
        Ok(factor.into_frame())
    }

    /// Pretty JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads the JSON form back.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders a Rust module exposing the factor as constants and a
    /// `compute` function.
    pub fn render_rust(&self) -> String {
        RustModule(self).to_string()
    }
}

/// Display adapter that writes a [`FactorDefinition`] as Rust source.
struct RustModule<'a>(&'a FactorDefinition);

impl fmt::Display for RustModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let def = self.0;
        writeln!(f, "//! Factor `{}`.", def.name)?;
        writeln!(f, "//!")?;
        writeln!(f, "//! Inputs:")?;
        for input in &def.inputs {
            writeln!(f, "//! - `{}` ({})", input.name, input.dimension)?;
        }
        writeln!(
            f,
            "//!\n//! Inner dimension: {}. Output dimension: {}.",
            def.inner_dimension, def.output_dimension
        )?;
        writeln!(f)?;
        writeln!(f, "use forja::expr::{{ExpressionEvaluator, parse_expr}};")?;
        writeln!(f, "use forja::traits::{{Frame, Panel, Result}};")?;
        writeln!(f)?;
        writeln!(f, "/// Factor name.")?;
        writeln!(f, "pub const NAME: &str = {:?};", def.name)?;
        writeln!(f, "/// Full expression.")?;
        writeln!(f, "pub const EXPRESSION: &str = {:?};", def.expression.to_string())?;
        writeln!(f, "/// Expression inside the normalization wrapper.")?;
        writeln!(
            f,
            "pub const INNER_EXPRESSION: &str = {:?};",
            def.inner_expression.to_string()
        )?;
        writeln!(f, "/// Rolling z-score window.")?;
        writeln!(f, "pub const ZSCORE_WINDOW: usize = {};", def.normalization.window)?;
        writeln!(f, "/// Clip bound after z-scoring.")?;
        writeln!(f, "pub const CLIP_RANGE: f64 = {:?};", def.normalization.clip_range)?;
        let inputs: Vec<String> = def.inputs.iter().map(|i| format!("{:?}", i.name)).collect();
        writeln!(f, "/// Panel columns read by the factor.")?;
        writeln!(f, "pub const INPUTS: &[&str] = &[{}];", inputs.join(", "))?;
        writeln!(f)?;
        writeln!(f, "/// Computes `{}` over `panel`.", rust_ident(&def.name))?;
        writeln!(f, "pub fn compute(panel: &Panel) -> Result<Frame> {{")?;
        writeln!(f, "    let expr = parse_expr(INNER_EXPRESSION)?;")?;
        writeln!(f, "    let factor = ExpressionEvaluator::default()")?;
        writeln!(f, "        .evaluate(&expr, panel, true, ZSCORE_WINDOW, CLIP_RANGE)?;")?;
        writeln!(f, "    Ok(factor.into_frame())")?;
        writeln!(f, "}}")
    }
}

/// Lower snake case identifier for `name`.
fn rust_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
