//! Semantic unit tags for panel columns and operator outputs.
//!
//! The rules that combine dimensions live in the expression crate; this module
//! only defines the tags so that operators can declare which inputs they
//! accept.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Semantic unit of a financial quantity.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    /// Prices (open, high, low, close, vwap).
    #[display("PRICE")]
    Price,
    /// Traded base-asset volume.
    #[display("VOLUME")]
    Volume,
    /// Notional traded (price × volume).
    #[display("QUOTE_VOLUME")]
    QuoteVolume,
    /// Simple returns.
    #[display("RETURN")]
    Return,
    /// Dimensionless ratios, ranks and scores.
    #[display("RATIO")]
    Ratio,
    /// Numeric constants.
    #[display("SCALAR")]
    Scalar,
    /// Positions in time, such as the bar offset of a rolling maximum.
    #[display("TIME")]
    Time,
    /// Counts (number of trades, observations).
    #[display("COUNT")]
    Count,
    /// Unknown unit, compatible with everything.
    #[display("ANY")]
    Any,
}

impl Dimension {
    /// All dimensions in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Price,
        Self::Volume,
        Self::QuoteVolume,
        Self::Return,
        Self::Ratio,
        Self::Scalar,
        Self::Time,
        Self::Count,
        Self::Any,
    ];

    /// Returns whether values of this dimension carry no physical unit.
    pub const fn is_dimensionless(self) -> bool {
        matches!(self, Self::Ratio | Self::Return)
    }

    /// Returns whether this dimension is neutral in arithmetic.
    pub const fn is_neutral(self) -> bool {
        matches!(self, Self::Scalar | Self::Any)
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of accepted dimensions for one operator argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionSet(u16);

impl DimensionSet {
    /// Accepts every dimension.
    pub const ALL: Self = Self::of(&Dimension::ALL);

    /// Accepts every dimension except [`Dimension::Time`].
    pub const NUMERIC: Self = Self::of(&[
        Dimension::Price,
        Dimension::Volume,
        Dimension::QuoteVolume,
        Dimension::Return,
        Dimension::Ratio,
        Dimension::Scalar,
        Dimension::Count,
        Dimension::Any,
    ]);

    /// Builds a set from a list of dimensions.
    pub const fn of(dims: &[Dimension]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < dims.len() {
            bits |= dims[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Returns whether `dim` is accepted.
    ///
    /// [`Dimension::Any`] is accepted by every non-empty set.
    pub const fn contains(self, dim: Dimension) -> bool {
        if self.0 == 0 {
            return false;
        }
        matches!(dim, Dimension::Any) || self.0 & dim.bit() != 0
    }

    /// Lists the members in declaration order.
    pub fn members(self) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| self.0 & d.bit() != 0)
            .collect()
    }
}
