//! Shared primitive types used across the entire analytics core.

use serde::{Deserialize, Serialize};

/// A lender's display name. Lenders are keyed by name everywhere.
pub type LenderName = String;

/// Integer position of a major funnel stage. Gaps are valid.
pub type MajorIndex = u32;

/// Monotonic counter bumped every time the source rows are replaced.
pub type DataVersion = u64;

/// Which half of the MTD/LMTD comparison pair a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MonthStart {
    #[serde(rename = "1.MTD")]
    Mtd,
    #[serde(rename = "2.LMTD")]
    Lmtd,
}

impl MonthStart {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mtd  => "1.MTD",
            Self::Lmtd => "2.LMTD",
        }
    }
}

/// Percentage `num / den × 100`, or 0 when the denominator is zero.
pub fn pct_or_zero(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den * 100.0
    }
}

/// Percentage `num / den × 100`, or `None` when the denominator is zero.
pub fn pct_or_none(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den * 100.0)
    }
}

/// Difference of two optional percentages, absent if either side is.
pub fn delta_pp(mtd: Option<f64>, lmtd: Option<f64>) -> Option<f64> {
    match (mtd, lmtd) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    }
}
