//! Prior-period (LMTD) sources.
//!
//! The disbursal snapshot carries MTD figures only. LMTD figures are
//! produced per row by a `PriorPeriodSource`, so the factor-based
//! placeholder can be swapped for observed prior-month data without
//! touching the aggregation code.
//!
//! RULE: sources work at row granularity. Aggregates sum the
//! per-row results; they never scale a pre-summed total.

use crate::{config::LmtdConfig, rows::DisbursalSummaryRow, types::LenderName};
use std::collections::BTreeMap;

pub trait PriorPeriodSource {
    /// Stable name for logging.
    fn name(&self) -> &'static str;

    /// LMTD disbursal count for the same slice as `row`.
    fn lmtd_disbursed(&self, row: &DisbursalSummaryRow) -> u64;
}

/// One multiplier for every row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFactor(pub f64);

impl PriorPeriodSource for FixedFactor {
    fn name(&self) -> &'static str {
        "fixed_factor"
    }

    fn lmtd_disbursed(&self, row: &DisbursalSummaryRow) -> u64 {
        scale_count(row.disbursed, self.0)
    }
}

/// Per-lender multipliers with a default for unlisted lenders.
#[derive(Debug, Clone, PartialEq)]
pub struct LenderFactors {
    pub default_factor: f64,
    pub factors: BTreeMap<LenderName, f64>,
}

impl LenderFactors {
    pub fn from_config(config: &LmtdConfig) -> Self {
        Self {
            default_factor: config.default_factor,
            factors: config.lender_factors.clone(),
        }
    }
}

impl PriorPeriodSource for LenderFactors {
    fn name(&self) -> &'static str {
        "lender_factors"
    }

    fn lmtd_disbursed(&self, row: &DisbursalSummaryRow) -> u64 {
        let factor = self
            .factors
            .get(&row.lender)
            .copied()
            .unwrap_or(self.default_factor);
        scale_count(row.disbursed, factor)
    }
}

/// Observed LMTD counts keyed by (lender, product_type, flow).
/// Slices with no observation count as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedPrior {
    pub counts: BTreeMap<(LenderName, String, String), u64>,
}

impl ObservedPrior {
    pub fn insert(&mut self, lender: &str, product_type: &str, flow: &str, lmtd: u64) {
        self.counts
            .insert((lender.into(), product_type.into(), flow.into()), lmtd);
    }
}

impl PriorPeriodSource for ObservedPrior {
    fn name(&self) -> &'static str {
        "observed"
    }

    fn lmtd_disbursed(&self, row: &DisbursalSummaryRow) -> u64 {
        self.counts
            .get(&(row.lender.clone(), row.product_type.clone(), row.flow.clone()))
            .copied()
            .unwrap_or(0)
    }
}

/// round(count × factor), clamped at zero.
pub fn scale_count(count: u64, factor: f64) -> u64 {
    let scaled = (count as f64 * factor).round();
    if scaled <= 0.0 {
        0
    } else {
        scaled as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lender: &str, disbursed: u64) -> DisbursalSummaryRow {
        DisbursalSummaryRow {
            product_type: "bl".into(),
            flow: "auto".into(),
            lender: lender.into(),
            child_leads: disbursed * 4,
            disbursed,
            disbursal_pct: 25.0,
        }
    }

    #[test]
    fn fixed_factor_rounds_per_row() {
        assert_eq!(FixedFactor(0.85).lmtd_disbursed(&row("A", 3)), 3); // 2.55
        assert_eq!(FixedFactor(0.85).lmtd_disbursed(&row("A", 1)), 1); // 0.85
        assert_eq!(FixedFactor(0.0).lmtd_disbursed(&row("A", 10)), 0);
    }

    #[test]
    fn lender_factor_falls_back_to_default() {
        let mut factors = BTreeMap::new();
        factors.insert("Axis".to_string(), 0.5);
        let source = LenderFactors { default_factor: 0.9, factors };

        assert_eq!(source.lmtd_disbursed(&row("Axis", 100)), 50);
        assert_eq!(source.lmtd_disbursed(&row("HDFC", 100)), 90);
    }

    #[test]
    fn observed_prior_treats_missing_slice_as_zero() {
        let mut source = ObservedPrior::default();
        source.insert("Axis", "bl", "auto", 42);

        assert_eq!(source.lmtd_disbursed(&row("Axis", 100)), 42);
        assert_eq!(source.lmtd_disbursed(&row("HDFC", 100)), 0);
    }
}
