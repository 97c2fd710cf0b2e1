//! Concentration analysis: how disbursal volume is spread across lenders.

use crate::{
    aggregation::LenderAggregate,
    types::{pct_or_zero, LenderName},
};
use serde::{Deserialize, Serialize};

pub const HHI_HIGH_THRESHOLD: f64 = 2_500.0;
pub const HHI_MODERATE_THRESHOLD: f64 = 1_500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub lender:           LenderName,
    pub share:            f64,
    pub cumulative_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareShift {
    pub lender:     LenderName,
    pub mtd_share:  f64,
    pub lmtd_share: f64,
    /// mtd_share − lmtd_share, in percentage points.
    pub shift_pp:   f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    High,
    Moderate,
    Low,
}

impl ConcentrationLevel {
    /// >2500 high, 1500..=2500 moderate, <1500 low.
    pub fn classify(hhi: f64) -> Self {
        if hhi > HHI_HIGH_THRESHOLD {
            Self::High
        } else if hhi >= HHI_MODERATE_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High     => "highly concentrated",
            Self::Moderate => "moderately concentrated",
            Self::Low      => "low concentration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationSnapshot {
    pub pareto:          Vec<ParetoPoint>,
    /// Σ share², on the 0–10000 scale.
    pub hhi:             f64,
    pub level:           ConcentrationLevel,
    /// Sorted by |shift_pp| descending.
    pub share_shifts:    Vec<ShareShift>,
    pub top3_share:      f64,
    pub growing_count:   usize,
    pub declining_count: usize,
}

/// Accepts aggregates in any order. Pareto and top-3 rank lenders by
/// disbursed descending, ties by name.
pub fn compute_concentration(aggregates: &[LenderAggregate]) -> ConcentrationSnapshot {
    let mut ranked: Vec<&LenderAggregate> = aggregates.iter().collect();
    ranked.sort_by(|a, b| {
        b.disbursed
            .cmp(&a.disbursed)
            .then_with(|| a.lender.cmp(&b.lender))
    });

    let mut cumulative = 0.0;
    let pareto = ranked
        .iter()
        .map(|a| {
            cumulative += a.share_pct;
            ParetoPoint {
                lender: a.lender.clone(),
                share: a.share_pct,
                cumulative_share: cumulative,
            }
        })
        .collect();

    let hhi: f64 = aggregates.iter().map(|a| a.share_pct * a.share_pct).sum();

    let lmtd_total: u64 = aggregates.iter().map(|a| a.lmtd_disbursed).sum();
    let mut share_shifts: Vec<ShareShift> = aggregates
        .iter()
        .map(|a| {
            let lmtd_share = pct_or_zero(a.lmtd_disbursed as f64, lmtd_total as f64);
            ShareShift {
                lender: a.lender.clone(),
                mtd_share: a.share_pct,
                lmtd_share,
                shift_pp: a.share_pct - lmtd_share,
            }
        })
        .collect();
    share_shifts.sort_by(|a, b| {
        b.shift_pp
            .abs()
            .total_cmp(&a.shift_pp.abs())
            .then_with(|| a.lender.cmp(&b.lender))
    });

    let top3_share = ranked.iter().take(3).map(|a| a.share_pct).sum();
    let growing_count = aggregates.iter().filter(|a| a.growth_pct > 0.0).count();
    let declining_count = aggregates.iter().filter(|a| a.growth_pct < 0.0).count();

    ConcentrationSnapshot {
        pareto,
        hhi,
        level: ConcentrationLevel::classify(hhi),
        share_shifts,
        top3_share,
        growing_count,
        declining_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(ConcentrationLevel::classify(2_500.1), ConcentrationLevel::High);
        assert_eq!(ConcentrationLevel::classify(2_500.0), ConcentrationLevel::Moderate);
        assert_eq!(ConcentrationLevel::classify(1_500.0), ConcentrationLevel::Moderate);
        assert_eq!(ConcentrationLevel::classify(1_499.9), ConcentrationLevel::Low);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let snap = compute_concentration(&[]);
        assert!(snap.pareto.is_empty());
        assert_eq!(snap.hhi, 0.0);
        assert_eq!(snap.top3_share, 0.0);
        assert_eq!(snap.level, ConcentrationLevel::Low);
    }

    fn agg(lender: &str, disbursed: u64, share_pct: f64) -> LenderAggregate {
        LenderAggregate {
            lender: lender.into(),
            disbursed,
            amount_cr: 0.0,
            lmtd_disbursed: disbursed,
            lmtd_amount_cr: 0.0,
            child_leads: disbursed * 5,
            conv_pct: 20.0,
            aop_target_cr: 0.0,
            growth_pct: 0.0,
            share_pct,
        }
    }

    #[test]
    fn unsorted_input_ranks_by_volume() {
        // Name-descending order puts the largest lender last.
        let aggs = vec![agg("D", 100, 10.0), agg("C", 100, 10.0), agg("B", 100, 10.0), agg("A", 700, 70.0)];
        let snap = compute_concentration(&aggs);

        assert!((snap.top3_share - 90.0).abs() < 1e-9);
        let order: Vec<&str> = snap.pareto.iter().map(|p| p.lender.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
        assert!((snap.pareto[0].cumulative_share - 70.0).abs() < 1e-9);
    }
}
