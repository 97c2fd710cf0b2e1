//! Trend synthesizer: a six-period series derived from one snapshot total.
//!
//! No historical snapshots exist, so earlier periods are the current
//! total scaled by fixed factors. The last factor is the current period.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label:  String,
    pub factor: f64,
    pub value:  f64,
}

/// Relative labels: "M-5" … "M0".
pub fn synthesize_trend(total: f64, factors: &[f64]) -> Vec<TrendPoint> {
    let last = factors.len().saturating_sub(1);
    factors
        .iter()
        .enumerate()
        .map(|(i, &factor)| {
            let back = last - i;
            TrendPoint {
                label: if back == 0 { "M0".to_string() } else { format!("M-{back}") },
                factor,
                value: total * factor,
            }
        })
        .collect()
}

/// Same as `synthesize_trend` with each value rounded to a whole count.
pub fn synthesize_count_trend(total: u64, factors: &[f64]) -> Vec<TrendPoint> {
    synthesize_trend(total as f64, factors)
        .into_iter()
        .map(|p| TrendPoint { value: p.value.round(), ..p })
        .collect()
}

/// Labels each point with its calendar month, ending at `anchor`'s month.
pub fn synthesize_monthly_trend(total: f64, factors: &[f64], anchor: NaiveDate) -> Vec<TrendPoint> {
    let last = factors.len().saturating_sub(1);
    synthesize_trend(total, factors)
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let back = (last - i) as u32;
            let label = anchor
                .checked_sub_months(Months::new(back))
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or(p.label);
            TrendPoint { label, ..p }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORS: [f64; 6] = [0.78, 0.84, 0.89, 0.93, 0.97, 1.0];

    #[test]
    fn last_point_equals_snapshot_total() {
        let series = synthesize_count_trend(1_000, &FACTORS);
        assert_eq!(series.len(), 6);
        assert_eq!(series[5].value, 1_000.0);
        assert_eq!(series[5].label, "M0");
        assert_eq!(series[0].label, "M-5");
        assert_eq!(series[0].value, 780.0);
    }

    #[test]
    fn count_trend_rounds_each_point() {
        let series = synthesize_count_trend(7, &FACTORS);
        // 7 × 0.78 = 5.46
        assert_eq!(series[0].value, 5.0);
    }

    #[test]
    fn monthly_labels_walk_back_from_anchor() {
        let anchor = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        let series = synthesize_monthly_trend(10.0, &FACTORS, anchor);
        assert_eq!(series[0].label, "Sep 2025");
        assert_eq!(series[5].label, "Feb 2026");
    }
}
