//! Aggregation engine: reduces filtered disbursal rows into per-dimension
//! totals and comparative metrics.
//!
//! Every ratio guards its zero denominator by returning 0. Callers never
//! branch on an error for these paths; zero is a valid answer.

use crate::{
    config::DashConfig,
    prior_period::{FixedFactor, PriorPeriodSource},
    rows::DisbursalSummaryRow,
    types::{pct_or_zero, LenderName},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ── Public types ─────────────────────────────────────────────────────────────

/// Raw summed counts for one group, before any ratio is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupCounts {
    pub child_leads:    u64,
    pub disbursed:      u64,
    /// Sum of per-row LMTD values, each rounded independently.
    pub lmtd_disbursed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderAggregate {
    pub lender:         LenderName,
    pub disbursed:      u64,
    pub amount_cr:      f64,
    pub lmtd_disbursed: u64,
    pub lmtd_amount_cr: f64,
    pub child_leads:    u64,
    pub conv_pct:       f64,
    /// Annual operating plan in Cr, 0 when the lender has none.
    pub aop_target_cr:  f64,
    pub growth_pct:     f64,
    pub share_pct:      f64,
}

/// Same arithmetic as `LenderAggregate`, keyed by product type or flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAggregate {
    pub key:            String,
    pub disbursed:      u64,
    pub lmtd_disbursed: u64,
    pub child_leads:    u64,
    pub conv_pct:       f64,
    pub growth_pct:     f64,
    pub share_pct:      f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub lender_count:   usize,
    pub disbursed:      u64,
    pub lmtd_disbursed: u64,
    pub child_leads:    u64,
    pub amount_cr:      f64,
    pub lmtd_amount_cr: f64,
    pub conv_pct:       f64,
    pub growth_pct:     f64,
    pub aop_target_cr:  f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LenderSortColumn {
    Lender,
    Disbursed,
    Amount,
    ChildLeads,
    Conversion,
    Growth,
    Share,
    AopTarget,
}

// ── Grouping ─────────────────────────────────────────────────────────────────

/// Sum rows into groups keyed by `key`. LMTD is taken per row from
/// `source` before summing.
pub fn group_rows<K, F>(
    rows: &[DisbursalSummaryRow],
    source: &dyn PriorPeriodSource,
    key: F,
) -> BTreeMap<K, GroupCounts>
where
    K: Ord,
    F: Fn(&DisbursalSummaryRow) -> K,
{
    let mut groups: BTreeMap<K, GroupCounts> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(key(row)).or_default();
        acc.child_leads += row.child_leads;
        acc.disbursed += row.disbursed;
        acc.lmtd_disbursed += source.lmtd_disbursed(row);
    }
    groups
}

pub fn growth_pct(current: u64, prior: u64) -> f64 {
    pct_or_zero(current as f64 - prior as f64, prior as f64)
}

// ── Lender aggregates ────────────────────────────────────────────────────────

/// Group by lender with a single LMTD multiplier.
pub fn aggregate_by_lender(
    rows: &[DisbursalSummaryRow],
    lmtd_factor: f64,
    config: &DashConfig,
) -> Vec<LenderAggregate> {
    aggregate_by_lender_with(rows, &FixedFactor(lmtd_factor), config)
}

/// Group by lender with any prior-period source.
pub fn aggregate_by_lender_with(
    rows: &[DisbursalSummaryRow],
    source: &dyn PriorPeriodSource,
    config: &DashConfig,
) -> Vec<LenderAggregate> {
    let groups = group_rows(rows, source, |r| r.lender.clone());
    log::debug!(
        "aggregation: {} rows -> {} lenders (prior={})",
        rows.len(),
        groups.len(),
        source.name()
    );
    build_lender_aggregates(groups, config)
}

/// Derive ratios and shares from already-summed lender counts.
/// Result is sorted by disbursed descending, ties by lender name.
pub fn build_lender_aggregates<I>(counts: I, config: &DashConfig) -> Vec<LenderAggregate>
where
    I: IntoIterator<Item = (LenderName, GroupCounts)>,
{
    let counts: Vec<(LenderName, GroupCounts)> = counts.into_iter().collect();
    let total: u64 = counts.iter().map(|(_, c)| c.disbursed).sum();

    let mut out: Vec<LenderAggregate> = counts
        .into_iter()
        .map(|(lender, c)| LenderAggregate {
            amount_cr:      config.amount_cr(c.disbursed),
            lmtd_amount_cr: config.amount_cr(c.lmtd_disbursed),
            conv_pct:       pct_or_zero(c.disbursed as f64, c.child_leads as f64),
            aop_target_cr:  config.aop_targets_cr.get(&lender).copied().unwrap_or(0.0),
            growth_pct:     growth_pct(c.disbursed, c.lmtd_disbursed),
            share_pct:      pct_or_zero(c.disbursed as f64, total as f64),
            disbursed:      c.disbursed,
            lmtd_disbursed: c.lmtd_disbursed,
            child_leads:    c.child_leads,
            lender,
        })
        .collect();

    out.sort_by(|a, b| {
        b.disbursed
            .cmp(&a.disbursed)
            .then_with(|| a.lender.cmp(&b.lender))
    });
    out
}

// ── Other dimensions ─────────────────────────────────────────────────────────

pub fn aggregate_by_product(
    rows: &[DisbursalSummaryRow],
    source: &dyn PriorPeriodSource,
) -> Vec<DimensionAggregate> {
    build_dimension_aggregates(group_rows(rows, source, |r| r.product_type.clone()))
}

pub fn aggregate_by_flow(
    rows: &[DisbursalSummaryRow],
    source: &dyn PriorPeriodSource,
) -> Vec<DimensionAggregate> {
    build_dimension_aggregates(group_rows(rows, source, |r| r.flow.clone()))
}

fn build_dimension_aggregates(groups: BTreeMap<String, GroupCounts>) -> Vec<DimensionAggregate> {
    let total: u64 = groups.values().map(|c| c.disbursed).sum();
    let mut out: Vec<DimensionAggregate> = groups
        .into_iter()
        .map(|(key, c)| DimensionAggregate {
            key,
            disbursed:      c.disbursed,
            lmtd_disbursed: c.lmtd_disbursed,
            child_leads:    c.child_leads,
            conv_pct:       pct_or_zero(c.disbursed as f64, c.child_leads as f64),
            growth_pct:     growth_pct(c.disbursed, c.lmtd_disbursed),
            share_pct:      pct_or_zero(c.disbursed as f64, total as f64),
        })
        .collect();
    out.sort_by(|a, b| b.disbursed.cmp(&a.disbursed).then_with(|| a.key.cmp(&b.key)));
    out
}

// ── Totals ───────────────────────────────────────────────────────────────────

pub fn portfolio_totals(aggregates: &[LenderAggregate]) -> PortfolioTotals {
    let mut t = PortfolioTotals {
        lender_count: aggregates.len(),
        ..PortfolioTotals::default()
    };
    for a in aggregates {
        t.disbursed += a.disbursed;
        t.lmtd_disbursed += a.lmtd_disbursed;
        t.child_leads += a.child_leads;
        t.amount_cr += a.amount_cr;
        t.lmtd_amount_cr += a.lmtd_amount_cr;
        t.aop_target_cr += a.aop_target_cr;
    }
    t.conv_pct = pct_or_zero(t.disbursed as f64, t.child_leads as f64);
    t.growth_pct = growth_pct(t.disbursed, t.lmtd_disbursed);
    t
}

// ── Table sorting ────────────────────────────────────────────────────────────

/// Sort for the lender table. Ties always fall back to lender name
/// ascending so the order is stable across recomputations.
pub fn sort_lenders(
    aggregates: &[LenderAggregate],
    column: LenderSortColumn,
    descending: bool,
) -> Vec<LenderAggregate> {
    let mut sorted = aggregates.to_vec();
    sorted.sort_by(|a, b| {
        let primary = compare_by(a, b, column);
        let primary = if descending { primary.reverse() } else { primary };
        primary.then_with(|| a.lender.cmp(&b.lender))
    });
    sorted
}

fn compare_by(a: &LenderAggregate, b: &LenderAggregate, column: LenderSortColumn) -> Ordering {
    match column {
        LenderSortColumn::Lender     => a.lender.cmp(&b.lender),
        LenderSortColumn::Disbursed  => a.disbursed.cmp(&b.disbursed),
        LenderSortColumn::Amount     => a.amount_cr.total_cmp(&b.amount_cr),
        LenderSortColumn::ChildLeads => a.child_leads.cmp(&b.child_leads),
        LenderSortColumn::Conversion => a.conv_pct.total_cmp(&b.conv_pct),
        LenderSortColumn::Growth     => a.growth_pct.total_cmp(&b.growth_pct),
        LenderSortColumn::Share      => a.share_pct.total_cmp(&b.share_pct),
        LenderSortColumn::AopTarget  => a.aop_target_cr.total_cmp(&b.aop_target_cr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lender: &str, product: &str, leads: u64, disbursed: u64) -> DisbursalSummaryRow {
        DisbursalSummaryRow {
            product_type: product.into(),
            flow: "auto".into(),
            lender: lender.into(),
            child_leads: leads,
            disbursed,
            disbursal_pct: 0.0,
        }
    }

    #[test]
    fn lmtd_is_rounded_per_row_before_summing() {
        // 3 rows of 1 × 0.6 round to 1 each -> 3, not round(1.8) = 2.
        let rows = vec![
            row("Axis", "bl", 10, 1),
            row("Axis", "bl", 10, 1),
            row("Axis", "bl", 10, 1),
        ];
        let aggs = aggregate_by_lender(&rows, 0.6, &DashConfig::default_test());
        assert_eq!(aggs[0].disbursed, 3);
        assert_eq!(aggs[0].lmtd_disbursed, 3);
        assert_eq!(aggs[0].growth_pct, 0.0);
    }

    #[test]
    fn result_is_sorted_by_disbursed_descending() {
        let rows = vec![
            row("Piramal", "bl", 100, 10),
            row("Axis", "bl", 100, 40),
            row("HDFC", "bl", 100, 25),
        ];
        let aggs = aggregate_by_lender(&rows, 1.0, &DashConfig::default_test());
        let order: Vec<&str> = aggs.iter().map(|a| a.lender.as_str()).collect();
        assert_eq!(order, ["Axis", "HDFC", "Piramal"]);
    }

    #[test]
    fn zero_child_leads_gives_zero_conversion() {
        let rows = vec![row("Axis", "bl", 0, 0)];
        let aggs = aggregate_by_lender(&rows, 0.9, &DashConfig::default_test());
        assert_eq!(aggs[0].conv_pct, 0.0);
        assert_eq!(aggs[0].share_pct, 0.0);
        assert_eq!(aggs[0].growth_pct, 0.0);
    }

    #[test]
    fn aop_lookup_and_amounts_come_from_config() {
        let config = DashConfig::default_test();
        let rows = vec![row("Axis", "bl", 400, 100), row("Unlisted", "bl", 100, 50)];
        let aggs = aggregate_by_lender(&rows, 0.5, &config);

        assert_eq!(aggs[0].aop_target_cr, 1_200.0);
        assert!((aggs[0].amount_cr - 2.0).abs() < 1e-9);
        assert!((aggs[0].lmtd_amount_cr - 1.0).abs() < 1e-9);
        assert_eq!(aggs[1].aop_target_cr, 0.0);
    }

    #[test]
    fn product_dimension_shares_sum_to_hundred() {
        let rows = vec![
            row("Axis", "bl", 100, 30),
            row("HDFC", "pl", 100, 10),
            row("IDFC", "bl", 100, 10),
        ];
        let dims = aggregate_by_product(&rows, &FixedFactor(1.0));
        assert_eq!(dims[0].key, "bl");
        assert_eq!(dims[0].disbursed, 40);
        let sum: f64 = dims.iter().map(|d| d.share_pct).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn totals_sum_lender_figures() {
        let rows = vec![row("Axis", "bl", 200, 100), row("HDFC", "bl", 300, 50)];
        let aggs = aggregate_by_lender(&rows, 0.5, &DashConfig::default_test());
        let t = portfolio_totals(&aggs);

        assert_eq!(t.lender_count, 2);
        assert_eq!(t.disbursed, 150);
        assert_eq!(t.lmtd_disbursed, 75);
        assert_eq!(t.conv_pct, 30.0);
        assert_eq!(t.growth_pct, 100.0);
    }

    #[test]
    fn sort_by_growth_ascending_breaks_ties_by_name() {
        let config = DashConfig::default_test();
        let counts = vec![
            ("B".to_string(), GroupCounts { child_leads: 10, disbursed: 10, lmtd_disbursed: 10 }),
            ("A".to_string(), GroupCounts { child_leads: 10, disbursed: 20, lmtd_disbursed: 20 }),
            ("C".to_string(), GroupCounts { child_leads: 10, disbursed: 5, lmtd_disbursed: 10 }),
        ];
        let aggs = build_lender_aggregates(counts, &config);
        let sorted = sort_lenders(&aggs, LenderSortColumn::Growth, false);
        let order: Vec<&str> = sorted.iter().map(|a| a.lender.as_str()).collect();
        assert_eq!(order, ["C", "A", "B"]);
    }
}
