use lendlens_core::{
    aggregation::{aggregate_by_lender, aggregate_by_lender_with, build_lender_aggregates, GroupCounts},
    concentration::compute_concentration,
    config::DashConfig,
    prior_period::ObservedPrior,
    rows::DisbursalSummaryRow,
};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn row(lender: &str, child_leads: u64, disbursed: u64) -> DisbursalSummaryRow {
    DisbursalSummaryRow {
        product_type:  "business_loan".into(),
        flow:          "auto".into(),
        lender:        lender.into(),
        child_leads,
        disbursed,
        disbursal_pct: 0.0,
    }
}

fn counts(disbursed: u64, lmtd: u64) -> GroupCounts {
    GroupCounts { child_leads: disbursed * 4, disbursed, lmtd_disbursed: lmtd }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two lenders, 100 vs 80 LMTD and 50 vs 60 LMTD.
/// Growth and shares follow directly; one grows, one declines.
#[test]
fn two_lender_growth_and_share() {
    let config = DashConfig::default_test();
    let aggs = build_lender_aggregates(
        vec![("L1".to_string(), counts(100, 80)), ("L2".to_string(), counts(50, 60))],
        &config,
    );

    assert_eq!(aggs[0].lender, "L1");
    assert!((aggs[0].growth_pct - 25.0).abs() < 1e-9);
    assert!((aggs[0].share_pct - 66.666_666).abs() < 1e-3);
    assert!((aggs[1].growth_pct - -16.666_666).abs() < 1e-3);
    assert!((aggs[1].share_pct - 33.333_333).abs() < 1e-3);

    let snap = compute_concentration(&aggs);
    assert_eq!(snap.growing_count, 1);
    assert_eq!(snap.declining_count, 1);
}

/// The same scenario driven from rows through an observed LMTD source.
#[test]
fn observed_prior_source_reaches_aggregates() {
    let config = DashConfig::default_test();
    let mut prior = ObservedPrior::default();
    prior.insert("L1", "business_loan", "auto", 80);
    prior.insert("L2", "business_loan", "auto", 60);

    let rows = vec![row("L1", 400, 100), row("L2", 200, 50)];
    let aggs = aggregate_by_lender_with(&rows, &prior, &config);

    assert_eq!(aggs[0].lmtd_disbursed, 80);
    assert_eq!(aggs[1].lmtd_disbursed, 60);
    assert!((aggs[0].growth_pct - 25.0).abs() < 1e-9);
}

/// A single lender with no child leads converts at 0, not NaN.
#[test]
fn zero_child_leads_converts_at_zero() {
    let aggs = aggregate_by_lender(&[row("Solo", 0, 0)], 0.9, &DashConfig::default_test());

    assert_eq!(aggs.len(), 1);
    assert_eq!(aggs[0].conv_pct, 0.0);
    assert!(!aggs[0].conv_pct.is_nan());
}

/// LMTD of zero yields growth of exactly 0 rather than infinity.
#[test]
fn zero_lmtd_growth_is_zero() {
    let aggs = build_lender_aggregates(
        vec![("New".to_string(), counts(40, 0))],
        &DashConfig::default_test(),
    );
    assert_eq!(aggs[0].growth_pct, 0.0);
}

/// A lender split across several rows is rounded row by row.
/// 5 rows × round(3 × 0.9 = 2.7 -> 3) = 15, whereas round(15 × 0.9) = 14.
#[test]
fn lmtd_total_is_sum_of_rounded_rows() {
    let rows: Vec<_> = (0..5).map(|_| row("Axis", 10, 3)).collect();
    let aggs = aggregate_by_lender(&rows, 0.9, &DashConfig::default_test());
    assert_eq!(aggs[0].lmtd_disbursed, 15);
}

proptest! {
    /// Shares sum to 100 whenever anything was disbursed; all 0 otherwise.
    #[test]
    fn shares_sum_to_hundred(disbursed in proptest::collection::vec(0u64..5_000, 1..12)) {
        let rows: Vec<_> = disbursed
            .iter()
            .enumerate()
            .map(|(i, d)| row(&format!("lender-{i}"), d * 3, *d))
            .collect();
        let aggs = aggregate_by_lender(&rows, 0.92, &DashConfig::default_test());
        let total: u64 = disbursed.iter().sum();
        let share_sum: f64 = aggs.iter().map(|a| a.share_pct).sum();

        if total > 0 {
            prop_assert!((share_sum - 100.0).abs() < 1e-6, "share sum {share_sum}");
        } else {
            prop_assert!(aggs.iter().all(|a| a.share_pct == 0.0));
        }
    }
}
