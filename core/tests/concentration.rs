use lendlens_core::{
    aggregation::{build_lender_aggregates, GroupCounts, LenderAggregate},
    concentration::{compute_concentration, ConcentrationLevel, ConcentrationSnapshot},
    config::DashConfig,
};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn book(entries: &[(&str, u64, u64)]) -> Vec<LenderAggregate> {
    build_lender_aggregates(
        entries.iter().map(|(l, d, lmtd)| {
            (
                l.to_string(),
                GroupCounts { child_leads: d * 5, disbursed: *d, lmtd_disbursed: *lmtd },
            )
        }),
        &DashConfig::default_test(),
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Cumulative share never decreases and ends at the share total.
#[test]
fn pareto_is_monotone_and_ends_at_total() {
    let aggs = book(&[("A", 500, 400), ("B", 300, 320), ("C", 150, 150), ("D", 50, 30)]);
    let snap = compute_concentration(&aggs);

    for pair in snap.pareto.windows(2) {
        assert!(pair[1].cumulative_share >= pair[0].cumulative_share);
    }
    let share_sum: f64 = aggs.iter().map(|a| a.share_pct).sum();
    let last = snap.pareto.last().unwrap().cumulative_share;
    assert!((last - share_sum).abs() < 1e-9);
}

/// A monopoly scores the full 10000 and classifies as high.
#[test]
fn single_lender_is_fully_concentrated() {
    let snap = compute_concentration(&book(&[("Only", 100, 90)]));
    assert!((snap.hhi - 10_000.0).abs() < 1e-6);
    assert_eq!(snap.level, ConcentrationLevel::High);
    assert!((snap.top3_share - 100.0).abs() < 1e-9);
}

/// With fewer than 3 lenders, top-3 share is the sum of what exists.
#[test]
fn top3_with_two_lenders() {
    let snap = compute_concentration(&book(&[("A", 60, 60), ("B", 40, 40)]));
    assert!((snap.top3_share - 100.0).abs() < 1e-9);
    assert_eq!(snap.growing_count, 0);
    assert_eq!(snap.declining_count, 0);
}

/// Ten equal lenders: HHI 1000, low concentration, top-3 = 30%.
#[test]
fn even_book_is_low_concentration() {
    let entries: Vec<(String, u64, u64)> =
        (0..10).map(|i| (format!("L{i}"), 100, 100)).collect();
    let refs: Vec<(&str, u64, u64)> = entries.iter().map(|(l, d, p)| (l.as_str(), *d, *p)).collect();
    let snap = compute_concentration(&book(&refs));

    assert!((snap.hhi - 1_000.0).abs() < 1e-6);
    assert_eq!(snap.level, ConcentrationLevel::Low);
    assert!((snap.top3_share - 30.0).abs() < 1e-9);
}

/// Share shifts compare MTD share against LMTD share and are ordered by
/// absolute size.
#[test]
fn share_shifts_sorted_by_absolute_move() {
    // MTD: A 50%, B 50%. LMTD: A 100/175 = 57.1%, B 75/175 = 42.9%.
    let snap = compute_concentration(&book(&[("A", 100, 100), ("B", 100, 75), ("C", 0, 0)]));

    assert_eq!(snap.share_shifts.len(), 3);
    assert!(snap.share_shifts[0].shift_pp.abs() >= snap.share_shifts[1].shift_pp.abs());
    assert!(snap.share_shifts[1].shift_pp.abs() >= snap.share_shifts[2].shift_pp.abs());
    let b = snap.share_shifts.iter().find(|s| s.lender == "B").unwrap();
    assert!((b.shift_pp - (50.0 - 75.0 / 175.0 * 100.0)).abs() < 1e-9);
    let c = snap.share_shifts.iter().find(|s| s.lender == "C").unwrap();
    assert_eq!(c.shift_pp, 0.0);
}

proptest! {
    /// HHI, top-3 share and pareto order do not depend on the order
    /// lenders arrive in.
    #[test]
    fn concentration_is_order_invariant(
        shares in proptest::collection::vec(0u64..10_000, 1..15),
        rotate in 0usize..15,
    ) {
        let names: Vec<String> = (0..shares.len()).map(|i| format!("L{i:02}")).collect();
        let entries: Vec<(&str, u64, u64)> =
            names.iter().zip(&shares).map(|(n, d)| (n.as_str(), *d, *d)).collect();
        let aggs = book(&entries);

        let mut rotated = aggs.clone();
        rotated.rotate_left(rotate % aggs.len());
        rotated.reverse();

        let a = compute_concentration(&aggs);
        let b = compute_concentration(&rotated);

        prop_assert!((a.hhi - b.hhi).abs() < 1e-6, "{} vs {}", a.hhi, b.hhi);
        prop_assert!((a.top3_share - b.top3_share).abs() < 1e-9);
        let order = |s: &ConcentrationSnapshot| {
            s.pareto.iter().map(|p| p.lender.clone()).collect::<Vec<_>>()
        };
        prop_assert_eq!(order(&a), order(&b));
    }
}
