use lendlens_core::{
    aggregation::{build_lender_aggregates, GroupCounts, LenderAggregate},
    config::DashConfig,
    pacing::{
        lender_pacing, portfolio_pacing, PacingCalendar, PacingStatus,
        DAYS_TO_TARGET_UNREACHABLE,
    },
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// One lender with a 120 Cr annual plan (10 Cr a month) at 2 L per loan.
fn planned_lender(disbursed: u64) -> Vec<LenderAggregate> {
    let mut config = DashConfig::default_test();
    config.aop_targets_cr.insert("Pace".to_string(), 120.0);
    build_lender_aggregates(
        vec![(
            "Pace".to_string(),
            GroupCounts { child_leads: disbursed * 4, disbursed, lmtd_disbursed: disbursed },
        )],
        &config,
    )
}

fn half_month() -> PacingCalendar {
    PacingCalendar::new(15, 30)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// 6 Cr achieved halfway through the month projects 12 Cr against a
/// 10 Cr monthly target: 120%, on track.
#[test]
fn ahead_of_plan_is_on_track() {
    let aggs = planned_lender(300); // 300 × 2 L = 6 Cr
    let pace = &lender_pacing(&aggs, half_month())[0];

    assert!((pace.current_amount_cr - 6.0).abs() < 1e-9);
    assert!((pace.projected_cr - 12.0).abs() < 1e-9);
    assert!((pace.monthly_target_cr - 10.0).abs() < 1e-9);
    assert!((pace.pacing_pct - 120.0).abs() < 1e-9);
    assert_eq!(pace.status, PacingStatus::OnTrack);
    // ceil(10 × 15 / 6) = 25
    assert_eq!(pace.days_to_target, 25);
}

/// 3 Cr achieved halfway projects 6 Cr: 60%, behind.
#[test]
fn under_plan_is_behind() {
    let pace = &lender_pacing(&planned_lender(150), half_month())[0];
    assert!((pace.pacing_pct - 60.0).abs() < 1e-9);
    assert_eq!(pace.status, PacingStatus::Behind);
    assert_eq!(pace.days_to_target, 50);
}

/// 80% lands in the watch band.
#[test]
fn watch_band() {
    let pace = &lender_pacing(&planned_lender(200), half_month())[0];
    assert!((pace.pacing_pct - 80.0).abs() < 1e-9);
    assert_eq!(pace.status, PacingStatus::Watch);
}

/// Nothing disbursed: the sentinel, not a division by zero.
#[test]
fn nothing_disbursed_uses_sentinel() {
    let pace = &lender_pacing(&planned_lender(0), half_month())[0];
    assert_eq!(pace.days_to_target, DAYS_TO_TARGET_UNREACHABLE);
    assert_eq!(pace.pacing_pct, 0.0);
}

/// A lender without an AOP entry paces at 0 and reports no target.
#[test]
fn lender_without_plan_has_no_target() {
    let aggs = build_lender_aggregates(
        vec![(
            "Unplanned".to_string(),
            GroupCounts { child_leads: 10, disbursed: 5, lmtd_disbursed: 5 },
        )],
        &DashConfig::default_test(),
    );
    let pace = &lender_pacing(&aggs, half_month())[0];
    assert!(!pace.has_target());
    assert_eq!(pace.pacing_pct, 0.0);
}

/// Portfolio pacing sums amounts and monthly targets across lenders.
#[test]
fn portfolio_sums_lenders() {
    let config = DashConfig::default_test();
    // Axis 1200/yr, HDFC 960/yr: 180 Cr a month combined.
    let aggs = build_lender_aggregates(
        vec![
            ("Axis".to_string(), GroupCounts { child_leads: 0, disbursed: 2_000, lmtd_disbursed: 0 }),
            ("HDFC".to_string(), GroupCounts { child_leads: 0, disbursed: 2_500, lmtd_disbursed: 0 }),
        ],
        &config,
    );
    let p = portfolio_pacing(&aggs, half_month());

    assert!((p.current_amount_cr - 90.0).abs() < 1e-9);
    assert!((p.monthly_target_cr - 180.0).abs() < 1e-9);
    assert!((p.pacing_pct - 100.0).abs() < 1e-9);
    assert_eq!(p.status, PacingStatus::OnTrack);
}

/// Zero days elapsed projects nothing.
#[test]
fn zero_elapsed_days_projects_zero() {
    let pace = &lender_pacing(&planned_lender(300), PacingCalendar::new(0, 30))[0];
    assert_eq!(pace.projected_cr, 0.0);
    assert_eq!(pace.status, PacingStatus::Behind);
}
