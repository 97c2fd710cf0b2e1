//! Run-rate / pacing calculator: linear month-end projection against
//! static AOP targets.

use crate::{
    aggregation::LenderAggregate,
    types::{pct_or_zero, LenderName},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Returned by `days_to_target` when nothing has been achieved yet.
pub const DAYS_TO_TARGET_UNREACHABLE: u32 = 999;

pub const ON_TRACK_PCT: f64 = 100.0;
pub const WATCH_PCT: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingCalendar {
    pub days_elapsed:  u32,
    pub days_in_month: u32,
}

impl PacingCalendar {
    pub fn new(days_elapsed: u32, days_in_month: u32) -> Self {
        Self { days_elapsed, days_in_month }
    }

    /// Day-of-month and month length for a reporting date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            days_elapsed:  date.day(),
            days_in_month: days_in_month(date),
        }
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_this = date.with_day(1);
    let first_next = NaiveDate::from_ymd_opt(year, month, 1);
    match (first_this, first_next) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 30,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStatus {
    OnTrack,
    Watch,
    Behind,
}

impl PacingStatus {
    /// ≥100 on track, ≥75 watch, else behind.
    pub fn classify(pacing_pct: f64) -> Self {
        if pacing_pct >= ON_TRACK_PCT {
            Self::OnTrack
        } else if pacing_pct >= WATCH_PCT {
            Self::Watch
        } else {
            Self::Behind
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderPacing {
    pub lender:            LenderName,
    pub current_amount_cr: f64,
    pub projected_cr:      f64,
    /// AOP ÷ 12. Zero for lenders without a plan.
    pub monthly_target_cr: f64,
    pub pacing_pct:        f64,
    pub status:            PacingStatus,
    pub days_to_target:    u32,
}

impl LenderPacing {
    pub fn has_target(&self) -> bool {
        self.monthly_target_cr > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPacing {
    pub current_amount_cr: f64,
    pub projected_cr:      f64,
    pub monthly_target_cr: f64,
    pub pacing_pct:        f64,
    pub status:            PacingStatus,
    pub days_to_target:    u32,
    pub calendar:          PacingCalendar,
}

/// achieved ÷ days_elapsed × total_days, 0 when no days have elapsed.
pub fn project_run_rate(amount_achieved: f64, days_elapsed: u32, total_days: u32) -> f64 {
    if days_elapsed == 0 {
        0.0
    } else {
        amount_achieved / days_elapsed as f64 * total_days as f64
    }
}

/// projected ÷ monthly_target × 100, 0 when there is no target.
pub fn pacing_pct(projected: f64, monthly_target: f64) -> f64 {
    pct_or_zero(projected, monthly_target)
}

/// ceil(target × days_elapsed ÷ current). `DAYS_TO_TARGET_UNREACHABLE`
/// when the current amount is zero.
pub fn days_to_target(monthly_target: f64, days_elapsed: u32, current_amount: f64) -> u32 {
    if current_amount <= 0.0 {
        return DAYS_TO_TARGET_UNREACHABLE;
    }
    let days = (monthly_target * days_elapsed as f64 / current_amount).ceil();
    if days <= 0.0 {
        0
    } else {
        days as u32
    }
}

fn pace(current: f64, monthly_target: f64, cal: PacingCalendar) -> (f64, f64, PacingStatus, u32) {
    let projected = project_run_rate(current, cal.days_elapsed, cal.days_in_month);
    let pct = pacing_pct(projected, monthly_target);
    (
        projected,
        pct,
        PacingStatus::classify(pct),
        days_to_target(monthly_target, cal.days_elapsed, current),
    )
}

/// Per-lender pacing, in the order of `aggregates`.
pub fn lender_pacing(aggregates: &[LenderAggregate], cal: PacingCalendar) -> Vec<LenderPacing> {
    aggregates
        .iter()
        .map(|a| {
            let monthly_target = a.aop_target_cr / 12.0;
            let (projected, pct, status, days) = pace(a.amount_cr, monthly_target, cal);
            LenderPacing {
                lender: a.lender.clone(),
                current_amount_cr: a.amount_cr,
                projected_cr: projected,
                monthly_target_cr: monthly_target,
                pacing_pct: pct,
                status,
                days_to_target: days,
            }
        })
        .collect()
}

/// Portfolio pacing against the sum of the lenders' monthly targets.
pub fn portfolio_pacing(aggregates: &[LenderAggregate], cal: PacingCalendar) -> PortfolioPacing {
    let current: f64 = aggregates.iter().map(|a| a.amount_cr).sum();
    let monthly_target: f64 = aggregates.iter().map(|a| a.aop_target_cr / 12.0).sum();
    let (projected, pct, status, days) = pace(current, monthly_target, cal);
    PortfolioPacing {
        current_amount_cr: current,
        projected_cr: projected,
        monthly_target_cr: monthly_target,
        pacing_pct: pct,
        status,
        days_to_target: days,
        calendar: cal,
    }
}
