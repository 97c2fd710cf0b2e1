use crate::{pacing::PacingCalendar, types::LenderName};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of points the trend synthesizer emits.
pub const TREND_PERIODS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AopTarget {
    pub lender: LenderName,
    /// Annual operating plan, in Cr.
    pub annual_target_cr: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct AopTargetsFile {
    targets: Vec<AopTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacingConfig {
    /// Reporting date. When set, elapsed / total days are derived from it.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub days_elapsed: u32,
    pub days_in_month: u32,
}

impl PacingConfig {
    pub fn calendar(&self) -> PacingCalendar {
        match self.as_of {
            Some(date) => PacingCalendar::from_date(date),
            None => PacingCalendar::new(self.days_elapsed, self.days_in_month),
        }
    }
}

/// Multipliers that stand in for LMTD ground truth until real
/// prior-month snapshots are ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LmtdConfig {
    pub default_factor: f64,
    #[serde(default)]
    pub lender_factors: BTreeMap<LenderName, f64>,
}

/// Fixed multipliers simulating the period selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodFactors {
    pub mtd: f64,
    pub last_7_days: f64,
    pub qtd: f64,
    pub ytd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightThresholds {
    /// Rule 1 fires "good" above this growth %.
    pub growth_positive_pct: f64,
    /// Rule 1 fires "bad" below this growth %.
    pub growth_negative_pct: f64,
    pub top3_share_warn_pct: f64,
    /// Fraction of lenders that must be growing for "broad-based".
    pub broad_growth_ratio: f64,
    pub share_shift_min_pp: f64,
    pub pacing_behind_pct: f64,
    pub pacing_critical_pct: f64,
    pub conversion_floor_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DashboardFile {
    avg_ticket_size_lakh: f64,
    pacing: PacingConfig,
    lmtd: LmtdConfig,
    trend_factors: Vec<f64>,
    period_factors: PeriodFactors,
    insights: InsightThresholds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashConfig {
    /// Average ticket size in lakh. disbursed × ATS ÷ 100 gives Cr.
    pub avg_ticket_size_lakh: f64,
    pub aop_targets_cr: BTreeMap<LenderName, f64>,
    pub pacing: PacingConfig,
    pub lmtd: LmtdConfig,
    /// Oldest first; the last factor is the current period.
    pub trend_factors: Vec<f64>,
    pub period_factors: PeriodFactors,
    pub insights: InsightThresholds,
}

impl DashConfig {
    /// Load from the data/ directory.
    /// In tests, use DashConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/dashboard.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: DashboardFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let aop_path = format!("{data_dir}/config/aop_targets.json");
        let aop_content = std::fs::read_to_string(&aop_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {aop_path}: {e}"))?;
        let aop_file: AopTargetsFile = serde_json::from_str(&aop_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {aop_path}: {e}"))?;
        let aop_targets_cr = aop_file
            .targets
            .into_iter()
            .map(|t| (t.lender, t.annual_target_cr))
            .collect();

        if file.trend_factors.len() != TREND_PERIODS {
            anyhow::bail!(
                "{path}: expected {TREND_PERIODS} trend factors, got {}",
                file.trend_factors.len()
            );
        }

        Ok(Self {
            avg_ticket_size_lakh: file.avg_ticket_size_lakh,
            aop_targets_cr,
            pacing: file.pacing,
            lmtd: file.lmtd,
            trend_factors: file.trend_factors,
            period_factors: file.period_factors,
            insights: file.insights,
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let aop_targets_cr = [
            ("Axis", 1_200.0),
            ("HDFC", 960.0),
            ("IDFC", 600.0),
            ("Lendingkart", 360.0),
            ("Piramal", 240.0),
        ]
        .into_iter()
        .map(|(l, t)| (l.to_string(), t))
        .collect();

        Self {
            avg_ticket_size_lakh: 2.0,
            aop_targets_cr,
            pacing: PacingConfig {
                as_of: None,
                days_elapsed: 15,
                days_in_month: 30,
            },
            lmtd: LmtdConfig {
                default_factor: 0.92,
                lender_factors: BTreeMap::new(),
            },
            trend_factors: vec![0.78, 0.84, 0.89, 0.93, 0.97, 1.0],
            period_factors: PeriodFactors {
                mtd: 1.0,
                last_7_days: 0.25,
                qtd: 2.8,
                ytd: 7.5,
            },
            insights: InsightThresholds {
                growth_positive_pct: 10.0,
                growth_negative_pct: -5.0,
                top3_share_warn_pct: 70.0,
                broad_growth_ratio: 0.7,
                share_shift_min_pp: 1.0,
                pacing_behind_pct: 80.0,
                pacing_critical_pct: 50.0,
                conversion_floor_pct: 20.0,
            },
        }
    }

    /// Monthly target for a lender (AOP ÷ 12), 0 when the lender has none.
    pub fn monthly_target_cr(&self, lender: &str) -> f64 {
        self.aop_targets_cr.get(lender).copied().unwrap_or(0.0) / 12.0
    }

    /// Currency amount in Cr for a loan count.
    pub fn amount_cr(&self, loans: u64) -> f64 {
        loans as f64 * self.avg_ticket_size_lakh / 100.0
    }
}
