//! Row filters and the simulated period selector.

use crate::{
    config::PeriodFactors,
    prior_period::scale_count,
    rows::{DisbursalSummaryRow, FunnelRow, L2AnalysisRow, LenderFunnelRow},
};
use serde::{Deserialize, Serialize};

/// Dimensions a row can be sliced on.
pub trait Sliced {
    fn product_type(&self) -> &str;
    fn flow(&self) -> &str;
    /// `None` for rows that are not lender-specific.
    fn lender(&self) -> Option<&str>;
}

impl Sliced for DisbursalSummaryRow {
    fn product_type(&self) -> &str { &self.product_type }
    fn flow(&self) -> &str { &self.flow }
    fn lender(&self) -> Option<&str> { Some(&self.lender) }
}

impl Sliced for L2AnalysisRow {
    fn product_type(&self) -> &str { &self.product_type }
    fn flow(&self) -> &str { &self.flow }
    fn lender(&self) -> Option<&str> { Some(&self.lender) }
}

impl Sliced for LenderFunnelRow {
    fn product_type(&self) -> &str { &self.product_type }
    fn flow(&self) -> &str { &self.flow }
    fn lender(&self) -> Option<&str> { Some(&self.lender) }
}

impl Sliced for FunnelRow {
    fn product_type(&self) -> &str { &self.product_type }
    fn flow(&self) -> &str { &self.flow }
    fn lender(&self) -> Option<&str> { None }
}

/// Each field narrows the slice when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowFilter {
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub flow:         Option<String>,
    #[serde(default)]
    pub lender:       Option<String>,
}

impl RowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows without a lender dimension never match an active lender filter.
    pub fn matches<R: Sliced>(&self, row: &R) -> bool {
        let product_ok = self
            .product_type
            .as_deref()
            .is_none_or(|p| p == row.product_type());
        let flow_ok = self.flow.as_deref().is_none_or(|f| f == row.flow());
        let lender_ok = match self.lender.as_deref() {
            None => true,
            Some(l) => row.lender() == Some(l),
        };
        product_ok && flow_ok && lender_ok
    }

    pub fn apply<R: Sliced + Clone>(&self, rows: &[R]) -> Vec<R> {
        rows.iter().filter(|r| self.matches(*r)).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.product_type.is_none() && self.flow.is_none() && self.lender.is_none()
    }
}

/// Simulated time-range selector. There is no real date filtering;
/// each period scales the MTD snapshot by a fixed factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    #[default]
    Mtd,
    #[serde(rename = "last_7_days")]
    Last7Days,
    Qtd,
    Ytd,
}

impl TimePeriod {
    pub fn factor(&self, factors: &PeriodFactors) -> f64 {
        match self {
            Self::Mtd       => factors.mtd,
            Self::Last7Days => factors.last_7_days,
            Self::Qtd       => factors.qtd,
            Self::Ytd       => factors.ytd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mtd       => "mtd",
            Self::Last7Days => "last_7_days",
            Self::Qtd       => "qtd",
            Self::Ytd       => "ytd",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mtd"         => Some(Self::Mtd),
            "last_7_days" => Some(Self::Last7Days),
            "qtd"         => Some(Self::Qtd),
            "ytd"         => Some(Self::Ytd),
            _ => None,
        }
    }
}

/// Scale disbursal counts by `factor`, rounding each row independently.
pub fn scale_disbursals(rows: &[DisbursalSummaryRow], factor: f64) -> Vec<DisbursalSummaryRow> {
    if factor == 1.0 {
        return rows.to_vec();
    }
    rows.iter()
        .map(|r| DisbursalSummaryRow {
            child_leads: scale_count(r.child_leads, factor),
            disbursed: scale_count(r.disbursed, factor),
            ..r.clone()
        })
        .collect()
}

/// Memoization key for one (filter, period) selection. Equality is
/// structural, so an unset field never equals a field holding `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterKey {
    pub filter: RowFilter,
    pub period: TimePeriod,
}

impl FilterKey {
    pub fn new(filter: &RowFilter, period: TimePeriod) -> Self {
        Self { filter: filter.clone(), period }
    }

    /// Human-readable form for logs. Not unique; never key on it.
    pub fn label(&self) -> String {
        format!(
            "product={}|flow={}|lender={}|period={}",
            self.filter.product_type.as_deref().unwrap_or("*"),
            self.filter.flow.as_deref().unwrap_or("*"),
            self.filter.lender.as_deref().unwrap_or("*"),
            self.period.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disb(lender: &str, product: &str, flow: &str) -> DisbursalSummaryRow {
        DisbursalSummaryRow {
            product_type: product.into(),
            flow: flow.into(),
            lender: lender.into(),
            child_leads: 10,
            disbursed: 3,
            disbursal_pct: 30.0,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(RowFilter::all().matches(&disb("Axis", "bl", "auto")));
        assert!(RowFilter::all().is_empty());
    }

    #[test]
    fn filter_fields_combine() {
        let f = RowFilter {
            product_type: Some("bl".into()),
            flow: Some("manual".into()),
            lender: None,
        };
        assert!(f.matches(&disb("Axis", "bl", "manual")));
        assert!(!f.matches(&disb("Axis", "bl", "auto")));
        assert!(!f.matches(&disb("Axis", "pl", "manual")));
    }

    #[test]
    fn lender_filter_excludes_lenderless_rows() {
        let f = RowFilter { lender: Some("Axis".into()), ..RowFilter::default() };
        let canonical = FunnelRow {
            product_type: "bl".into(),
            flow: "auto".into(),
            major_index: 1,
            stage_name: "Lead".into(),
            mtd_leads: 10,
            lmtd_leads: 9,
        };
        assert!(!f.matches(&canonical));
        assert!(f.matches(&disb("Axis", "bl", "auto")));
    }

    #[test]
    fn period_scaling_rounds_each_row() {
        let rows = vec![disb("Axis", "bl", "auto"), disb("HDFC", "bl", "auto")];
        let scaled = scale_disbursals(&rows, 0.25);
        // 3 × 0.25 = 0.75 -> 1 for each row
        assert_eq!(scaled[0].disbursed, 1);
        assert_eq!(scaled[1].child_leads, 3); // 2.5 -> 3
    }

    #[test]
    fn filter_key_is_stable_and_distinct() {
        let a = FilterKey::new(&RowFilter::all(), TimePeriod::Mtd);
        let b = FilterKey::new(&RowFilter::all(), TimePeriod::Qtd);
        assert_eq!(a, FilterKey::new(&RowFilter::default(), TimePeriod::Mtd));
        assert_ne!(a, b);
        assert_eq!(TimePeriod::parse("last_7_days"), Some(TimePeriod::Last7Days));
    }

    #[test]
    fn literal_star_is_not_an_unset_field() {
        let unset = FilterKey::new(&RowFilter::all(), TimePeriod::Mtd);
        let star = FilterKey::new(
            &RowFilter { product_type: Some("*".into()), ..RowFilter::default() },
            TimePeriod::Mtd,
        );
        assert_eq!(unset.label(), star.label());
        assert_ne!(unset, star);
    }

    #[test]
    fn separator_in_a_value_does_not_collide() {
        let a = FilterKey::new(
            &RowFilter { product_type: Some("bl|flow=auto".into()), ..RowFilter::default() },
            TimePeriod::Mtd,
        );
        let b = FilterKey::new(
            &RowFilter {
                product_type: Some("bl".into()),
                flow: Some("auto|flow=*".into()),
                lender: None,
            },
            TimePeriod::Mtd,
        );
        // Same label, different selections.
        assert_eq!(a.label(), b.label());
        assert_ne!(a, b);
    }
}
