//! Row models: typed records for the four snapshot sources.
//!
//! Rows are immutable inputs. Every derived value in the crate is
//! recomputed from these on each view; nothing writes back to them.

use crate::types::{pct_or_zero, LenderName, MajorIndex, MonthStart};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical declared funnel stage, one per (product, flow, stage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelRow {
    pub product_type: String,
    pub flow:         String,
    pub major_index:  MajorIndex,
    pub stage_name:   String,
    pub mtd_leads:    u64,
    pub lmtd_leads:   u64,
}

/// Lender-level funnel counts for one major stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderFunnelRow {
    pub lender:       LenderName,
    pub product_type: String,
    pub flow:         String,
    pub major_index:  MajorIndex,
    pub stage_name:   String,
    pub mtd_leads:    u64,
    pub lmtd_leads:   u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursalSummaryRow {
    pub product_type:  String,
    #[serde(rename = "isautoleadcreated")]
    pub flow:          String,
    pub lender:        LenderName,
    pub child_leads:   u64,
    pub disbursed:     u64,
    /// As shipped in the snapshot. Informational only.
    #[serde(default)]
    pub disbursal_pct: f64,
}

impl DisbursalSummaryRow {
    /// disbursed / child_leads × 100, independent of the shipped column.
    pub fn recomputed_disbursal_pct(&self) -> f64 {
        pct_or_zero(self.disbursed as f64, self.child_leads as f64)
    }
}

/// One row of the L2 stage / sub-stage breakdown.
///
/// Major stage rows carry `sub_stage = None`. Sub-stage rows carry the
/// `major_index` of the major stage that owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2AnalysisRow {
    pub lender:               LenderName,
    pub month_start:          MonthStart,
    pub product_type:         String,
    pub flow:                 String,
    pub major_index:          f64,
    pub original_major_stage: String,
    #[serde(default)]
    pub sub_stage:            Option<String>,
    pub leads:                u64,
    #[serde(default)]
    pub stuck_pct:            Option<f64>,
}

impl L2AnalysisRow {
    /// The integer major stage this row belongs to.
    pub fn major(&self) -> MajorIndex {
        if self.major_index <= 0.0 {
            0
        } else {
            self.major_index.floor() as MajorIndex
        }
    }

    pub fn is_major(&self) -> bool {
        self.sub_stage.is_none()
    }
}

impl LenderFunnelRow {
    /// Pivot L2 major rows into lender funnel rows, one per
    /// (lender, product, flow, major stage) with MTD and LMTD side by side.
    /// Sub-stage rows are ignored.
    pub fn pivot_l2(rows: &[L2AnalysisRow]) -> Vec<LenderFunnelRow> {
        type Key = (String, String, String, MajorIndex);
        let mut acc: BTreeMap<Key, LenderFunnelRow> = BTreeMap::new();

        for row in rows.iter().filter(|r| r.is_major()) {
            let key = (
                row.lender.clone(),
                row.product_type.clone(),
                row.flow.clone(),
                row.major(),
            );
            let entry = acc.entry(key).or_insert_with(|| LenderFunnelRow {
                lender:       row.lender.clone(),
                product_type: row.product_type.clone(),
                flow:         row.flow.clone(),
                major_index:  row.major(),
                stage_name:   row.original_major_stage.clone(),
                mtd_leads:    0,
                lmtd_leads:   0,
            });
            match row.month_start {
                MonthStart::Mtd  => entry.mtd_leads += row.leads,
                MonthStart::Lmtd => entry.lmtd_leads += row.leads,
            }
        }

        acc.into_values().collect()
    }
}

/// All four snapshot sources as loaded, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBundle {
    pub funnel:        Vec<FunnelRow>,
    pub lender_funnel: Vec<LenderFunnelRow>,
    pub disbursals:    Vec<DisbursalSummaryRow>,
    pub l2:            Vec<L2AnalysisRow>,
}

impl SnapshotBundle {
    /// Lender funnel rows, pivoted from L2 when none were shipped.
    pub fn lender_funnel_or_pivot(&self) -> Vec<LenderFunnelRow> {
        if self.lender_funnel.is_empty() {
            LenderFunnelRow::pivot_l2(&self.l2)
        } else {
            self.lender_funnel.clone()
        }
    }
}
