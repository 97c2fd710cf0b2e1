//! Funnel hierarchy builder.
//!
//! Major stages come from two partially overlapping sources: the
//! canonical declared-stage rows and stages derived from the L2 lead
//! breakdown. The hierarchy is the union of both index sets.
//!
//! RULES:
//!   - Indices are iterated strictly ascending. Conversion at a stage
//!     divides by the nearest lower PRESENT index; gaps are skipped.
//!   - Provenance is decided per index: canonical when present there,
//!     derived otherwise. Mixed provenance in one hierarchy is normal.
//!   - Sub-stages shown under stage i are the ones recorded against the
//!     PREVIOUS major stage: they explain why leads did not advance out
//!     of it.

use crate::{
    rows::{FunnelRow, L2AnalysisRow, LenderFunnelRow},
    types::{delta_pp, pct_or_none, LenderName, MajorIndex, MonthStart},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageSource {
    Canonical,
    Derived,
}

/// Lead counts for one major stage from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLeads {
    pub major_index: MajorIndex,
    pub stage_name:  String,
    pub mtd_leads:   u64,
    pub lmtd_leads:  u64,
}

/// Best LMTD conversion observed for one stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroConversion {
    pub from_index: MajorIndex,
    pub to_index:   MajorIndex,
    pub lender:     LenderName,
    pub conv_pct:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorStageRow {
    pub major_index:      MajorIndex,
    pub stage_name:       String,
    pub mtd_leads:        u64,
    pub lmtd_leads:       u64,
    pub mtd_conv_pct:     Option<f64>,
    pub lmtd_conv_pct:    Option<f64>,
    pub delta_pp:         Option<f64>,
    pub prev_major_index: Option<MajorIndex>,
    pub source:           StageSource,
    pub hero:             Option<HeroConversion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubStageRow {
    pub sub_stage:      String,
    pub mtd_leads:      u64,
    pub lmtd_leads:     u64,
    pub mtd_stuck_pct:  Option<f64>,
    pub lmtd_stuck_pct: Option<f64>,
    pub delta_pp:       Option<f64>,
    /// Last sub-stage recorded for the owning major stage.
    pub is_terminal:    bool,
}

// ── Sources ──────────────────────────────────────────────────────────────────

/// Sum canonical rows per major index (across product / flow slices).
pub fn canonical_stages(rows: &[FunnelRow]) -> BTreeMap<MajorIndex, StageLeads> {
    let mut out: BTreeMap<MajorIndex, StageLeads> = BTreeMap::new();
    for row in rows {
        let entry = out.entry(row.major_index).or_insert_with(|| StageLeads {
            major_index: row.major_index,
            stage_name:  row.stage_name.clone(),
            mtd_leads:   0,
            lmtd_leads:  0,
        });
        entry.mtd_leads += row.mtd_leads;
        entry.lmtd_leads += row.lmtd_leads;
    }
    out
}

/// Sum L2 major-stage rows per major index. Sub-stage rows are ignored.
pub fn derived_stages(rows: &[L2AnalysisRow]) -> BTreeMap<MajorIndex, StageLeads> {
    let mut out: BTreeMap<MajorIndex, StageLeads> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.is_major()) {
        let entry = out.entry(row.major()).or_insert_with(|| StageLeads {
            major_index: row.major(),
            stage_name:  row.original_major_stage.clone(),
            mtd_leads:   0,
            lmtd_leads:  0,
        });
        match row.month_start {
            MonthStart::Mtd  => entry.mtd_leads += row.leads,
            MonthStart::Lmtd => entry.lmtd_leads += row.leads,
        }
    }
    out
}

// ── Hierarchy ────────────────────────────────────────────────────────────────

/// Union both index sets, ascending, and derive per-transition conversion.
pub fn merge_stages(
    canonical: &BTreeMap<MajorIndex, StageLeads>,
    derived: &BTreeMap<MajorIndex, StageLeads>,
) -> Vec<MajorStageRow> {
    let mut indices: Vec<MajorIndex> = canonical.keys().chain(derived.keys()).copied().collect();
    indices.sort_unstable();
    indices.dedup();

    let mut out: Vec<MajorStageRow> = Vec::with_capacity(indices.len());
    let mut prev: Option<(MajorIndex, u64, u64)> = None;

    for idx in indices {
        let (leads, source) = match (canonical.get(&idx), derived.get(&idx)) {
            (Some(c), _) => (c, StageSource::Canonical),
            (None, Some(d)) => (d, StageSource::Derived),
            (None, None) => continue,
        };

        let (mtd_conv, lmtd_conv, prev_index) = match prev {
            Some((p, p_mtd, p_lmtd)) => (
                pct_or_none(leads.mtd_leads as f64, p_mtd as f64),
                pct_or_none(leads.lmtd_leads as f64, p_lmtd as f64),
                Some(p),
            ),
            None => (None, None, None),
        };

        out.push(MajorStageRow {
            major_index:      idx,
            stage_name:       leads.stage_name.clone(),
            mtd_leads:        leads.mtd_leads,
            lmtd_leads:       leads.lmtd_leads,
            mtd_conv_pct:     mtd_conv,
            lmtd_conv_pct:    lmtd_conv,
            delta_pp:         delta_pp(mtd_conv, lmtd_conv),
            prev_major_index: prev_index,
            source,
            hero:             None,
        });
        prev = Some((idx, leads.mtd_leads, leads.lmtd_leads));
    }
    out
}

/// Canonical rows and L2 rows must already be filtered to the same slice.
pub fn build_hierarchy(funnel: &[FunnelRow], l2: &[L2AnalysisRow]) -> Vec<MajorStageRow> {
    let canonical = canonical_stages(funnel);
    let derived = derived_stages(l2);
    let merged = merge_stages(&canonical, &derived);
    log::debug!(
        "funnel: {} canonical + {} derived indices -> {} stages",
        canonical.len(),
        derived.len(),
        merged.len()
    );
    merged
}

// ── Sub-stages ───────────────────────────────────────────────────────────────

/// Drill-down rows for the major stage at `major_index`.
///
/// Empty for the first stage and for indices not in the hierarchy.
pub fn sub_stages_for(
    hierarchy: &[MajorStageRow],
    major_index: MajorIndex,
    l2: &[L2AnalysisRow],
) -> Vec<SubStageRow> {
    let Some(stage) = hierarchy.iter().find(|s| s.major_index == major_index) else {
        return Vec::new();
    };
    let Some(owner) = stage.prev_major_index else {
        return Vec::new();
    };

    // Owning major stage totals, per month.
    let mut owner_mtd = 0u64;
    let mut owner_lmtd = 0u64;
    for row in l2.iter().filter(|r| r.is_major() && r.major() == owner) {
        match row.month_start {
            MonthStart::Mtd  => owner_mtd += row.leads,
            MonthStart::Lmtd => owner_lmtd += row.leads,
        }
    }
    if owner_mtd == 0 && owner_lmtd == 0 {
        if let Some(o) = hierarchy.iter().find(|s| s.major_index == owner) {
            owner_mtd = o.mtd_leads;
            owner_lmtd = o.lmtd_leads;
        }
    }

    // Sub-stage sums in first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut sums: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for row in l2.iter().filter(|r| r.major() == owner) {
        let Some(name) = row.sub_stage.as_ref() else { continue };
        let entry = sums.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            (0, 0)
        });
        match row.month_start {
            MonthStart::Mtd  => entry.0 += row.leads,
            MonthStart::Lmtd => entry.1 += row.leads,
        }
    }

    let last = order.len().saturating_sub(1);
    order
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let (mtd, lmtd) = sums.get(&name).copied().unwrap_or((0, 0));
            let mtd_stuck = pct_or_none(mtd as f64, owner_mtd as f64);
            let lmtd_stuck = pct_or_none(lmtd as f64, owner_lmtd as f64);
            SubStageRow {
                sub_stage:      name,
                mtd_leads:      mtd,
                lmtd_leads:     lmtd,
                mtd_stuck_pct:  mtd_stuck,
                lmtd_stuck_pct: lmtd_stuck,
                delta_pp:       delta_pp(mtd_stuck, lmtd_stuck),
                is_terminal:    i == last,
            }
        })
        .collect()
}

// ── Hero conversion ──────────────────────────────────────────────────────────

/// Best LMTD conversion per transition of `hierarchy`, keyed by the
/// destination index. Lenders with no LMTD leads at the source stage are
/// not candidates. Ties go to the lender name that sorts first.
pub fn hero_conversions(
    hierarchy: &[MajorStageRow],
    lender_rows: &[LenderFunnelRow],
) -> BTreeMap<MajorIndex, HeroConversion> {
    let mut by_lender: BTreeMap<&str, BTreeMap<MajorIndex, u64>> = BTreeMap::new();
    for row in lender_rows {
        *by_lender
            .entry(row.lender.as_str())
            .or_default()
            .entry(row.major_index)
            .or_default() += row.lmtd_leads;
    }

    let mut out = BTreeMap::new();
    for stage in hierarchy {
        let Some(from) = stage.prev_major_index else { continue };
        let to = stage.major_index;

        let mut best: Option<HeroConversion> = None;
        for (lender, stages) in &by_lender {
            let base = stages.get(&from).copied().unwrap_or(0);
            if base == 0 {
                continue;
            }
            let reached = stages.get(&to).copied().unwrap_or(0);
            let rate = reached as f64 / base as f64 * 100.0;
            if best.as_ref().is_none_or(|b| rate > b.conv_pct) {
                best = Some(HeroConversion {
                    from_index: from,
                    to_index:   to,
                    lender:     lender.to_string(),
                    conv_pct:   rate,
                });
            }
        }
        if let Some(hero) = best {
            out.insert(to, hero);
        }
    }
    out
}

/// Attach each transition's hero to its destination stage.
pub fn annotate_heroes(hierarchy: &mut [MajorStageRow], heroes: &BTreeMap<MajorIndex, HeroConversion>) {
    for stage in hierarchy.iter_mut() {
        stage.hero = heroes.get(&stage.major_index).cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(idx: MajorIndex, name: &str, mtd: u64, lmtd: u64) -> FunnelRow {
        FunnelRow {
            product_type: "bl".into(),
            flow: "auto".into(),
            major_index: idx,
            stage_name: name.into(),
            mtd_leads: mtd,
            lmtd_leads: lmtd,
        }
    }

    #[test]
    fn first_stage_has_no_conversion() {
        let h = build_hierarchy(&[canon(1, "Lead", 100, 100), canon(2, "KYC", 50, 40)], &[]);
        assert_eq!(h[0].mtd_conv_pct, None);
        assert_eq!(h[0].prev_major_index, None);
        assert_eq!(h[1].mtd_conv_pct, Some(50.0));
        assert_eq!(h[1].lmtd_conv_pct, Some(40.0));
        assert_eq!(h[1].delta_pp, Some(10.0));
    }

    #[test]
    fn zero_predecessor_gives_null_conversion_and_delta() {
        let h = build_hierarchy(&[canon(1, "Lead", 0, 10), canon(2, "KYC", 5, 5)], &[]);
        assert_eq!(h[1].mtd_conv_pct, None);
        assert_eq!(h[1].lmtd_conv_pct, Some(50.0));
        assert_eq!(h[1].delta_pp, None);
    }

    #[test]
    fn hero_needs_a_previous_stage() {
        let h = build_hierarchy(&[canon(1, "Lead", 10, 10)], &[]);
        assert!(hero_conversions(&h, &[]).is_empty());
    }
}
