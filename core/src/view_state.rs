//! Immutable UI state and the reducer that moves between states.
//!
//! RULE: state is never mutated in place. `apply` returns the next
//! state; expansion is keyed by stable ids (major index, insight id).

use crate::{
    aggregation::LenderSortColumn,
    filter::{FilterKey, RowFilter, TimePeriod},
    insight::InsightTab,
    types::MajorIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderSort {
    pub column:     LenderSortColumn,
    pub descending: bool,
}

impl Default for LenderSort {
    fn default() -> Self {
        Self { column: LenderSortColumn::Disbursed, descending: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub filter:            RowFilter,
    pub period:            TimePeriod,
    pub active_tab:        InsightTab,
    pub expanded_stages:   BTreeSet<MajorIndex>,
    pub expanded_insights: BTreeSet<String>,
    pub lender_sort:       LenderSort,
}

/// All user-issued view commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ViewCommand {
    // ── Filters ───────────────────────────────────
    SetProduct { product_type: Option<String> },
    SetFlow { flow: Option<String> },
    SetLender { lender: Option<String> },
    ClearFilters,
    SelectPeriod { period: TimePeriod },

    // ── Insight panel ─────────────────────────────
    SelectTab { tab: InsightTab },
    ToggleInsight { id: String },

    // ── Funnel table ──────────────────────────────
    ToggleStage { major_index: MajorIndex },
    CollapseAllStages,

    // ── Lender table ──────────────────────────────
    SortLenders { column: LenderSortColumn },
}

impl ViewState {
    pub fn apply(&self, command: &ViewCommand) -> ViewState {
        let mut next = self.clone();
        match command {
            ViewCommand::SetProduct { product_type } => {
                next.filter.product_type = product_type.clone();
            }
            ViewCommand::SetFlow { flow } => {
                next.filter.flow = flow.clone();
            }
            ViewCommand::SetLender { lender } => {
                next.filter.lender = lender.clone();
            }
            ViewCommand::ClearFilters => {
                next.filter = RowFilter::all();
            }
            ViewCommand::SelectPeriod { period } => {
                next.period = *period;
            }
            ViewCommand::SelectTab { tab } => {
                next.active_tab = *tab;
            }
            ViewCommand::ToggleInsight { id } => {
                toggle(&mut next.expanded_insights, id.clone());
            }
            ViewCommand::ToggleStage { major_index } => {
                toggle(&mut next.expanded_stages, *major_index);
            }
            ViewCommand::CollapseAllStages => {
                next.expanded_stages.clear();
            }
            ViewCommand::SortLenders { column } => {
                next.lender_sort = if self.lender_sort.column == *column {
                    LenderSort { column: *column, descending: !self.lender_sort.descending }
                } else {
                    LenderSort { column: *column, descending: true }
                };
            }
        }
        next
    }

    pub fn filter_key(&self) -> FilterKey {
        FilterKey::new(&self.filter, self.period)
    }

    pub fn is_stage_expanded(&self, major_index: MajorIndex) -> bool {
        self.expanded_stages.contains(&major_index)
    }

    pub fn is_insight_expanded(&self, id: &str) -> bool {
        self.expanded_insights.contains(id)
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, key: T) {
    if !set.remove(&key) {
        set.insert(key);
    }
}
