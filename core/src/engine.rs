//! The dashboard engine: turns a loaded snapshot plus a view state into
//! every derived figure the presentation layer renders.
//!
//! RECOMPUTATION ORDER (fixed, documented, never reordered):
//!   1. Filter rows to the selected slice; scale disbursals by period
//!   2. Lender aggregates
//!   3. Product / flow aggregates
//!   4. Portfolio totals
//!   5. Concentration
//!   6. Pacing (portfolio, then per lender)
//!   7. Trend series
//!   8. Insights
//!   9. Funnel hierarchy, then hero annotation
//!
//! RULES:
//!   - Every step is a pure function of the steps before it.
//!   - Filter-dependent metrics are memoized by (filter key, data version)
//!     in a bounded cache; the oldest selection is evicted first.
//!     Sorting, tab selection and expansion are applied per call on top.
//!   - Replacing the snapshot bumps the data version and drops the cache.

use crate::{
    aggregation::{
        aggregate_by_flow, aggregate_by_lender_with, aggregate_by_product, portfolio_totals,
        sort_lenders, DimensionAggregate, LenderAggregate, PortfolioTotals,
    },
    concentration::{compute_concentration, ConcentrationSnapshot},
    config::DashConfig,
    filter::{scale_disbursals, FilterKey, RowFilter, TimePeriod},
    funnel::{annotate_heroes, build_hierarchy, hero_conversions, sub_stages_for, MajorStageRow, SubStageRow},
    insight::{insights_for_tab, InsightContext, InsightGenerator, InsightTab, RichInsightItem},
    pacing::{lender_pacing, portfolio_pacing, LenderPacing, PortfolioPacing},
    prior_period::{LenderFactors, PriorPeriodSource},
    rows::SnapshotBundle,
    trend::{synthesize_count_trend, synthesize_monthly_trend, synthesize_trend, TrendPoint},
    types::{DataVersion, MajorIndex},
    view_state::ViewState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Selections kept in the memo cache before the oldest is evicted.
pub const MAX_CACHED_VIEWS: usize = 64;

/// Everything that depends only on (filter, period, data).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub filter_key:      FilterKey,
    pub data_version:    DataVersion,
    pub period:          TimePeriod,
    pub totals:          PortfolioTotals,
    /// Disbursed descending.
    pub lenders:         Vec<LenderAggregate>,
    pub products:        Vec<DimensionAggregate>,
    pub flows:           Vec<DimensionAggregate>,
    pub concentration:   ConcentrationSnapshot,
    pub pacing:          PortfolioPacing,
    pub lender_pacing:   Vec<LenderPacing>,
    pub disbursal_trend: Vec<TrendPoint>,
    pub amount_trend:    Vec<TrendPoint>,
    /// In rule evaluation order.
    pub insights:        Vec<RichInsightItem>,
    pub funnel:          Vec<MajorStageRow>,
}

/// One render's worth of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub metrics:           DerivedMetrics,
    /// `metrics.lenders` in the table's current sort.
    pub lender_table:      Vec<LenderAggregate>,
    pub active_tab:        InsightTab,
    /// Insights in the active tab, generation order preserved.
    pub visible_insights:  Vec<RichInsightItem>,
    pub expanded_insights: Vec<String>,
    /// Drill-downs for expanded stages present in the hierarchy.
    pub sub_stages:        BTreeMap<MajorIndex, Vec<SubStageRow>>,
}

/// Compute all filter-dependent metrics in the documented order.
pub fn compute_metrics(
    config: &DashConfig,
    bundle: &SnapshotBundle,
    prior: &dyn PriorPeriodSource,
    generator: &InsightGenerator,
    filter: &RowFilter,
    period: TimePeriod,
    data_version: DataVersion,
) -> DerivedMetrics {
    let filter_key = FilterKey::new(filter, period);
    log::debug!("engine: recomputing {} (v{data_version})", filter_key.label());

    // 1. Slice
    let disbursals = scale_disbursals(
        &filter.apply(&bundle.disbursals),
        period.factor(&config.period_factors),
    );
    let funnel_rows = filter.apply(&bundle.funnel);
    let l2_rows = filter.apply(&bundle.l2);

    // 2–4. Aggregates
    let lenders = aggregate_by_lender_with(&disbursals, prior, config);
    let products = aggregate_by_product(&disbursals, prior);
    let flows = aggregate_by_flow(&disbursals, prior);
    let totals = portfolio_totals(&lenders);

    // 5. Concentration
    let concentration = compute_concentration(&lenders);

    // 6. Pacing
    let calendar = config.pacing.calendar();
    let pacing = portfolio_pacing(&lenders, calendar);
    let per_lender = lender_pacing(&lenders, calendar);

    // 7. Trend
    let disbursal_trend = synthesize_count_trend(totals.disbursed, &config.trend_factors);
    let amount_trend = match config.pacing.as_of {
        Some(anchor) => synthesize_monthly_trend(totals.amount_cr, &config.trend_factors, anchor),
        None => synthesize_trend(totals.amount_cr, &config.trend_factors),
    };

    // 8. Insights
    let ctx = InsightContext {
        aggregates:    &lenders,
        totals:        &totals,
        concentration: &concentration,
        pacing:        &pacing,
        lender_pacing: &per_lender,
        thresholds:    &config.insights,
    };
    let insights = generator.generate(&ctx);

    // 9. Funnel. Heroes are benchmarked on the unfiltered lender funnel:
    // every product, flow and lender, whatever the selection.
    let mut funnel = build_hierarchy(&funnel_rows, &l2_rows);
    let heroes = hero_conversions(&funnel, &bundle.lender_funnel_or_pivot());
    annotate_heroes(&mut funnel, &heroes);

    DerivedMetrics {
        filter_key,
        data_version,
        period,
        totals,
        lenders,
        products,
        flows,
        concentration,
        pacing,
        lender_pacing: per_lender,
        disbursal_trend,
        amount_trend,
        insights,
        funnel,
    }
}

pub struct DashEngine {
    pub config:   DashConfig,
    bundle:       SnapshotBundle,
    data_version: DataVersion,
    prior:        Box<dyn PriorPeriodSource>,
    generator:    InsightGenerator,
    cache:        HashMap<(FilterKey, DataVersion), DerivedMetrics>,
    /// Insertion order of `cache` keys, oldest first.
    cache_order:  VecDeque<(FilterKey, DataVersion)>,
    capacity:     usize,
}

impl DashEngine {
    /// LMTD figures come from the configured per-lender factors.
    pub fn new(config: DashConfig, bundle: SnapshotBundle) -> Self {
        let prior = Box::new(LenderFactors::from_config(&config.lmtd));
        Self {
            config,
            bundle,
            data_version: 1,
            prior,
            generator: InsightGenerator::standard(),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            capacity: MAX_CACHED_VIEWS,
        }
    }

    /// Bound the memo cache to `capacity` selections (at least one).
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.clear_cache();
        self
    }

    /// Swap the LMTD source. Cached metrics are dropped.
    pub fn with_prior_source(mut self, prior: Box<dyn PriorPeriodSource>) -> Self {
        self.prior = prior;
        self.clear_cache();
        self
    }

    /// Swap the insight battery. Cached metrics are dropped.
    pub fn with_generator(mut self, generator: InsightGenerator) -> Self {
        self.generator = generator;
        self.clear_cache();
        self
    }

    pub fn bundle(&self) -> &SnapshotBundle {
        &self.bundle
    }

    pub fn data_version(&self) -> DataVersion {
        self.data_version
    }

    pub fn cached_views(&self) -> usize {
        self.cache.len()
    }

    /// Replace the snapshot rows. Returns the new data version.
    pub fn replace_bundle(&mut self, bundle: SnapshotBundle) -> DataVersion {
        self.bundle = bundle;
        self.data_version += 1;
        self.clear_cache();
        log::info!(
            "engine: snapshot replaced (v{}): {} disbursal rows, {} l2 rows",
            self.data_version,
            self.bundle.disbursals.len(),
            self.bundle.l2.len()
        );
        self.data_version
    }

    /// Filter-dependent metrics, computed once per (filter, period, version).
    pub fn metrics(&mut self, filter: &RowFilter, period: TimePeriod) -> &DerivedMetrics {
        let key = (FilterKey::new(filter, period), self.data_version);
        if !self.cache.contains_key(&key) {
            let computed = compute_metrics(
                &self.config,
                &self.bundle,
                self.prior.as_ref(),
                &self.generator,
                filter,
                period,
                self.data_version,
            );
            while self.cache.len() >= self.capacity {
                let Some(oldest) = self.cache_order.pop_front() else { break };
                log::debug!("engine: evicting {}", oldest.0.label());
                self.cache.remove(&oldest);
            }
            self.cache.insert(key.clone(), computed);
            self.cache_order.push_back(key.clone());
        } else {
            log::debug!("engine: cache hit {}", key.0.label());
        }
        &self.cache[&key]
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }

    /// Full view for a UI state.
    pub fn view(&mut self, state: &ViewState) -> DashboardView {
        let metrics = self.metrics(&state.filter, state.period).clone();

        let lender_table = sort_lenders(
            &metrics.lenders,
            state.lender_sort.column,
            state.lender_sort.descending,
        );

        let visible_insights = insights_for_tab(&metrics.insights, state.active_tab)
            .into_iter()
            .cloned()
            .collect();

        let expanded_insights = metrics
            .insights
            .iter()
            .filter(|i| state.is_insight_expanded(&i.id))
            .map(|i| i.id.clone())
            .collect();

        let l2_rows = state.filter.apply(&self.bundle.l2);
        let sub_stages = state
            .expanded_stages
            .iter()
            .filter(|idx| metrics.funnel.iter().any(|s| s.major_index == **idx))
            .map(|&idx| (idx, sub_stages_for(&metrics.funnel, idx, &l2_rows)))
            .collect();

        DashboardView {
            metrics,
            lender_table,
            active_tab: state.active_tab,
            visible_insights,
            expanded_insights,
            sub_stages,
        }
    }
}
