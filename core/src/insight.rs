//! Insight generator: a fixed battery of threshold rules over the
//! current aggregates.
//!
//! EVALUATION ORDER (fixed, documented, never reordered):
//!   1. Volume growth
//!   2. Concentration risk
//!   3. Breadth of growth
//!   4. Largest share shift
//!   5. AOP pacing
//!   6. Critical lenders
//!   7. Conversion floor
//!   8. Top-lender spotlight
//!
//! RULES:
//!   - Each rule is stateless and sees the same context.
//!   - Output is appended in evaluation order. Within a tab the
//!     presentation layer shows items in this order.
//!   - Nothing is suppressed or deduplicated across recomputations.

use crate::{
    aggregation::{LenderAggregate, PortfolioTotals},
    concentration::ConcentrationSnapshot,
    config::InsightThresholds,
    pacing::{LenderPacing, PortfolioPacing},
    types::LenderName,
};
use serde::{Deserialize, Serialize};

// ── Impact weights ───────────────────────────────────────────────────────────

pub const WEIGHT_VOLUME_GROWTH: u8 = 40;
pub const WEIGHT_VOLUME_DECLINE: u8 = 80;
pub const WEIGHT_CONCENTRATION_RISK: u8 = 55;
pub const WEIGHT_BROAD_GROWTH: u8 = 30;
pub const WEIGHT_NARROW_GROWTH: u8 = 50;
pub const WEIGHT_SHARE_SHIFT: u8 = 45;
pub const WEIGHT_AOP_BEHIND: u8 = 85;
pub const WEIGHT_AOP_ON_PACE: u8 = 25;
pub const WEIGHT_CRITICAL_LENDERS: u8 = 90;
pub const WEIGHT_CONVERSION_FLOOR: u8 = 65;
pub const WEIGHT_TOP_LENDER: u8 = 15;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Warn,
    Bad,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityBucket {
    P0,
    P1,
    P2,
    P3,
    #[serde(rename = "emerging")]
    Emerging,
    #[serde(rename = "positive")]
    Positive,
}

impl PriorityBucket {
    /// ≥85 P0, ≥60 P1, ≥35 P2, else P3.
    pub fn from_weight(impact_weight: u8) -> Self {
        match impact_weight {
            85.. => Self::P0,
            60.. => Self::P1,
            35.. => Self::P2,
            _    => Self::P3,
        }
    }
}

/// Closed set of insight kinds. The presentation layer maps kind → icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    VolumeGrowth,
    VolumeDecline,
    ConcentrationRisk,
    BroadGrowth,
    NarrowGrowth,
    ShareShift,
    AopBehind,
    AopOnPace,
    CriticalLenders,
    ConversionFloor,
    TopLender,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VolumeGrowth      => "volume_growth",
            Self::VolumeDecline     => "volume_decline",
            Self::ConcentrationRisk => "concentration_risk",
            Self::BroadGrowth       => "broad_growth",
            Self::NarrowGrowth      => "narrow_growth",
            Self::ShareShift        => "share_shift",
            Self::AopBehind         => "aop_behind",
            Self::AopOnPace         => "aop_on_pace",
            Self::CriticalLenders   => "critical_lenders",
            Self::ConversionFloor   => "conversion_floor",
            Self::TopLender         => "top_lender",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Drill-down content shown when an insight is expanded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightDetail {
    pub bullets:    Vec<String>,
    pub chart_data: Vec<ChartPoint>,
    pub lenders:    Vec<LenderName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichInsightItem {
    /// Stable across recomputations; UI expansion state is keyed on it.
    pub id:              String,
    pub kind:            InsightKind,
    pub severity:        Severity,
    pub title:           String,
    pub detail:          String,
    /// 0–100.
    pub impact_weight:   u8,
    pub priority_bucket: Option<PriorityBucket>,
    pub expanded:        InsightDetail,
}

impl RichInsightItem {
    fn new(kind: InsightKind, severity: Severity, impact_weight: u8) -> Self {
        Self {
            id: kind.as_str().to_string(),
            kind,
            severity,
            title: String::new(),
            detail: String::new(),
            impact_weight: impact_weight.min(100),
            priority_bucket: None,
            expanded: InsightDetail::default(),
        }
    }

    fn titled(mut self, title: String, detail: String) -> Self {
        self.title = title;
        self.detail = detail;
        self
    }

    fn bucket(mut self, bucket: PriorityBucket) -> Self {
        self.priority_bucket = Some(bucket);
        self
    }

    fn expanded(mut self, expanded: InsightDetail) -> Self {
        self.expanded = expanded;
        self
    }

    /// Explicit bucket if set, otherwise derived from impact weight.
    pub fn effective_bucket(&self) -> PriorityBucket {
        self.priority_bucket
            .unwrap_or_else(|| PriorityBucket::from_weight(self.impact_weight))
    }
}

/// Tabs of the insight panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightTab {
    #[default]
    All,
    P0,
    P1,
    P2,
    P3,
    Emerging,
    Positive,
}

impl InsightTab {
    pub fn includes(&self, bucket: PriorityBucket) -> bool {
        match self {
            Self::All      => true,
            Self::P0       => bucket == PriorityBucket::P0,
            Self::P1       => bucket == PriorityBucket::P1,
            Self::P2       => bucket == PriorityBucket::P2,
            Self::P3       => bucket == PriorityBucket::P3,
            Self::Emerging => bucket == PriorityBucket::Emerging,
            Self::Positive => bucket == PriorityBucket::Positive,
        }
    }
}

/// Items belonging to `tab`, in generation order.
pub fn insights_for_tab(items: &[RichInsightItem], tab: InsightTab) -> Vec<&RichInsightItem> {
    items
        .iter()
        .filter(|i| tab.includes(i.effective_bucket()))
        .collect()
}

/// Everything a rule may look at.
pub struct InsightContext<'a> {
    pub aggregates:    &'a [LenderAggregate],
    pub totals:        &'a PortfolioTotals,
    pub concentration: &'a ConcentrationSnapshot,
    pub pacing:        &'a PortfolioPacing,
    pub lender_pacing: &'a [LenderPacing],
    pub thresholds:    &'a InsightThresholds,
}

/// The contract every insight rule must fulfill.
pub trait InsightRule {
    /// Unique stable name for this rule.
    fn name(&self) -> &'static str;

    /// At most one item per evaluation.
    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem>;
}

// ── Generator ────────────────────────────────────────────────────────────────

pub struct InsightGenerator {
    rules: Vec<Box<dyn InsightRule>>,
}

impl InsightGenerator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The full battery in the documented order.
    pub fn standard() -> Self {
        let mut generator = Self::new();
        generator.register(Box::new(VolumeGrowthRule));
        generator.register(Box::new(ConcentrationRiskRule));
        generator.register(Box::new(BreadthOfGrowthRule));
        generator.register(Box::new(ShareShiftRule));
        generator.register(Box::new(AopPacingRule));
        generator.register(Box::new(CriticalLendersRule));
        generator.register(Box::new(ConversionFloorRule));
        generator.register(Box::new(TopLenderRule));
        generator
    }

    /// Register a rule. Call in the documented evaluation order.
    pub fn register(&mut self, rule: Box<dyn InsightRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn generate(&self, ctx: &InsightContext<'_>) -> Vec<RichInsightItem> {
        let mut items = Vec::new();
        for rule in &self.rules {
            if let Some(item) = rule.evaluate(ctx) {
                log::debug!(
                    "insight: rule {} fired {} ({:?}, weight={})",
                    rule.name(),
                    item.id,
                    item.severity,
                    item.impact_weight
                );
                items.push(item);
            }
        }
        items
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Rules ────────────────────────────────────────────────────────────────────

fn lender_chart<F: Fn(&LenderAggregate) -> f64>(aggs: &[LenderAggregate], value: F) -> Vec<ChartPoint> {
    aggs.iter()
        .map(|a| ChartPoint { label: a.lender.clone(), value: value(a) })
        .collect()
}

/// 1. Growth above the positive threshold or below the negative one.
pub struct VolumeGrowthRule;

impl InsightRule for VolumeGrowthRule {
    fn name(&self) -> &'static str {
        "volume_growth"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let growth = ctx.totals.growth_pct;
        let t = ctx.thresholds;

        let bullets = vec![
            format!("MTD disbursed: {}", ctx.totals.disbursed),
            format!("LMTD disbursed: {}", ctx.totals.lmtd_disbursed),
            format!("{} lenders growing, {} declining",
                ctx.concentration.growing_count, ctx.concentration.declining_count),
        ];
        let expanded = InsightDetail {
            bullets,
            chart_data: lender_chart(ctx.aggregates, |a| a.growth_pct),
            lenders: Vec::new(),
        };

        if growth > t.growth_positive_pct {
            Some(
                RichInsightItem::new(InsightKind::VolumeGrowth, Severity::Good, WEIGHT_VOLUME_GROWTH)
                    .titled(
                        format!("Disbursals up {growth:.1}% vs LMTD"),
                        format!("Volume is growing faster than the {:.0}% bar.", t.growth_positive_pct),
                    )
                    .bucket(PriorityBucket::Positive)
                    .expanded(expanded),
            )
        } else if growth < t.growth_negative_pct {
            Some(
                RichInsightItem::new(InsightKind::VolumeDecline, Severity::Bad, WEIGHT_VOLUME_DECLINE)
                    .titled(
                        format!("Disbursals down {:.1}% vs LMTD", growth.abs()),
                        format!("Volume fell below the {:.0}% floor.", t.growth_negative_pct),
                    )
                    .expanded(expanded),
            )
        } else {
            None
        }
    }
}

/// 2. Top three lenders hold too much of the book.
pub struct ConcentrationRiskRule;

impl InsightRule for ConcentrationRiskRule {
    fn name(&self) -> &'static str {
        "concentration_risk"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let c = ctx.concentration;
        if c.top3_share <= ctx.thresholds.top3_share_warn_pct {
            return None;
        }
        let top3: Vec<LenderName> = c.pareto.iter().take(3).map(|p| p.lender.clone()).collect();
        let mut bullets = vec![format!("HHI {:.0} ({})", c.hhi, c.level.label())];
        bullets.extend(c.pareto.iter().take(3).map(|p| format!("{}: {:.1}%", p.lender, p.share)));

        Some(
            RichInsightItem::new(InsightKind::ConcentrationRisk, Severity::Warn, WEIGHT_CONCENTRATION_RISK)
                .titled(
                    format!("Top 3 lenders hold {:.1}% of disbursals", c.top3_share),
                    format!("Above the {:.0}% concentration limit.", ctx.thresholds.top3_share_warn_pct),
                )
                .expanded(InsightDetail {
                    bullets,
                    chart_data: c
                        .pareto
                        .iter()
                        .map(|p| ChartPoint { label: p.lender.clone(), value: p.cumulative_share })
                        .collect(),
                    lenders: top3,
                }),
        )
    }
}

/// 3. Always one item for a non-empty lender list.
pub struct BreadthOfGrowthRule;

impl InsightRule for BreadthOfGrowthRule {
    fn name(&self) -> &'static str {
        "breadth_of_growth"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let count = ctx.aggregates.len();
        if count == 0 {
            return None;
        }
        let growing = ctx.concentration.growing_count;
        let growers: Vec<LenderName> = ctx
            .aggregates
            .iter()
            .filter(|a| a.growth_pct > 0.0)
            .map(|a| a.lender.clone())
            .collect();
        let expanded = InsightDetail {
            bullets: vec![
                format!("{growing} of {count} lenders growing"),
                format!("{} declining", ctx.concentration.declining_count),
            ],
            chart_data: lender_chart(ctx.aggregates, |a| a.growth_pct),
            lenders: growers,
        };

        let item = if growing as f64 >= ctx.thresholds.broad_growth_ratio * count as f64 {
            RichInsightItem::new(InsightKind::BroadGrowth, Severity::Good, WEIGHT_BROAD_GROWTH)
                .titled(
                    "Growth is broad-based".to_string(),
                    format!("{growing} of {count} lenders are ahead of LMTD."),
                )
                .bucket(PriorityBucket::Positive)
        } else {
            RichInsightItem::new(InsightKind::NarrowGrowth, Severity::Warn, WEIGHT_NARROW_GROWTH)
                .titled(
                    "Growth is concentrated".to_string(),
                    format!("Only {growing} of {count} lenders are ahead of LMTD."),
                )
        };
        Some(item.expanded(expanded))
    }
}

/// 4. Largest absolute share movement, if above the minimum.
pub struct ShareShiftRule;

impl InsightRule for ShareShiftRule {
    fn name(&self) -> &'static str {
        "share_shift"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let top = ctx.concentration.share_shifts.first()?;
        if top.shift_pp.abs() <= ctx.thresholds.share_shift_min_pp {
            return None;
        }
        let gained = top.shift_pp > 0.0;
        let verb = if gained { "gained" } else { "lost" };
        let mut item = RichInsightItem::new(
            InsightKind::ShareShift,
            if gained { Severity::Info } else { Severity::Warn },
            WEIGHT_SHARE_SHIFT,
        )
        .titled(
            format!("{} {verb} {:.1}pp share", top.lender, top.shift_pp.abs()),
            format!("Share moved from {:.1}% to {:.1}%.", top.lmtd_share, top.mtd_share),
        )
        .expanded(InsightDetail {
            bullets: ctx
                .concentration
                .share_shifts
                .iter()
                .take(5)
                .map(|s| format!("{}: {:+.1}pp", s.lender, s.shift_pp))
                .collect(),
            chart_data: ctx
                .concentration
                .share_shifts
                .iter()
                .map(|s| ChartPoint { label: s.lender.clone(), value: s.shift_pp })
                .collect(),
            lenders: vec![top.lender.clone()],
        });
        if gained {
            item = item.bucket(PriorityBucket::Emerging);
        }
        Some(item)
    }
}

/// 5. Portfolio pacing against the summed monthly AOP. A book with no
/// targets paces at 0% and is behind. Absent only with no lenders.
pub struct AopPacingRule;

impl InsightRule for AopPacingRule {
    fn name(&self) -> &'static str {
        "aop_pacing"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let p = ctx.pacing;
        if ctx.aggregates.is_empty() {
            return None;
        }
        let expanded = InsightDetail {
            bullets: vec![
                format!("Achieved: {:.2} Cr in {} days", p.current_amount_cr, p.calendar.days_elapsed),
                format!("Projected: {:.2} Cr of {:.2} Cr target", p.projected_cr, p.monthly_target_cr),
                format!("Days to target: {}", p.days_to_target),
            ],
            chart_data: ctx
                .lender_pacing
                .iter()
                .map(|l| ChartPoint { label: l.lender.clone(), value: l.pacing_pct })
                .collect(),
            lenders: Vec::new(),
        };

        let item = if p.pacing_pct < ctx.thresholds.pacing_behind_pct {
            RichInsightItem::new(InsightKind::AopBehind, Severity::Bad, WEIGHT_AOP_BEHIND).titled(
                format!("AOP pacing behind at {:.0}%", p.pacing_pct),
                format!("Run-rate projects {:.2} Cr against {:.2} Cr.", p.projected_cr, p.monthly_target_cr),
            )
        } else {
            let severity = if p.pacing_pct >= 100.0 { Severity::Good } else { Severity::Info };
            let item = RichInsightItem::new(InsightKind::AopOnPace, severity, WEIGHT_AOP_ON_PACE).titled(
                format!("AOP on pace at {:.0}%", p.pacing_pct),
                format!("Run-rate projects {:.2} Cr against {:.2} Cr.", p.projected_cr, p.monthly_target_cr),
            );
            if severity == Severity::Good {
                item.bucket(PriorityBucket::Positive)
            } else {
                item
            }
        };
        Some(item.expanded(expanded))
    }
}

/// 6. Every lender pacing below the critical threshold. Lenders without
/// an AOP target pace at 0% and are listed.
pub struct CriticalLendersRule;

impl InsightRule for CriticalLendersRule {
    fn name(&self) -> &'static str {
        "critical_lenders"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let critical: Vec<&LenderPacing> = ctx
            .lender_pacing
            .iter()
            .filter(|l| l.pacing_pct < ctx.thresholds.pacing_critical_pct)
            .collect();
        if critical.is_empty() {
            return None;
        }
        let names: Vec<LenderName> = critical.iter().map(|l| l.lender.clone()).collect();
        Some(
            RichInsightItem::new(InsightKind::CriticalLenders, Severity::Bad, WEIGHT_CRITICAL_LENDERS)
                .titled(
                    format!("{} lender(s) below {:.0}% of AOP pace", critical.len(), ctx.thresholds.pacing_critical_pct),
                    names.join(", "),
                )
                .expanded(InsightDetail {
                    bullets: critical
                        .iter()
                        .map(|l| format!("{}: {:.0}% paced, {} days to target", l.lender, l.pacing_pct, l.days_to_target))
                        .collect(),
                    chart_data: critical
                        .iter()
                        .map(|l| ChartPoint { label: l.lender.clone(), value: l.pacing_pct })
                        .collect(),
                    lenders: names,
                }),
        )
    }
}

/// 7. Portfolio conversion under the floor.
pub struct ConversionFloorRule;

impl InsightRule for ConversionFloorRule {
    fn name(&self) -> &'static str {
        "conversion_floor"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        if ctx.aggregates.is_empty() || ctx.totals.conv_pct >= ctx.thresholds.conversion_floor_pct {
            return None;
        }
        let mut weakest: Vec<&LenderAggregate> = ctx.aggregates.iter().collect();
        weakest.sort_by(|a, b| a.conv_pct.total_cmp(&b.conv_pct).then_with(|| a.lender.cmp(&b.lender)));
        Some(
            RichInsightItem::new(InsightKind::ConversionFloor, Severity::Warn, WEIGHT_CONVERSION_FLOOR)
                .titled(
                    format!("Conversion at {:.1}%", ctx.totals.conv_pct),
                    format!("Below the {:.0}% floor.", ctx.thresholds.conversion_floor_pct),
                )
                .expanded(InsightDetail {
                    bullets: weakest
                        .iter()
                        .take(3)
                        .map(|a| format!("{}: {:.1}%", a.lender, a.conv_pct))
                        .collect(),
                    chart_data: lender_chart(ctx.aggregates, |a| a.conv_pct),
                    lenders: weakest.iter().take(3).map(|a| a.lender.clone()).collect(),
                }),
        )
    }
}

/// 8. Names the largest lender. Absent only with no lenders.
pub struct TopLenderRule;

impl InsightRule for TopLenderRule {
    fn name(&self) -> &'static str {
        "top_lender"
    }

    fn evaluate(&self, ctx: &InsightContext<'_>) -> Option<RichInsightItem> {
        let top = ctx.aggregates.first()?;
        Some(
            RichInsightItem::new(InsightKind::TopLender, Severity::Info, WEIGHT_TOP_LENDER)
                .titled(
                    format!("{} leads with {} disbursals", top.lender, top.disbursed),
                    format!("{:.1}% share, {:+.1}% vs LMTD.", top.share_pct, top.growth_pct),
                )
                .expanded(InsightDetail {
                    bullets: vec![
                        format!("Amount: {:.2} Cr", top.amount_cr),
                        format!("Conversion: {:.1}%", top.conv_pct),
                    ],
                    chart_data: Vec::new(),
                    lenders: vec![top.lender.clone()],
                }),
        )
    }
}
