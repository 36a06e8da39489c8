//! Customer-level aggregates and recommended actions.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::policy::CadencePolicy;
use crate::analytics::predictor::{CadencePrediction, ConfidenceLevel};
use crate::analytics::stats;
use crate::domain::customer::CustomerId;
use crate::domain::order::OrderTimeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
}

impl ChurnRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthTrend {
    Growing,
    Stable,
    Declining,
}

impl GrowthTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Growing => "growing",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInsights {
    pub customer_id: CustomerId,
    pub lifetime_value: Decimal,
    pub average_order_value: Decimal,
    /// Orders per calendar month of activity.
    pub order_frequency: f64,
    pub churn_risk: ChurnRisk,
    pub growth_trend: GrowthTrend,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InsightsGenerator {
    policy: CadencePolicy,
}

impl InsightsGenerator {
    pub fn new(policy: CadencePolicy) -> Self {
        Self { policy }
    }

    pub fn generate(
        &self,
        customer_id: &CustomerId,
        timeline: &OrderTimeline,
        prediction: &CadencePrediction,
        as_of: DateTime<Utc>,
    ) -> CustomerInsights {
        let lifetime_value: Decimal =
            timeline.records().iter().map(|record| record.billable_total()).sum();
        let average_order_value = if timeline.is_empty() {
            Decimal::ZERO
        } else {
            (lifetime_value / Decimal::from(timeline.len())).round_dp(2)
        };
        let order_frequency = match (timeline.first(), timeline.last()) {
            (Some(first), Some(last)) => stats::finite_or_zero(
                timeline.len() as f64
                    / f64::from(active_months_span(first.occurred_at, last.occurred_at)),
            ),
            _ => 0.0,
        };

        let churn_risk = self.churn_risk(timeline, prediction, as_of);
        let growth_trend = self.growth_trend(timeline);

        let mut insights = CustomerInsights {
            customer_id: customer_id.clone(),
            lifetime_value,
            average_order_value,
            order_frequency,
            churn_risk,
            growth_trend,
            recommendations: Vec::new(),
        };
        insights.recommendations = self.recommendations(timeline, &insights, prediction);
        insights
    }

    /// Days since the last order measured in multiples of the expected interval.
    pub fn churn_risk(
        &self,
        timeline: &OrderTimeline,
        prediction: &CadencePrediction,
        as_of: DateTime<Utc>,
    ) -> ChurnRisk {
        let Some(last) = timeline.last() else {
            return ChurnRisk::High;
        };

        let expected = prediction
            .expected_interval_days
            .unwrap_or(self.policy.default_interval_days)
            .max(1);
        let days_since_last = (as_of - last.occurred_at).num_days().max(0) as f64;
        let overdue_ratio = days_since_last / f64::from(expected);

        if overdue_ratio > self.policy.churn_high_multiple {
            ChurnRisk::High
        } else if overdue_ratio > self.policy.churn_medium_multiple {
            ChurnRisk::Medium
        } else {
            ChurnRisk::Low
        }
    }

    /// Compares the most recent window of order totals with the equally sized window
    /// right before it.
    pub fn growth_trend(&self, timeline: &OrderTimeline) -> GrowthTrend {
        let window = self.policy.growth_window_orders.min(timeline.len() / 2);
        if window < 2 {
            return GrowthTrend::Stable;
        }

        let records = timeline.records();
        let split = records.len() - window;
        let recent: Decimal = records[split..].iter().map(|record| record.billable_total()).sum();
        let baseline: Decimal =
            records[split - window..split].iter().map(|record| record.billable_total()).sum();

        if recent > baseline * (Decimal::ONE + self.policy.growth_margin) {
            GrowthTrend::Growing
        } else if recent < baseline * (Decimal::ONE - self.policy.growth_margin) {
            GrowthTrend::Declining
        } else {
            GrowthTrend::Stable
        }
    }

    fn recommendations(
        &self,
        timeline: &OrderTimeline,
        insights: &CustomerInsights,
        prediction: &CadencePrediction,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if timeline.is_empty() {
            recommendations.push("No order history: reach out to activate the account.".to_string());
        }

        match insights.churn_risk {
            ChurnRisk::High => recommendations.push(
                "High churn risk: re-engage with an immediate follow-up call or visit.".to_string(),
            ),
            ChurnRisk::Medium => recommendations.push(
                "Past the usual ordering cadence: contact soon to maintain the relationship."
                    .to_string(),
            ),
            ChurnRisk::Low => {}
        }

        match insights.growth_trend {
            GrowthTrend::Growing => recommendations
                .push("Growing account: consider upselling opportunities.".to_string()),
            GrowthTrend::Declining => recommendations.push(
                "Declining spend trend: investigate satisfaction and changing needs.".to_string(),
            ),
            GrowthTrend::Stable => {}
        }

        if insights.order_frequency > self.policy.high_frequency_threshold {
            recommendations.push(format!(
                "High-frequency customer ({:.1} orders/month): order frequency makes them a good fit for samples and new products.",
                insights.order_frequency
            ));
        }

        if insights.average_order_value > self.policy.high_value_threshold {
            recommendations.push(format!(
                "High-value customer (average order {}): prioritize for personal attention.",
                insights.average_order_value
            ));
        }

        if prediction.confidence_level == ConfidenceLevel::High {
            if let Some(next) = prediction.next_expected_order_date {
                recommendations.push(format!(
                    "Very predictable ordering pattern: next order expected around {}.",
                    next.format("%Y-%m-%d")
                ));
            }
        }

        recommendations
    }
}

/// Calendar months from the first to the last order, never less than one.
pub fn active_months_span(first: DateTime<Utc>, last: DateTime<Utc>) -> u32 {
    let months = (last.year() - first.year()) * 12 + last.month() as i32 - first.month() as i32;
    months.max(1) as u32
}
