//! Next-order-date prediction.
//!
//! The predictor picks one of three branches by how much history exists:
//!
//! | orders | method | date |
//! |---|---|---|
//! | 0 | `no_history` | none |
//! | 1 | `single_order_default` | last order + default interval |
//! | 2+ | `ema_trend` / `ema_trend_seasonality` | last order + adjusted interval |
//!
//! For two or more orders the EMA-smoothed gap is biased toward the fitted trend, then
//! optionally pulled toward the peak month's typical gap. A predicted date in the past is
//! returned unchanged: it is how an overdue customer shows up.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::intervals::{analyze_intervals, IntervalSeries, TrendDirection, TrendResult};
use crate::analytics::policy::CadencePolicy;
use crate::analytics::seasonality::{
    detect_seasonality, month_distance, typical_gap_for_month, SeasonalityResult,
};
use crate::analytics::stats;
use crate::domain::customer::CustomerId;
use crate::domain::order::OrderTimeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
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
pub enum PredictionMethod {
    NoHistory,
    SingleOrderDefault,
    EmaTrend,
    EmaTrendSeasonality,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoHistory => "no_history",
            Self::SingleOrderDefault => "single_order_default",
            Self::EmaTrend => "ema_trend",
            Self::EmaTrendSeasonality => "ema_trend_seasonality",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFactors {
    pub trend_direction: TrendDirection,
    pub trend_strength: f64,
    pub seasonality_factor: f64,
    /// Short description such as `"6 orders, avg 30 days apart"`.
    pub historical_pattern: String,
    /// EMA alpha used for the smoothed interval; zero when no smoothing happened.
    pub recent_activity_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadencePrediction {
    pub customer_id: CustomerId,
    pub next_expected_order_date: Option<DateTime<Utc>>,
    /// Days between the last order and `next_expected_order_date`.
    pub expected_interval_days: Option<u32>,
    pub confidence_level: ConfidenceLevel,
    pub confidence_score: u8,
    pub prediction_method: PredictionMethod,
    pub factors: PredictionFactors,
}

#[derive(Debug, Clone, Default)]
pub struct CadencePredictor {
    policy: CadencePolicy,
}

impl CadencePredictor {
    pub fn new(policy: CadencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CadencePolicy {
        &self.policy
    }

    pub fn predict(
        &self,
        customer_id: &CustomerId,
        timeline: &OrderTimeline,
        as_of: DateTime<Utc>,
    ) -> CadencePrediction {
        let Some(last) = timeline.last() else {
            return CadencePrediction {
                customer_id: customer_id.clone(),
                next_expected_order_date: None,
                expected_interval_days: None,
                confidence_level: ConfidenceLevel::Low,
                confidence_score: 0,
                prediction_method: PredictionMethod::NoHistory,
                factors: flat_factors("no orders"),
            };
        };

        if timeline.len() == 1 {
            let interval = self.policy.default_interval_days;
            return CadencePrediction {
                customer_id: customer_id.clone(),
                next_expected_order_date: add_days(last.occurred_at, interval),
                expected_interval_days: Some(interval),
                confidence_level: ConfidenceLevel::Low,
                confidence_score: self.policy.single_order_confidence,
                prediction_method: PredictionMethod::SingleOrderDefault,
                factors: flat_factors("insufficient data"),
            };
        }

        let analysis = analyze_intervals(timeline, &self.policy);
        let seasonality = detect_seasonality(timeline, &self.policy);
        let smoothed = analysis.smoothed_interval.unwrap_or(self.policy.default_interval_days as f64);

        let trended = self.adjust_for_trend(smoothed, &analysis.trend);
        let (interval, method) = match self.adjust_for_seasonality(
            trended,
            last.occurred_at,
            &seasonality,
            &analysis.series,
        ) {
            Some(seasonal) => (seasonal, PredictionMethod::EmaTrendSeasonality),
            None => (trended, PredictionMethod::EmaTrend),
        };
        let interval_days = self.round_interval(interval);

        let days_since_last = (as_of - last.occurred_at).num_days().max(0) as f64;
        let confidence_score = self.confidence_score(
            timeline.len(),
            analysis.series.coefficient_of_variation(),
            days_since_last,
            f64::from(interval_days),
        );

        CadencePrediction {
            customer_id: customer_id.clone(),
            next_expected_order_date: add_days(last.occurred_at, interval_days),
            expected_interval_days: Some(interval_days),
            confidence_level: self.confidence_level(confidence_score),
            confidence_score,
            prediction_method: method,
            factors: PredictionFactors {
                trend_direction: analysis.trend.direction,
                trend_strength: analysis.trend.strength,
                seasonality_factor: seasonality.seasonality_factor,
                historical_pattern: format!(
                    "{} orders, avg {} days apart",
                    timeline.len(),
                    analysis.series.mean().round()
                ),
                recent_activity_weight: self.policy.ema_alpha,
            },
        }
    }

    /// Lengthens or shortens the interval by `weight * strength`, never below the floor.
    fn adjust_for_trend(&self, interval: f64, trend: &TrendResult) -> f64 {
        let bias = self.policy.trend_adjustment_weight * trend.strength;
        let factor = match trend.direction {
            TrendDirection::Increasing => 1.0 + bias,
            TrendDirection::Decreasing => 1.0 - bias,
            TrendDirection::Stable => 1.0,
        };
        (interval * factor).max(f64::from(self.policy.min_interval_days))
    }

    /// Blends toward the peak month's typical gap when the projected order lands in or
    /// next to the peak month. `None` means no seasonal adjustment applies.
    fn adjust_for_seasonality(
        &self,
        interval: f64,
        last_order_at: DateTime<Utc>,
        seasonality: &SeasonalityResult,
        series: &IntervalSeries,
    ) -> Option<f64> {
        if !seasonality.has_strong_seasonality {
            return None;
        }
        let peak_month = seasonality.peak_month?;
        let projected = add_days(last_order_at, self.round_interval(interval))?;
        if month_distance(projected.month(), peak_month) > 1 {
            return None;
        }
        let typical = typical_gap_for_month(series, peak_month)?;

        let blend = self.policy.seasonal_blend_weight * seasonality.seasonality_factor;
        let blended = (1.0 - blend) * interval + blend * typical;
        Some(blended.max(f64::from(self.policy.min_interval_days)))
    }

    fn round_interval(&self, interval: f64) -> u32 {
        let floor = self.policy.min_interval_days;
        let rounded = stats::finite_or_zero(interval).round();
        if rounded >= f64::from(u32::MAX) {
            return u32::MAX;
        }
        (rounded as u32).max(floor)
    }

    /// `cap(order_count) * (w_reg * regularity + w_rec * recency)`, rounded into 0..=100.
    ///
    /// Regularity falls linearly with the interval CV and hits zero at
    /// `regularity_cv_ceiling`. Recency is 1 while the customer is within the expected
    /// interval and falls to zero at `stale_interval_multiple` times that interval.
    pub fn confidence_score(
        &self,
        order_count: usize,
        interval_cv: f64,
        days_since_last: f64,
        expected_interval: f64,
    ) -> u8 {
        let policy = &self.policy;
        let extra_orders = order_count.saturating_sub(2) as f64;
        let cap = (policy.confidence_cap_base + policy.confidence_cap_step * extra_orders)
            .min(policy.confidence_cap_max)
            .clamp(0.0, 100.0);

        let regularity =
            (1.0 - stats::finite_or_zero(interval_cv) / policy.regularity_cv_ceiling).clamp(0.0, 1.0);

        let expected = expected_interval.max(1.0);
        let recency = if days_since_last <= expected {
            1.0
        } else {
            let stale_at = expected * policy.stale_interval_multiple;
            ((stale_at - days_since_last) / (stale_at - expected)).clamp(0.0, 1.0)
        };

        let weighted = policy.regularity_weight * regularity + policy.recency_weight * recency;
        stats::finite_or_zero(cap * weighted).round().clamp(0.0, 100.0) as u8
    }

    pub fn confidence_level(&self, score: u8) -> ConfidenceLevel {
        if score > self.policy.high_confidence_above {
            ConfidenceLevel::High
        } else if score >= self.policy.medium_confidence_min {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

fn flat_factors(pattern: &str) -> PredictionFactors {
    PredictionFactors {
        trend_direction: TrendDirection::Stable,
        trend_strength: 0.0,
        seasonality_factor: 0.0,
        historical_pattern: pattern.to_string(),
        recent_activity_weight: 0.0,
    }
}

fn add_days(timestamp: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    timestamp.checked_add_signed(Duration::days(i64::from(days)))
}
