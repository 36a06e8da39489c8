//! Interval analysis: day gaps between consecutive orders, EMA smoothing and a linear
//! trend fit over the gap sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::policy::CadencePolicy;
use crate::analytics::stats;
use crate::domain::order::OrderTimeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Stable => "stable",
            Self::Decreasing => "decreasing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// `min(1, |slope| / mean gap)`.
    pub strength: f64,
}

impl TrendResult {
    pub const STABLE: Self = Self { direction: TrendDirection::Stable, strength: 0.0 };
}

/// One gap between two consecutive orders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalGap {
    /// Whole days between the two orders, never negative.
    pub days: f64,
    /// Timestamp of the later order.
    pub ends_at: DateTime<Utc>,
}

/// Gaps between consecutive orders; `len = orders - 1`, empty below two orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSeries {
    gaps: Vec<IntervalGap>,
}

impl IntervalSeries {
    pub fn from_timeline(timeline: &OrderTimeline) -> Self {
        let gaps = timeline
            .records()
            .windows(2)
            .map(|pair| IntervalGap {
                days: (pair[1].occurred_at - pair[0].occurred_at).num_days().max(0) as f64,
                ends_at: pair[1].occurred_at,
            })
            .collect();
        Self { gaps }
    }

    pub fn gaps(&self) -> &[IntervalGap] {
        &self.gaps
    }

    pub fn days(&self) -> Vec<f64> {
        self.gaps.iter().map(|gap| gap.days).collect()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn mean(&self) -> f64 {
        stats::mean(&self.days())
    }

    pub fn coefficient_of_variation(&self) -> f64 {
        stats::coefficient_of_variation(&self.days())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalAnalysis {
    pub series: IntervalSeries,
    /// Last value of the EMA series; `None` below two orders.
    pub smoothed_interval: Option<f64>,
    pub trend: TrendResult,
}

pub fn analyze_intervals(timeline: &OrderTimeline, policy: &CadencePolicy) -> IntervalAnalysis {
    let series = IntervalSeries::from_timeline(timeline);
    let days = series.days();

    let smoothed_interval =
        stats::exponential_moving_average(&days, policy.ema_alpha).last().copied();
    let trend = calculate_trend(&days, policy);

    IntervalAnalysis { series, smoothed_interval, trend }
}

/// Classifies the gap sequence by its least-squares slope normalized by the mean gap.
pub fn calculate_trend(gaps: &[f64], policy: &CadencePolicy) -> TrendResult {
    if gaps.len() < policy.min_trend_intervals.max(2) {
        return TrendResult::STABLE;
    }

    let average = stats::mean(gaps);
    if average <= f64::EPSILON {
        return TrendResult::STABLE;
    }

    let normalized = stats::finite_or_zero(stats::linear_slope(gaps) / average);
    let direction = if normalized > policy.trend_threshold {
        TrendDirection::Increasing
    } else if normalized < -policy.trend_threshold {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    TrendResult { direction, strength: normalized.abs().min(1.0) }
}
