//! Month-of-year clustering of orders.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::analytics::intervals::IntervalSeries;
use crate::analytics::policy::CadencePolicy;
use crate::analytics::stats;
use crate::domain::order::OrderTimeline;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityResult {
    pub has_strong_seasonality: bool,
    /// Calendar month (1-12) with the most orders, only set when seasonality is strong.
    pub peak_month: Option<u32>,
    /// `min(1, CV)` of the twelve monthly order counts.
    pub seasonality_factor: f64,
}

impl SeasonalityResult {
    pub const NONE: Self =
        Self { has_strong_seasonality: false, peak_month: None, seasonality_factor: 0.0 };
}

/// Order counts per calendar month across all years, index 0 = January.
pub fn monthly_counts(timeline: &OrderTimeline) -> [u32; 12] {
    let mut counts = [0u32; 12];
    for timestamp in timeline.timestamps() {
        counts[timestamp.month0() as usize] += 1;
    }
    counts
}

pub fn detect_seasonality(timeline: &OrderTimeline, policy: &CadencePolicy) -> SeasonalityResult {
    let counts = monthly_counts(timeline);
    let distinct_months = counts.iter().filter(|count| **count > 0).count();
    if distinct_months < 2 {
        return SeasonalityResult::NONE;
    }

    let values: Vec<f64> = counts.iter().map(|count| f64::from(*count)).collect();
    let cv = stats::coefficient_of_variation(&values);

    // A short, evenly spread history has a high CV without any month standing out.
    let peak_month = if cv > policy.seasonality_cv_threshold { peak_month_of(&counts) } else { None };

    SeasonalityResult {
        has_strong_seasonality: peak_month.is_some(),
        peak_month,
        seasonality_factor: cv.min(1.0),
    }
}

/// The month holding the maximum count, or `None` when that maximum is shared.
fn peak_month_of(counts: &[u32; 12]) -> Option<u32> {
    let max = counts.iter().copied().max()?;
    let mut peaks = counts.iter().enumerate().filter(|(_, count)| **count == max);
    match (peaks.next(), peaks.next()) {
        (Some((index, _)), None) => Some(index as u32 + 1),
        _ => None,
    }
}

/// Mean length of the gaps whose later order fell in `month` (1-12).
pub fn typical_gap_for_month(series: &IntervalSeries, month: u32) -> Option<f64> {
    let gaps: Vec<f64> = series
        .gaps()
        .iter()
        .filter(|gap| gap.ends_at.month() == month)
        .map(|gap| gap.days)
        .collect();
    (!gaps.is_empty()).then(|| stats::mean(&gaps))
}

/// Cyclic distance between two calendar months, 0..=6.
pub fn month_distance(left: u32, right: u32) -> u32 {
    let diff = (i64::from(left) - i64::from(right)).rem_euclid(12) as u32;
    diff.min(12 - diff)
}
