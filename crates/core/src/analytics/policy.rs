//! Tunable thresholds for cadence prediction and customer insights.
//!
//! Every magic number the predictor, insights generator and health assessor rely on
//! lives here so operators can override it from the `[engine]` config section.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadencePolicy {
    /// EMA decay in (0, 1); higher values favour the most recent gaps.
    pub ema_alpha: f64,
    /// Interval assumed when a customer has exactly one order.
    pub default_interval_days: u32,
    /// Fixed confidence for single-order predictions (must stay below the medium band).
    pub single_order_confidence: u8,
    /// Normalized slope beyond which the gap sequence counts as trending.
    pub trend_threshold: f64,
    /// Minimum number of gaps before a trend is fitted.
    pub min_trend_intervals: usize,
    /// Scale applied to trend strength when biasing the interval.
    pub trend_adjustment_weight: f64,
    /// Lower bound for any predicted interval.
    pub min_interval_days: u32,
    /// Coefficient of variation of monthly counts above which seasonality is strong.
    pub seasonality_cv_threshold: f64,
    /// Maximum pull toward the peak month's typical gap.
    pub seasonal_blend_weight: f64,
    /// Confidence ceiling for a two-order history.
    pub confidence_cap_base: f64,
    /// Ceiling increase per additional order.
    pub confidence_cap_step: f64,
    pub confidence_cap_max: f64,
    pub regularity_weight: f64,
    pub recency_weight: f64,
    /// Interval CV at which the regularity component reaches zero.
    pub regularity_cv_ceiling: f64,
    /// Multiple of the expected interval at which the recency component reaches zero.
    pub stale_interval_multiple: f64,
    /// Lowest score in the medium band.
    pub medium_confidence_min: u8,
    /// Scores strictly above this value are high confidence.
    pub high_confidence_above: u8,
    pub churn_medium_multiple: f64,
    pub churn_high_multiple: f64,
    /// Orders per revenue window when comparing recent and baseline spend.
    pub growth_window_orders: usize,
    /// Relative margin a recent window must clear to count as growing or declining.
    pub growth_margin: Decimal,
    pub high_value_threshold: Decimal,
    /// Orders per month above which a customer counts as high frequency.
    pub high_frequency_threshold: f64,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            ema_alpha: 0.35,
            default_interval_days: 30,
            single_order_confidence: 30,
            trend_threshold: 0.05,
            min_trend_intervals: 3,
            trend_adjustment_weight: 0.2,
            min_interval_days: 1,
            seasonality_cv_threshold: 0.5,
            seasonal_blend_weight: 0.5,
            confidence_cap_base: 80.0,
            confidence_cap_step: 5.0,
            confidence_cap_max: 95.0,
            regularity_weight: 0.7,
            recency_weight: 0.3,
            regularity_cv_ceiling: 0.75,
            stale_interval_multiple: 3.0,
            medium_confidence_min: 50,
            high_confidence_above: 70,
            churn_medium_multiple: 1.0,
            churn_high_multiple: 2.0,
            growth_window_orders: 4,
            growth_margin: Decimal::new(15, 2),
            high_value_threshold: Decimal::new(1000, 0),
            high_frequency_threshold: 2.0,
        }
    }
}

impl CadencePolicy {
    /// Returns a description of the first inconsistent setting, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha < 1.0) {
            return Err("engine.ema_alpha must be in the open range (0, 1)".to_string());
        }
        if self.default_interval_days == 0 {
            return Err("engine.default_interval_days must be greater than zero".to_string());
        }
        if self.min_interval_days == 0 {
            return Err("engine.min_interval_days must be greater than zero".to_string());
        }
        if self.single_order_confidence >= self.medium_confidence_min {
            return Err(
                "engine.single_order_confidence must stay below engine.medium_confidence_min"
                    .to_string(),
            );
        }
        if self.medium_confidence_min > self.high_confidence_above
            || self.high_confidence_above >= 100
        {
            return Err(
                "engine confidence bands must satisfy medium_confidence_min <= high_confidence_above < 100"
                    .to_string(),
            );
        }
        if !(0.0..=1.0).contains(&self.trend_adjustment_weight) {
            return Err("engine.trend_adjustment_weight must be in range 0..=1".to_string());
        }
        if !(0.0..=1.0).contains(&self.seasonal_blend_weight) {
            return Err("engine.seasonal_blend_weight must be in range 0..=1".to_string());
        }
        if self.regularity_cv_ceiling <= 0.0 || self.stale_interval_multiple <= 1.0 {
            return Err(
                "engine.regularity_cv_ceiling must be positive and engine.stale_interval_multiple above 1"
                    .to_string(),
            );
        }
        let weights = self.regularity_weight + self.recency_weight;
        if self.regularity_weight < 0.0 || self.recency_weight < 0.0 || (weights - 1.0).abs() > 1e-6
        {
            return Err(
                "engine.regularity_weight and engine.recency_weight must be non-negative and sum to 1"
                    .to_string(),
            );
        }
        if !(0.0..=100.0).contains(&self.confidence_cap_base)
            || !(0.0..=100.0).contains(&self.confidence_cap_max)
            || self.confidence_cap_step < 0.0
        {
            return Err("engine confidence caps must be within 0..=100".to_string());
        }
        if self.churn_medium_multiple <= 0.0 || self.churn_high_multiple < self.churn_medium_multiple
        {
            return Err(
                "engine.churn_high_multiple must be >= engine.churn_medium_multiple > 0".to_string(),
            );
        }
        if self.growth_window_orders < 2 {
            return Err("engine.growth_window_orders must be at least 2".to_string());
        }
        if self.growth_margin < Decimal::ZERO || self.growth_margin >= Decimal::ONE {
            return Err("engine.growth_margin must be in range 0..1".to_string());
        }
        if self.high_value_threshold < Decimal::ZERO || self.high_frequency_threshold < 0.0 {
            return Err("engine recommendation thresholds must be non-negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CadencePolicy;

    #[test]
    fn default_policy_is_valid() {
        assert_eq!(CadencePolicy::default().validate(), Ok(()));
    }

    #[test]
    fn alpha_outside_open_unit_range_is_rejected() {
        let policy = CadencePolicy { ema_alpha: 1.0, ..CadencePolicy::default() };
        let error = policy.validate().expect_err("alpha of 1 should fail");
        assert!(error.contains("ema_alpha"));
    }

    #[test]
    fn single_order_confidence_must_stay_low() {
        let policy = CadencePolicy { single_order_confidence: 55, ..CadencePolicy::default() };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn churn_multiples_must_be_ordered() {
        let policy = CadencePolicy {
            churn_medium_multiple: 2.5,
            churn_high_multiple: 2.0,
            ..CadencePolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
