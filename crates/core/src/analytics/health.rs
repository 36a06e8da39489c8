//! Daily account health classification: dormancy, cadence risk and revenue risk.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::{CustomerProfile, RiskStatus};
use crate::domain::order::OrderTimeline;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    pub dormant_after_days: i64,
    pub at_risk_after_days: i64,
    pub pace_window_orders: usize,
    pub revenue_window_orders: usize,
    pub revenue_decline_ratio: Decimal,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            dormant_after_days: 45,
            at_risk_after_days: 1,
            pace_window_orders: 5,
            revenue_window_orders: 3,
            revenue_decline_ratio: Decimal::new(85, 2),
        }
    }
}

impl HealthPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.at_risk_after_days < 1 {
            return Err("health.at_risk_after_days must be at least 1".to_string());
        }
        if self.dormant_after_days < self.at_risk_after_days {
            return Err(
                "health.dormant_after_days must not be lower than health.at_risk_after_days"
                    .to_string(),
            );
        }
        if self.pace_window_orders < 2 {
            return Err("health.pace_window_orders must be at least 2".to_string());
        }
        if self.revenue_window_orders == 0 {
            return Err("health.revenue_window_orders must be greater than zero".to_string());
        }
        if self.revenue_decline_ratio <= Decimal::ZERO || self.revenue_decline_ratio > Decimal::ONE
        {
            return Err("health.revenue_decline_ratio must be in (0, 1]".to_string());
        }
        Ok(())
    }
}

/// New values for the health fields of a stored profile. Every field is written as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthUpdate {
    pub risk_status: RiskStatus,
    pub last_order_date: DateTime<Utc>,
    pub next_expected_order_date: Option<DateTime<Utc>>,
    pub average_order_interval_days: Option<u32>,
    pub dormancy_since: Option<DateTime<Utc>>,
    pub reactivated_date: Option<DateTime<Utc>>,
}

impl HealthUpdate {
    /// True when the profile was dormant and this update brings it back.
    pub fn is_reactivation(&self, previous: &CustomerProfile) -> bool {
        previous.dormancy_since.is_some()
            && self.risk_status != RiskStatus::Dormant
            && self.reactivated_date.is_some()
    }

    pub fn apply_to(&self, profile: &mut CustomerProfile) {
        profile.risk_status = self.risk_status;
        profile.last_order_date = Some(self.last_order_date);
        profile.next_expected_order_date = self.next_expected_order_date;
        profile.average_order_interval_days = self.average_order_interval_days;
        profile.dormancy_since = self.dormancy_since;
        profile.reactivated_date = self.reactivated_date;
    }
}

#[derive(Clone, Debug, Default)]
pub struct HealthAssessor {
    policy: HealthPolicy,
}

impl HealthAssessor {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Returns `None` when the customer has no orders or nothing would change.
    pub fn assess(
        &self,
        profile: &CustomerProfile,
        timeline: &OrderTimeline,
        as_of: DateTime<Utc>,
    ) -> Option<HealthUpdate> {
        let last_order_date = timeline.last()?.occurred_at;

        let pace = self.ordering_pace(timeline);
        let next_expected_order_date =
            pace.and_then(|days| last_order_date.checked_add_signed(Duration::days(i64::from(days))));
        let days_since_expected =
            next_expected_order_date.map(|next| (as_of - next).num_days()).unwrap_or(0);

        let mut dormancy_since = profile.dormancy_since;
        let mut reactivated_date = profile.reactivated_date;

        let risk_status = if days_since_expected >= self.policy.dormant_after_days {
            if profile.dormancy_since.is_none() {
                dormancy_since = Some(as_of);
                reactivated_date = None;
            }
            RiskStatus::Dormant
        } else {
            if profile.dormancy_since.is_some() {
                reactivated_date = Some(as_of);
                dormancy_since = None;
            }
            if days_since_expected >= self.policy.at_risk_after_days {
                RiskStatus::AtRiskCadence
            } else if self.revenue_declined(timeline, profile.established_revenue) {
                RiskStatus::AtRiskRevenue
            } else {
                RiskStatus::Healthy
            }
        };

        let update = HealthUpdate {
            risk_status,
            last_order_date,
            next_expected_order_date,
            average_order_interval_days: pace,
            dormancy_since,
            reactivated_date,
        };

        let unchanged = profile.risk_status == update.risk_status
            && profile.last_order_date == Some(update.last_order_date)
            && profile.next_expected_order_date == update.next_expected_order_date
            && profile.average_order_interval_days == update.average_order_interval_days
            && profile.dormancy_since == update.dormancy_since
            && profile.reactivated_date == update.reactivated_date;

        (!unchanged).then_some(update)
    }

    /// Rounded mean of the positive day gaps among the most recent orders.
    pub fn ordering_pace(&self, timeline: &OrderTimeline) -> Option<u32> {
        let records = timeline.records();
        let window = self.policy.pace_window_orders.min(records.len());
        let recent = &records[records.len() - window..];

        let gaps: Vec<i64> = recent
            .windows(2)
            .map(|pair| (pair[1].occurred_at - pair[0].occurred_at).num_days())
            .filter(|days| *days > 0)
            .collect();
        if gaps.is_empty() {
            return None;
        }

        let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        u32::try_from(mean.round() as i64).ok()
    }

    fn revenue_declined(&self, timeline: &OrderTimeline, established: Option<Decimal>) -> bool {
        let Some(established) = established.filter(|value| *value > Decimal::ZERO) else {
            return false;
        };

        let records = timeline.records();
        let window = self.policy.revenue_window_orders.min(records.len());
        let recent: Vec<Decimal> = records[records.len() - window..]
            .iter()
            .map(|record| record.total)
            .filter(|total| *total > Decimal::ZERO)
            .collect();
        if recent.is_empty() {
            return false;
        }

        let recent_average = recent.iter().copied().sum::<Decimal>() / Decimal::from(recent.len());
        recent_average < established * self.policy.revenue_decline_ratio
    }
}
