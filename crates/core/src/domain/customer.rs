use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for CustomerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Account health classification maintained by the daily assessment job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    #[default]
    Healthy,
    AtRiskCadence,
    AtRiskRevenue,
    Dormant,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::AtRiskCadence => "at_risk_cadence",
            Self::AtRiskRevenue => "at_risk_revenue",
            Self::Dormant => "dormant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "healthy" => Some(Self::Healthy),
            "at_risk_cadence" => Some(Self::AtRiskCadence),
            "at_risk_revenue" => Some(Self::AtRiskRevenue),
            "dormant" => Some(Self::Dormant),
            _ => None,
        }
    }
}

/// Stored customer row as seen by the batch jobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    pub name: String,
    pub risk_status: RiskStatus,
    pub last_order_date: Option<DateTime<Utc>>,
    pub next_expected_order_date: Option<DateTime<Utc>>,
    pub average_order_interval_days: Option<u32>,
    pub established_revenue: Option<Decimal>,
    pub dormancy_since: Option<DateTime<Utc>>,
    pub reactivated_date: Option<DateTime<Utc>>,
    pub is_permanently_closed: bool,
}

impl CustomerProfile {
    pub fn new(tenant_id: TenantId, id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id,
            name: name.into(),
            risk_status: RiskStatus::Healthy,
            last_order_date: None,
            next_expected_order_date: None,
            average_order_interval_days: None,
            established_revenue: None,
            dormancy_since: None,
            reactivated_date: None,
            is_permanently_closed: false,
        }
    }
}
