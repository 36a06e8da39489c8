//! Collaborator seams: where order history comes from and where derived customer state goes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::analytics::health::HealthUpdate;
use crate::domain::customer::{CustomerId, CustomerProfile, TenantId};
use crate::domain::order::OrderHistory;
use crate::errors::ApplicationError;

/// Supplies the fulfilled or submitted orders of one customer within one tenant.
#[async_trait]
pub trait OrderHistoryAccessor: Send + Sync {
    async fn fetch_order_history(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<OrderHistory, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerFilter {
    /// Skip permanently closed customers.
    pub only_active: bool,
    pub limit: Option<u32>,
}

impl Default for CustomerFilter {
    fn default() -> Self {
        Self { only_active: true, limit: None }
    }
}

/// Stored customer profiles used by the batch jobs.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn list_customers(
        &self,
        tenant_id: &TenantId,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, ApplicationError>;

    async fn record_prediction(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        next_expected_order_date: Option<DateTime<Utc>>,
    ) -> Result<(), ApplicationError>;

    async fn apply_health_update(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        update: &HealthUpdate,
    ) -> Result<(), ApplicationError>;
}

#[async_trait]
impl<T: OrderHistoryAccessor + ?Sized> OrderHistoryAccessor for std::sync::Arc<T> {
    async fn fetch_order_history(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<OrderHistory, ApplicationError> {
        (**self).fetch_order_history(tenant_id, customer_id).await
    }
}
