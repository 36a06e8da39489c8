use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use cadence_core::analytics::health::HealthUpdate;
use cadence_core::domain::customer::{CustomerId, CustomerProfile, TenantId};
use cadence_core::domain::order::{OrderHistory, OrderRecord};
use cadence_core::errors::ApplicationError;
use cadence_core::history::{CustomerDirectory, CustomerFilter, OrderHistoryAccessor};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::RepositoryError;

type ScopeKey = (String, String);

fn scope_key(tenant_id: &TenantId, customer_id: &CustomerId) -> ScopeKey {
    (tenant_id.0.clone(), customer_id.0.clone())
}

/// Order history kept in process memory, keyed by the record's own tenant and customer.
#[derive(Default)]
pub struct InMemoryOrderHistory {
    orders: RwLock<HashMap<ScopeKey, Vec<OrderRecord>>>,
}

impl InMemoryOrderHistory {
    pub async fn insert(&self, record: OrderRecord) {
        let mut orders = self.orders.write().await;
        orders.entry(scope_key(&record.tenant_id, &record.customer_id)).or_default().push(record);
    }
}

#[async_trait]
impl OrderHistoryAccessor for InMemoryOrderHistory {
    async fn fetch_order_history(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<OrderHistory, ApplicationError> {
        let orders = self.orders.read().await;
        let records = orders.get(&scope_key(tenant_id, customer_id)).cloned().unwrap_or_default();
        Ok(OrderHistory::new(records))
    }
}

#[derive(Default)]
pub struct InMemoryCustomerDirectory {
    customers: RwLock<BTreeMap<ScopeKey, CustomerProfile>>,
}

impl InMemoryCustomerDirectory {
    pub async fn save(&self, profile: CustomerProfile) {
        let mut customers = self.customers.write().await;
        customers.insert(scope_key(&profile.tenant_id, &profile.id), profile);
    }

    pub async fn find(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Option<CustomerProfile> {
        let customers = self.customers.read().await;
        customers.get(&scope_key(tenant_id, customer_id)).cloned()
    }
}

fn missing(tenant_id: &TenantId, customer_id: &CustomerId) -> ApplicationError {
    RepositoryError::NotFound(format!("customer `{customer_id}` in tenant `{tenant_id}`")).into()
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn list_customers(
        &self,
        tenant_id: &TenantId,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, ApplicationError> {
        let customers = self.customers.read().await;
        let limit = filter.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);
        Ok(customers
            .values()
            .filter(|profile| profile.tenant_id == *tenant_id)
            .filter(|profile| !filter.only_active || !profile.is_permanently_closed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_prediction(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        next_expected_order_date: Option<DateTime<Utc>>,
    ) -> Result<(), ApplicationError> {
        let mut customers = self.customers.write().await;
        let profile = customers
            .get_mut(&scope_key(tenant_id, customer_id))
            .ok_or_else(|| missing(tenant_id, customer_id))?;
        profile.next_expected_order_date = next_expected_order_date;
        Ok(())
    }

    async fn apply_health_update(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        update: &HealthUpdate,
    ) -> Result<(), ApplicationError> {
        let mut customers = self.customers.write().await;
        let profile = customers
            .get_mut(&scope_key(tenant_id, customer_id))
            .ok_or_else(|| missing(tenant_id, customer_id))?;
        update.apply_to(profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::analytics::policy::CadencePolicy;
    use cadence_core::batch::{run_health_assessment, HealthAssessmentSummary};
    use cadence_core::domain::customer::{CustomerId, CustomerProfile, RiskStatus, TenantId};
    use cadence_core::domain::order::OrderRecord;
    use cadence_core::engine::{CadenceEngine, FixedClock};
    use cadence_core::history::{CustomerDirectory, CustomerFilter, OrderHistoryAccessor};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{InMemoryCustomerDirectory, InMemoryOrderHistory};

    fn record(tenant: &str, customer: &str, id: &str, day: u32) -> OrderRecord {
        OrderRecord {
            order_id: id.to_string(),
            tenant_id: TenantId::from(tenant),
            customer_id: CustomerId::from(customer),
            occurred_at: Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap(),
            total: Decimal::new(300, 0),
        }
    }

    #[tokio::test]
    async fn history_is_partitioned_by_tenant_and_customer() {
        let history = InMemoryOrderHistory::default();
        history.insert(record("t1", "c1", "o1", 1)).await;
        history.insert(record("t1", "c1", "o2", 15)).await;
        history.insert(record("t2", "c1", "o3", 20)).await;

        let t1 = history
            .fetch_order_history(&TenantId::from("t1"), &CustomerId::from("c1"))
            .await
            .expect("t1 history");
        let t3 = history
            .fetch_order_history(&TenantId::from("t3"), &CustomerId::from("c1"))
            .await
            .expect("t3 history");

        assert_eq!(t1.len(), 2);
        assert!(t3.is_empty());
    }

    #[tokio::test]
    async fn directory_lists_per_tenant_and_rejects_unknown_updates() {
        let directory = InMemoryCustomerDirectory::default();
        directory
            .save(CustomerProfile::new(TenantId::from("t1"), CustomerId::from("c1"), "Alpha"))
            .await;
        directory
            .save(CustomerProfile::new(TenantId::from("t2"), CustomerId::from("c9"), "Beta"))
            .await;

        let listed = directory
            .list_customers(&TenantId::from("t1"), &CustomerFilter::default())
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);

        let error = directory
            .record_prediction(&TenantId::from("t1"), &CustomerId::from("c9"), None)
            .await
            .expect_err("c9 lives in t2");
        assert_eq!(error.class(), "persistence");
    }

    #[tokio::test]
    async fn health_job_runs_against_in_memory_stores() {
        let history = InMemoryOrderHistory::default();
        for (index, day) in [1u32, 8, 15, 22].into_iter().enumerate() {
            history.insert(record("t1", "c1", &format!("o{index}"), day)).await;
        }
        let directory = InMemoryCustomerDirectory::default();
        directory
            .save(CustomerProfile::new(TenantId::from("t1"), CustomerId::from("c1"), "Alpha"))
            .await;
        let as_of = Utc.with_ymd_and_hms(2025, 5, 22, 12, 0, 0).unwrap() + Duration::days(60);
        let engine =
            CadenceEngine::with_clock(history, FixedClock(as_of), CadencePolicy::default());

        let summary = run_health_assessment(&engine, &directory, &TenantId::from("t1"), 2)
            .await
            .expect("assessment");

        assert_eq!(
            summary,
            HealthAssessmentSummary { analyzed: 1, updated: 1, dormant: 1, ..Default::default() }
        );
        let stored = directory
            .find(&TenantId::from("t1"), &CustomerId::from("c1"))
            .await
            .expect("stored");
        assert_eq!(stored.risk_status, RiskStatus::Dormant);
        assert_eq!(stored.average_order_interval_days, Some(7));
    }
}
