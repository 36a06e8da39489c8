//! Tenant-wide jobs: refresh stored predictions and run the daily health assessment.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::analytics::health::HealthUpdate;
use crate::domain::customer::{CustomerProfile, RiskStatus, TenantId};
use crate::engine::{CadenceEngine, Clock};
use crate::errors::ApplicationError;
use crate::history::{CustomerDirectory, CustomerFilter, OrderHistoryAccessor};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub limit_customers: u32,
    pub only_active: bool,
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { limit_customers: 1000, only_active: true, concurrency: 8 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub updated: usize,
    pub failed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAssessmentSummary {
    pub analyzed: usize,
    pub updated: usize,
    pub dormant: usize,
    pub at_risk_cadence: usize,
    pub at_risk_revenue: usize,
    pub reactivated: usize,
    pub failed: usize,
}

impl HealthAssessmentSummary {
    fn record(&mut self, previous: &CustomerProfile, update: &HealthUpdate) {
        self.updated += 1;
        match update.risk_status {
            RiskStatus::Dormant => self.dormant += 1,
            RiskStatus::AtRiskCadence => self.at_risk_cadence += 1,
            RiskStatus::AtRiskRevenue => self.at_risk_revenue += 1,
            RiskStatus::Healthy => {}
        }
        if update.is_reactivation(previous) {
            self.reactivated += 1;
        }
    }
}

/// Predicts every listed customer and stores the next expected order date.
/// A failing customer is logged and counted; the rest of the batch continues.
pub async fn batch_update_predictions<A, C, D>(
    engine: &CadenceEngine<A, C>,
    directory: &D,
    tenant_id: &TenantId,
    options: &BatchOptions,
) -> Result<BatchSummary, ApplicationError>
where
    A: OrderHistoryAccessor,
    C: Clock,
    D: CustomerDirectory + ?Sized,
{
    let filter =
        CustomerFilter { only_active: options.only_active, limit: Some(options.limit_customers) };
    let customers = directory.list_customers(tenant_id, &filter).await?;
    let as_of = engine.now();

    info!(
        event_name = "batch.predictions.start",
        tenant_id = %tenant_id,
        customers = customers.len(),
        concurrency = options.concurrency,
        "refreshing customer predictions"
    );

    let outcomes = stream::iter(customers.iter())
        .map(|customer| async move {
            let prediction =
                engine.predict_next_order_date_as_of(&customer.id, tenant_id, as_of).await?;
            directory
                .record_prediction(tenant_id, &customer.id, prediction.next_expected_order_date)
                .await
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            Ok(()) => summary.updated += 1,
            Err(failure) => {
                error!(
                    event_name = "batch.predictions.customer_failed",
                    tenant_id = %tenant_id,
                    error_class = failure.class(),
                    error = %failure,
                    "failed to update prediction"
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        event_name = "batch.predictions.completed",
        tenant_id = %tenant_id,
        updated = summary.updated,
        failed = summary.failed,
        "prediction refresh complete"
    );
    Ok(summary)
}

/// Reclassifies every open customer of the tenant and writes back the changed ones.
pub async fn run_health_assessment<A, C, D>(
    engine: &CadenceEngine<A, C>,
    directory: &D,
    tenant_id: &TenantId,
    concurrency: usize,
) -> Result<HealthAssessmentSummary, ApplicationError>
where
    A: OrderHistoryAccessor,
    C: Clock,
    D: CustomerDirectory + ?Sized,
{
    let filter = CustomerFilter { only_active: true, limit: None };
    let customers = directory.list_customers(tenant_id, &filter).await?;
    let as_of = engine.now();

    info!(
        event_name = "batch.health.start",
        tenant_id = %tenant_id,
        customers = customers.len(),
        "starting customer health assessment"
    );

    let outcomes = stream::iter(customers.iter())
        .map(|customer| async move {
            let update = engine.assess_health(customer, as_of).await?;
            if let Some(update) = &update {
                directory.apply_health_update(tenant_id, &customer.id, update).await?;
            }
            Ok::<_, ApplicationError>((customer, update))
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut summary = HealthAssessmentSummary { analyzed: customers.len(), ..Default::default() };
    for outcome in outcomes {
        match outcome {
            Ok((customer, Some(update))) => summary.record(customer, &update),
            Ok((_, None)) => {}
            Err(failure) => {
                error!(
                    event_name = "batch.health.customer_failed",
                    tenant_id = %tenant_id,
                    error_class = failure.class(),
                    error = %failure,
                    "failed to assess customer health"
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        event_name = "batch.health.completed",
        tenant_id = %tenant_id,
        analyzed = summary.analyzed,
        updated = summary.updated,
        dormant = summary.dormant,
        at_risk_cadence = summary.at_risk_cadence,
        at_risk_revenue = summary.at_risk_revenue,
        reactivated = summary.reactivated,
        failed = summary.failed,
        "customer health assessment complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::*;
    use crate::analytics::policy::CadencePolicy;
    use crate::domain::customer::CustomerId;
    use crate::domain::order::{OrderHistory, OrderRecord};
    use crate::engine::FixedClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 6, 0, 0).unwrap()
    }

    /// Orders every 30 days, the newest `days_ago` days before now.
    fn monthly(customer: &str, days_ago: i64) -> Vec<OrderRecord> {
        (0..4)
            .map(|index| OrderRecord {
                order_id: format!("{customer}-{index}"),
                tenant_id: TenantId::from("t1"),
                customer_id: CustomerId::from(customer),
                occurred_at: now() - Duration::days(days_ago + (3 - index) * 30),
                total: Decimal::new(250, 0),
            })
            .collect()
    }

    #[derive(Default)]
    struct Histories {
        orders: HashMap<String, Vec<OrderRecord>>,
        broken: Vec<String>,
    }

    #[async_trait]
    impl OrderHistoryAccessor for Histories {
        async fn fetch_order_history(
            &self,
            _tenant_id: &TenantId,
            customer_id: &CustomerId,
        ) -> Result<OrderHistory, ApplicationError> {
            if self.broken.contains(&customer_id.0) {
                return Err(ApplicationError::Persistence(format!("timeout for {customer_id}")));
            }
            Ok(OrderHistory::new(self.orders.get(&customer_id.0).cloned().unwrap_or_default()))
        }
    }

    #[derive(Default)]
    struct Directory {
        profiles: Mutex<Vec<CustomerProfile>>,
        predictions: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
    }

    impl Directory {
        fn with(profiles: Vec<CustomerProfile>) -> Self {
            Self { profiles: Mutex::new(profiles), ..Self::default() }
        }
    }

    #[async_trait]
    impl CustomerDirectory for Directory {
        async fn list_customers(
            &self,
            _tenant_id: &TenantId,
            filter: &CustomerFilter,
        ) -> Result<Vec<CustomerProfile>, ApplicationError> {
            let profiles = self.profiles.lock().await;
            let limit = filter.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);
            Ok(profiles
                .iter()
                .filter(|profile| !filter.only_active || !profile.is_permanently_closed)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn record_prediction(
            &self,
            _tenant_id: &TenantId,
            customer_id: &CustomerId,
            next_expected_order_date: Option<DateTime<Utc>>,
        ) -> Result<(), ApplicationError> {
            self.predictions.lock().await.insert(customer_id.0.clone(), next_expected_order_date);
            Ok(())
        }

        async fn apply_health_update(
            &self,
            _tenant_id: &TenantId,
            customer_id: &CustomerId,
            update: &HealthUpdate,
        ) -> Result<(), ApplicationError> {
            let mut profiles = self.profiles.lock().await;
            if let Some(profile) = profiles.iter_mut().find(|profile| profile.id == *customer_id) {
                update.apply_to(profile);
            }
            Ok(())
        }
    }

    fn profile(id: &str) -> CustomerProfile {
        CustomerProfile::new(TenantId::from("t1"), CustomerId::from(id), format!("Shop {id}"))
    }

    fn engine(histories: Histories) -> CadenceEngine<Histories, FixedClock> {
        CadenceEngine::with_clock(histories, FixedClock(now()), CadencePolicy::default())
    }

    #[tokio::test]
    async fn batch_counts_failures_without_aborting() {
        let mut histories = Histories::default();
        histories.orders.insert("a".to_string(), monthly("a", 5));
        histories.orders.insert("b".to_string(), monthly("b", 10));
        histories.broken.push("c".to_string());
        let directory = Directory::with(vec![profile("a"), profile("b"), profile("c"), profile("d")]);

        let summary = batch_update_predictions(
            &engine(histories),
            &directory,
            &TenantId::from("t1"),
            &BatchOptions::default(),
        )
        .await
        .expect("batch runs");

        assert_eq!(summary, BatchSummary { updated: 3, failed: 1 });
        let predictions = directory.predictions.lock().await;
        assert_eq!(predictions.get("a"), Some(&Some(now() + Duration::days(25))));
        assert_eq!(predictions.get("d"), Some(&None));
        assert!(!predictions.contains_key("c"));
    }

    #[tokio::test]
    async fn batch_respects_limit_and_active_filter() {
        let mut closed = profile("closed");
        closed.is_permanently_closed = true;
        let directory = Directory::with(vec![closed, profile("a"), profile("b"), profile("c")]);
        let options = BatchOptions { limit_customers: 2, ..BatchOptions::default() };

        let summary =
            batch_update_predictions(&engine(Histories::default()), &directory, &TenantId::from("t1"), &options)
                .await
                .expect("batch runs");

        assert_eq!(summary.updated, 2);
        assert!(!directory.predictions.lock().await.contains_key("closed"));
    }

    #[tokio::test]
    async fn health_assessment_tallies_statuses() {
        let mut histories = Histories::default();
        histories.orders.insert("healthy".to_string(), monthly("healthy", 5));
        histories.orders.insert("late".to_string(), monthly("late", 40));
        histories.orders.insert("gone".to_string(), monthly("gone", 120));
        histories.orders.insert("back".to_string(), monthly("back", 2));
        histories.broken.push("broken".to_string());

        let mut back = profile("back");
        back.risk_status = RiskStatus::Dormant;
        back.dormancy_since = Some(now() - Duration::days(60));
        let mut closed = profile("closed");
        closed.is_permanently_closed = true;
        let directory = Directory::with(vec![
            profile("healthy"),
            profile("late"),
            profile("gone"),
            back,
            profile("empty"),
            profile("broken"),
            closed,
        ]);

        let summary = run_health_assessment(&engine(histories), &directory, &TenantId::from("t1"), 4)
            .await
            .expect("assessment runs");

        assert_eq!(
            summary,
            HealthAssessmentSummary {
                analyzed: 6,
                updated: 4,
                dormant: 1,
                at_risk_cadence: 1,
                at_risk_revenue: 0,
                reactivated: 1,
                failed: 1,
            }
        );
        let profiles = directory.profiles.lock().await;
        let gone = profiles.iter().find(|profile| profile.id.0 == "gone").expect("stored");
        assert_eq!(gone.risk_status, RiskStatus::Dormant);
        assert_eq!(gone.dormancy_since, Some(now()));
    }
}
