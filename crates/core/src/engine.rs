//! Service facade: fetch a customer's history, validate it, and run the analyzers.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::analytics::health::{HealthAssessor, HealthPolicy, HealthUpdate};
use crate::analytics::insights::{CustomerInsights, InsightsGenerator};
use crate::analytics::policy::CadencePolicy;
use crate::analytics::predictor::{CadencePrediction, CadencePredictor};
use crate::domain::customer::{CustomerId, CustomerProfile, TenantId};
use crate::domain::order::OrderTimeline;
use crate::errors::ApplicationError;
use crate::history::OrderHistoryAccessor;

/// Orders dated further than this past "now" are treated as corrupt.
const MAX_FUTURE_DAYS: i64 = 366;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub struct CadenceEngine<A, C = SystemClock> {
    accessor: A,
    clock: C,
    predictor: CadencePredictor,
    insights: InsightsGenerator,
    health: HealthAssessor,
}

impl<A: OrderHistoryAccessor> CadenceEngine<A, SystemClock> {
    pub fn new(accessor: A, policy: CadencePolicy) -> Self {
        Self::with_clock(accessor, SystemClock, policy)
    }
}

impl<A: OrderHistoryAccessor, C: Clock> CadenceEngine<A, C> {
    pub fn with_clock(accessor: A, clock: C, policy: CadencePolicy) -> Self {
        Self {
            accessor,
            clock,
            predictor: CadencePredictor::new(policy.clone()),
            insights: InsightsGenerator::new(policy),
            health: HealthAssessor::default(),
        }
    }

    pub fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.health = HealthAssessor::new(policy);
        self
    }

    pub fn policy(&self) -> &CadencePolicy {
        self.predictor.policy()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn predict_next_order_date(
        &self,
        customer_id: &CustomerId,
        tenant_id: &TenantId,
    ) -> Result<CadencePrediction, ApplicationError> {
        self.predict_next_order_date_as_of(customer_id, tenant_id, self.clock.now()).await
    }

    pub async fn predict_next_order_date_as_of(
        &self,
        customer_id: &CustomerId,
        tenant_id: &TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<CadencePrediction, ApplicationError> {
        let timeline = self.load_timeline(tenant_id, customer_id, as_of).await?;
        let prediction = self.predictor.predict(customer_id, &timeline, as_of);

        info!(
            event_name = "engine.prediction.completed",
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            order_count = timeline.len(),
            method = prediction.prediction_method.as_str(),
            confidence_score = prediction.confidence_score,
            "next order date predicted"
        );
        Ok(prediction)
    }

    pub async fn generate_customer_insights(
        &self,
        customer_id: &CustomerId,
        tenant_id: &TenantId,
    ) -> Result<CustomerInsights, ApplicationError> {
        self.generate_customer_insights_as_of(customer_id, tenant_id, self.clock.now()).await
    }

    /// Fetches the history once and derives both the prediction and the insights from it.
    pub async fn generate_customer_insights_as_of(
        &self,
        customer_id: &CustomerId,
        tenant_id: &TenantId,
        as_of: DateTime<Utc>,
    ) -> Result<CustomerInsights, ApplicationError> {
        let timeline = self.load_timeline(tenant_id, customer_id, as_of).await?;
        let prediction = self.predictor.predict(customer_id, &timeline, as_of);
        let insights = self.insights.generate(customer_id, &timeline, &prediction, as_of);

        info!(
            event_name = "engine.insights.completed",
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            order_count = timeline.len(),
            churn_risk = insights.churn_risk.as_str(),
            growth_trend = insights.growth_trend.as_str(),
            "customer insights generated"
        );
        Ok(insights)
    }

    /// Classifies a stored profile against its current history.
    pub async fn assess_health(
        &self,
        profile: &CustomerProfile,
        as_of: DateTime<Utc>,
    ) -> Result<Option<HealthUpdate>, ApplicationError> {
        let timeline = self.load_timeline(&profile.tenant_id, &profile.id, as_of).await?;
        let update = self.health.assess(profile, &timeline, as_of);

        debug!(
            event_name = "engine.health.assessed",
            tenant_id = %profile.tenant_id,
            customer_id = %profile.id,
            changed = update.is_some(),
            "customer health assessed"
        );
        Ok(update)
    }

    async fn load_timeline(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        as_of: DateTime<Utc>,
    ) -> Result<OrderTimeline, ApplicationError> {
        let history = self.accessor.fetch_order_history(tenant_id, customer_id).await?;

        if let Err(error) = history.ensure_scope(tenant_id, customer_id) {
            warn!(
                event_name = "engine.history.scope_violation",
                tenant_id = %tenant_id,
                customer_id = %customer_id,
                error = %error,
                "order history contains records outside the requested scope"
            );
            return Err(error.into());
        }

        let latest = as_of.checked_add_signed(Duration::days(MAX_FUTURE_DAYS)).unwrap_or(as_of);
        let (timeline, dropped) = history.timeline().within(DateTime::<Utc>::UNIX_EPOCH, latest);
        if dropped > 0 {
            warn!(
                event_name = "engine.history.records_dropped",
                tenant_id = %tenant_id,
                customer_id = %customer_id,
                dropped,
                "ignoring orders with out-of-range timestamps"
            );
        }
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::analytics::insights::ChurnRisk;
    use crate::analytics::predictor::{ConfidenceLevel, PredictionMethod};
    use crate::domain::order::{OrderHistory, OrderRecord};
    use crate::errors::DomainError;

    #[derive(Default)]
    struct StubHistory {
        histories: HashMap<(String, String), Vec<OrderRecord>>,
        failure: Option<ApplicationError>,
    }

    impl StubHistory {
        fn with_orders(mut self, tenant: &str, customer: &str, records: Vec<OrderRecord>) -> Self {
            self.histories.insert((tenant.to_string(), customer.to_string()), records);
            self
        }
    }

    #[async_trait]
    impl OrderHistoryAccessor for StubHistory {
        async fn fetch_order_history(
            &self,
            tenant_id: &TenantId,
            customer_id: &CustomerId,
        ) -> Result<OrderHistory, ApplicationError> {
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            let records = self
                .histories
                .get(&(tenant_id.0.clone(), customer_id.0.clone()))
                .cloned()
                .unwrap_or_default();
            Ok(OrderHistory::new(records))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn order(tenant: &str, customer: &str, index: usize, days_ago: i64, total: i64) -> OrderRecord {
        OrderRecord {
            order_id: format!("{customer}-{index}"),
            tenant_id: TenantId::from(tenant),
            customer_id: CustomerId::from(customer),
            occurred_at: now() - Duration::days(days_ago),
            total: Decimal::new(total, 0),
        }
    }

    fn regular(tenant: &str, customer: &str) -> Vec<OrderRecord> {
        (0..6).map(|index| order(tenant, customer, index, 155 - index as i64 * 30, 500)).collect()
    }

    fn engine(history: StubHistory) -> CadenceEngine<StubHistory, FixedClock> {
        CadenceEngine::with_clock(history, FixedClock(now()), CadencePolicy::default())
    }

    #[tokio::test]
    async fn unknown_customer_has_no_prediction() {
        let engine = engine(StubHistory::default());

        let prediction = engine
            .predict_next_order_date(&CustomerId::from("ghost"), &TenantId::from("t1"))
            .await
            .expect("empty history is not an error");

        assert_eq!(prediction.next_expected_order_date, None);
        assert_eq!(prediction.confidence_level, ConfidenceLevel::Low);
        assert_eq!(prediction.prediction_method, PredictionMethod::NoHistory);
    }

    #[tokio::test]
    async fn single_order_uses_default_interval() {
        let history = StubHistory::default().with_orders("t1", "c1", vec![order("t1", "c1", 0, 3, 90)]);

        let prediction = engine(history)
            .predict_next_order_date(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect("prediction");

        assert_eq!(prediction.prediction_method, PredictionMethod::SingleOrderDefault);
        assert_eq!(prediction.confidence_level, ConfidenceLevel::Low);
        assert!(prediction.confidence_score < 50);
    }

    #[tokio::test]
    async fn regular_history_is_predicted_with_high_confidence() {
        let history = StubHistory::default().with_orders("t1", "c1", regular("t1", "c1"));

        let prediction = engine(history)
            .predict_next_order_date(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect("prediction");

        assert_eq!(prediction.confidence_level, ConfidenceLevel::High);
        assert!(prediction.confidence_score > 70);
        assert_eq!(prediction.expected_interval_days, Some(30));
        assert_eq!(prediction.next_expected_order_date, Some(now() + Duration::days(25)));
    }

    #[tokio::test]
    async fn foreign_records_are_rejected() {
        let mut records = regular("t1", "c1");
        records.push(order("t2", "c1", 99, 1, 500));
        let history = StubHistory::default().with_orders("t1", "c1", records);

        let error = engine(history)
            .predict_next_order_date(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect_err("scope violation");

        match error {
            ApplicationError::Domain(DomainError::ScopeViolation { found_tenant, order_id, .. }) => {
                assert_eq!(found_tenant, TenantId::from("t2"));
                assert_eq!(order_id, "c1-99");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn accessor_failures_propagate_unchanged() {
        let failure = ApplicationError::Persistence("connection refused".to_string());
        let history = StubHistory { failure: Some(failure.clone()), ..StubHistory::default() };

        let error = engine(history)
            .generate_customer_insights(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect_err("accessor failure");

        assert_eq!(error, failure);
    }

    #[tokio::test]
    async fn out_of_range_timestamps_are_dropped() {
        let mut records = regular("t1", "c1");
        let mut far_future = order("t1", "c1", 50, 0, 500);
        far_future.occurred_at = now() + Duration::days(400);
        let mut before_epoch = order("t1", "c1", 51, 0, 500);
        before_epoch.occurred_at = Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap();
        records.push(far_future);
        records.push(before_epoch);
        let history = StubHistory::default().with_orders("t1", "c1", records);

        let prediction = engine(history)
            .predict_next_order_date(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect("prediction");

        assert_eq!(prediction.expected_interval_days, Some(30));
        assert_eq!(prediction.next_expected_order_date, Some(now() + Duration::days(25)));
    }

    #[tokio::test]
    async fn repeated_calls_return_identical_results() {
        let history = StubHistory::default().with_orders("t1", "c1", regular("t1", "c1"));
        let engine = engine(history);
        let customer = CustomerId::from("c1");
        let tenant = TenantId::from("t1");

        let first = engine.generate_customer_insights(&customer, &tenant).await.expect("insights");
        let second = engine.generate_customer_insights(&customer, &tenant).await.expect("insights");
        let prediction_a = engine.predict_next_order_date(&customer, &tenant).await.expect("prediction");
        let prediction_b = engine.predict_next_order_date(&customer, &tenant).await.expect("prediction");

        assert_eq!(first, second);
        assert_eq!(prediction_a, prediction_b);
    }

    #[tokio::test]
    async fn insights_for_unknown_customer_flag_high_churn() {
        let insights = engine(StubHistory::default())
            .generate_customer_insights(&CustomerId::from("ghost"), &TenantId::from("t1"))
            .await
            .expect("insights");

        assert_eq!(insights.lifetime_value, Decimal::ZERO);
        assert_eq!(insights.average_order_value, Decimal::ZERO);
        assert_eq!(insights.order_frequency, 0.0);
        assert_eq!(insights.churn_risk, ChurnRisk::High);
    }

    #[tokio::test]
    async fn health_assessment_reads_profile_scope() {
        let history = StubHistory::default().with_orders("t1", "c1", regular("t1", "c1"));
        let profile = CustomerProfile::new(TenantId::from("t1"), CustomerId::from("c1"), "Bistro");

        let update = engine(history)
            .assess_health(&profile, now() + Duration::days(80))
            .await
            .expect("assessment")
            .expect("status changes");

        assert_eq!(update.risk_status, crate::domain::customer::RiskStatus::Dormant);
    }

    #[tokio::test]
    async fn single_prediction_is_fast() {
        let records: Vec<OrderRecord> =
            (0..500).map(|index| order("t1", "c1", index, 1500 - index as i64 * 3, 120)).collect();
        let engine = engine(StubHistory::default().with_orders("t1", "c1", records));

        let started = Instant::now();
        engine
            .predict_next_order_date(&CustomerId::from("c1"), &TenantId::from("t1"))
            .await
            .expect("prediction");

        assert!(started.elapsed() < std::time::Duration::from_millis(200));
    }

    #[tokio::test]
    async fn concurrent_predictions_complete_quickly() {
        let mut history = StubHistory::default();
        for index in 0..10 {
            let customer = format!("c{index}");
            history = history.with_orders("t1", &customer, regular("t1", &customer));
        }
        let engine = Arc::new(engine(history));

        let started = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|index| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .predict_next_order_date(
                            &CustomerId(format!("c{index}")),
                            &TenantId::from("t1"),
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            let prediction = handle.await.expect("task joins").expect("prediction");
            assert!(prediction.next_expected_order_date.is_some());
        }

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
