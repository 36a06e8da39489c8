use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::{CustomerId, TenantId};
use crate::errors::DomainError;

/// A realized (fulfilled or submitted) order as handed over by the history accessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    /// Delivery timestamp when known, otherwise the order timestamp.
    pub occurred_at: DateTime<Utc>,
    pub total: Decimal,
}

impl OrderRecord {
    /// Total with negative amounts clamped to zero.
    pub fn billable_total(&self) -> Decimal {
        self.total.max(Decimal::ZERO)
    }
}

/// Order history for one tenant/customer pair, in whatever order the accessor returned it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistory {
    records: Vec<OrderRecord>,
}

impl OrderHistory {
    pub fn new(records: Vec<OrderRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fails on the first record that does not belong to the requested tenant and customer.
    pub fn ensure_scope(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<(), DomainError> {
        match self
            .records
            .iter()
            .find(|record| record.tenant_id != *tenant_id || record.customer_id != *customer_id)
        {
            Some(record) => Err(DomainError::ScopeViolation {
                expected_tenant: tenant_id.clone(),
                expected_customer: customer_id.clone(),
                found_tenant: record.tenant_id.clone(),
                found_customer: record.customer_id.clone(),
                order_id: record.order_id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Chronological copy of the history. The history itself is left untouched.
    pub fn timeline(&self) -> OrderTimeline {
        OrderTimeline::from_unsorted(self.records.clone())
    }
}

impl From<Vec<OrderRecord>> for OrderHistory {
    fn from(records: Vec<OrderRecord>) -> Self {
        Self::new(records)
    }
}

/// Orders sorted ascending by timestamp (ties broken by order id).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderTimeline {
    records: Vec<OrderRecord>,
}

impl OrderTimeline {
    pub fn from_unsorted(mut records: Vec<OrderRecord>) -> Self {
        records.sort_by(|left, right| {
            left.occurred_at.cmp(&right.occurred_at).then_with(|| left.order_id.cmp(&right.order_id))
        });
        Self { records }
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&OrderRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&OrderRecord> {
        self.records.last()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.records.iter().map(|record| record.occurred_at)
    }

    /// Keeps only records whose timestamp falls inside `[earliest, latest]`.
    /// Returns the filtered timeline and how many records were dropped.
    pub fn within(self, earliest: DateTime<Utc>, latest: DateTime<Utc>) -> (Self, usize) {
        let before = self.records.len();
        let records = self
            .records
            .into_iter()
            .filter(|record| record.occurred_at >= earliest && record.occurred_at <= latest)
            .collect::<Vec<_>>();
        let dropped = before - records.len();
        (Self { records }, dropped)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{OrderHistory, OrderRecord};
    use crate::domain::customer::{CustomerId, TenantId};
    use crate::errors::DomainError;

    fn record(id: &str, day: i64, tenant: &str, customer: &str) -> OrderRecord {
        OrderRecord {
            order_id: id.to_string(),
            tenant_id: TenantId::from(tenant),
            customer_id: CustomerId::from(customer),
            occurred_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::days(day),
            total: Decimal::new(10_000, 2),
        }
    }

    #[test]
    fn timeline_sorts_without_mutating_history() {
        let history = OrderHistory::new(vec![
            record("o-3", 40, "t", "c"),
            record("o-1", 0, "t", "c"),
            record("o-2", 20, "t", "c"),
        ]);

        let timeline = history.timeline();

        let ids: Vec<&str> = timeline.records().iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(ids, vec!["o-1", "o-2", "o-3"]);
        assert_eq!(history.records()[0].order_id, "o-3");
    }

    #[test]
    fn ensure_scope_rejects_foreign_customer() {
        let history =
            OrderHistory::new(vec![record("o-1", 0, "t", "c"), record("o-2", 5, "t", "other")]);

        let error = history
            .ensure_scope(&TenantId::from("t"), &CustomerId::from("c"))
            .expect_err("foreign customer must be rejected");

        assert!(matches!(
            error,
            DomainError::ScopeViolation { ref order_id, .. } if order_id == "o-2"
        ));
    }

    #[test]
    fn ensure_scope_rejects_foreign_tenant() {
        let history = OrderHistory::new(vec![record("o-1", 0, "other", "c")]);

        assert!(history.ensure_scope(&TenantId::from("t"), &CustomerId::from("c")).is_err());
    }

    #[test]
    fn billable_total_clamps_negative_amounts() {
        let mut refund = record("o-1", 0, "t", "c");
        refund.total = Decimal::new(-500, 2);

        assert_eq!(refund.billable_total(), Decimal::ZERO);
    }

    #[test]
    fn within_drops_out_of_range_records() {
        let history = OrderHistory::new(vec![
            record("o-1", -20_000, "t", "c"),
            record("o-2", 0, "t", "c"),
            record("o-3", 5_000, "t", "c"),
        ]);
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        let (timeline, dropped) = history.timeline().within(start, end);

        assert_eq!(dropped, 2);
        assert_eq!(timeline.len(), 1);
    }
}
