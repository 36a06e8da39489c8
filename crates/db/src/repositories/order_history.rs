use async_trait::async_trait;
use cadence_core::domain::customer::{CustomerId, TenantId};
use cadence_core::domain::order::{OrderHistory, OrderRecord};
use cadence_core::errors::ApplicationError;
use cadence_core::history::OrderHistoryAccessor;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use super::{decode_decimal, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Draft,
    Submitted,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Fulfilled => "FULFILLED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether the order counts toward cadence history.
    pub fn is_realized(&self) -> bool {
        matches!(self, Self::Submitted | Self::Fulfilled)
    }
}

/// Write-side shape of a stored order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub id: String,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub total: Decimal,
}

/// Inserts or replaces one order row.
pub async fn upsert_order<'e, E>(executor: E, order: &NewOrder) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO customer_order (
            id, tenant_id, customer_id, status, ordered_at, delivered_at, total, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, id) DO UPDATE SET
            customer_id = excluded.customer_id,
            status = excluded.status,
            ordered_at = excluded.ordered_at,
            delivered_at = excluded.delivered_at,
            total = excluded.total
        "#,
    )
    .bind(&order.id)
    .bind(&order.tenant_id.0)
    .bind(&order.customer_id.0)
    .bind(order.status.as_str())
    .bind(encode_timestamp(order.ordered_at))
    .bind(order.delivered_at.map(encode_timestamp))
    .bind(order.total.to_string())
    .bind(encode_timestamp(order.ordered_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub struct SqlOrderHistoryRepository {
    pool: DbPool,
}

impl SqlOrderHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, order: &NewOrder) -> Result<(), RepositoryError> {
        upsert_order(&self.pool, order).await
    }

    /// Realized orders only, timestamped by delivery when delivered and by placement otherwise.
    pub async fn load_history(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<OrderHistory, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, customer_id,
                COALESCE(delivered_at, ordered_at) AS occurred_at,
                total
            FROM customer_order
            WHERE tenant_id = ?1
              AND customer_id = ?2
              AND status IN ('FULFILLED', 'SUBMITTED')
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(&tenant_id.0)
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        let records = rows.iter().map(order_record_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(OrderHistory::new(records))
    }
}

#[async_trait]
impl OrderHistoryAccessor for SqlOrderHistoryRepository {
    async fn fetch_order_history(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<OrderHistory, ApplicationError> {
        Ok(self.load_history(tenant_id, customer_id).await?)
    }
}

fn order_record_from_row(row: &SqliteRow) -> Result<OrderRecord, RepositoryError> {
    let occurred_at: String = row.try_get("occurred_at")?;
    let total: String = row.try_get("total")?;

    Ok(OrderRecord {
        order_id: row.try_get("id")?,
        tenant_id: TenantId(row.try_get("tenant_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        occurred_at: decode_timestamp("occurred_at", &occurred_at)?,
        total: decode_decimal("total", &total)?,
    })
}
