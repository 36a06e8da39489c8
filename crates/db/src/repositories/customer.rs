use async_trait::async_trait;
use cadence_core::analytics::health::HealthUpdate;
use cadence_core::domain::customer::{CustomerId, CustomerProfile, RiskStatus, TenantId};
use cadence_core::errors::ApplicationError;
use cadence_core::history::{CustomerDirectory, CustomerFilter};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use super::{
    decode_decimal, decode_optional_timestamp, encode_timestamp, RepositoryError,
};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, risk_status, last_order_date, \
     next_expected_order_date, average_order_interval_days, established_revenue, \
     dormancy_since, reactivated_date, is_permanently_closed";

/// Inserts or replaces a customer profile.
pub async fn upsert_customer<'e, E>(
    executor: E,
    profile: &CustomerProfile,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO customer (
            id, tenant_id, name, risk_status, last_order_date, next_expected_order_date,
            average_order_interval_days, established_revenue, dormancy_since,
            reactivated_date, is_permanently_closed, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, id) DO UPDATE SET
            name = excluded.name,
            risk_status = excluded.risk_status,
            last_order_date = excluded.last_order_date,
            next_expected_order_date = excluded.next_expected_order_date,
            average_order_interval_days = excluded.average_order_interval_days,
            established_revenue = excluded.established_revenue,
            dormancy_since = excluded.dormancy_since,
            reactivated_date = excluded.reactivated_date,
            is_permanently_closed = excluded.is_permanently_closed,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&profile.id.0)
    .bind(&profile.tenant_id.0)
    .bind(&profile.name)
    .bind(profile.risk_status.as_str())
    .bind(profile.last_order_date.map(encode_timestamp))
    .bind(profile.next_expected_order_date.map(encode_timestamp))
    .bind(profile.average_order_interval_days.map(i64::from))
    .bind(profile.established_revenue.map(|value| value.to_string()))
    .bind(profile.dormancy_since.map(encode_timestamp))
    .bind(profile.reactivated_date.map(encode_timestamp))
    .bind(profile.is_permanently_closed)
    .bind(encode_timestamp(now))
    .bind(encode_timestamp(now))
    .execute(executor)
    .await?;

    Ok(())
}

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, profile: &CustomerProfile) -> Result<(), RepositoryError> {
        upsert_customer(&self.pool, profile, Utc::now()).await
    }

    pub async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE tenant_id = ?1 AND id = ?2"
        ))
        .bind(&tenant_id.0)
        .bind(&customer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    pub async fn list(
        &self,
        tenant_id: &TenantId,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, RepositoryError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE tenant_id = ?1 AND (?2 = 0 OR is_permanently_closed = 0)
             ORDER BY id ASC
             LIMIT ?3"
        ))
        .bind(&tenant_id.0)
        .bind(filter.only_active)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(profile_from_row).collect()
    }

    pub async fn update_prediction(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        next_expected_order_date: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE customer SET next_expected_order_date = ?1, updated_at = ?2
             WHERE tenant_id = ?3 AND id = ?4",
        )
        .bind(next_expected_order_date.map(encode_timestamp))
        .bind(encode_timestamp(Utc::now()))
        .bind(&tenant_id.0)
        .bind(&customer_id.0)
        .execute(&self.pool)
        .await?;

        ensure_updated(result.rows_affected(), tenant_id, customer_id)
    }

    pub async fn update_health(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        update: &HealthUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE customer SET
                risk_status = ?1,
                last_order_date = ?2,
                next_expected_order_date = ?3,
                average_order_interval_days = ?4,
                dormancy_since = ?5,
                reactivated_date = ?6,
                updated_at = ?7
            WHERE tenant_id = ?8 AND id = ?9
            "#,
        )
        .bind(update.risk_status.as_str())
        .bind(encode_timestamp(update.last_order_date))
        .bind(update.next_expected_order_date.map(encode_timestamp))
        .bind(update.average_order_interval_days.map(i64::from))
        .bind(update.dormancy_since.map(encode_timestamp))
        .bind(update.reactivated_date.map(encode_timestamp))
        .bind(encode_timestamp(Utc::now()))
        .bind(&tenant_id.0)
        .bind(&customer_id.0)
        .execute(&self.pool)
        .await?;

        ensure_updated(result.rows_affected(), tenant_id, customer_id)
    }
}

#[async_trait]
impl CustomerDirectory for SqlCustomerRepository {
    async fn list_customers(
        &self,
        tenant_id: &TenantId,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerProfile>, ApplicationError> {
        Ok(self.list(tenant_id, filter).await?)
    }

    async fn record_prediction(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        next_expected_order_date: Option<DateTime<Utc>>,
    ) -> Result<(), ApplicationError> {
        Ok(self.update_prediction(tenant_id, customer_id, next_expected_order_date).await?)
    }

    async fn apply_health_update(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        update: &HealthUpdate,
    ) -> Result<(), ApplicationError> {
        Ok(self.update_health(tenant_id, customer_id, update).await?)
    }
}

fn ensure_updated(
    rows_affected: u64,
    tenant_id: &TenantId,
    customer_id: &CustomerId,
) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        return Err(RepositoryError::NotFound(format!(
            "customer `{customer_id}` in tenant `{tenant_id}`"
        )));
    }
    Ok(())
}

fn profile_from_row(row: &SqliteRow) -> Result<CustomerProfile, RepositoryError> {
    let risk_status: String = row.try_get("risk_status")?;
    let interval: Option<i64> = row.try_get("average_order_interval_days")?;
    let established_revenue: Option<String> = row.try_get("established_revenue")?;

    Ok(CustomerProfile {
        id: CustomerId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        risk_status: RiskStatus::parse(&risk_status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown risk_status `{risk_status}`"))
        })?,
        last_order_date: decode_optional_timestamp(
            "last_order_date",
            row.try_get("last_order_date")?,
        )?,
        next_expected_order_date: decode_optional_timestamp(
            "next_expected_order_date",
            row.try_get("next_expected_order_date")?,
        )?,
        average_order_interval_days: interval
            .map(|days| {
                u32::try_from(days).map_err(|_| {
                    RepositoryError::Decode(format!("average_order_interval_days `{days}`"))
                })
            })
            .transpose()?,
        established_revenue: established_revenue
            .map(|raw| decode_decimal("established_revenue", &raw))
            .transpose()?,
        dormancy_since: decode_optional_timestamp("dormancy_since", row.try_get("dormancy_since")?)?,
        reactivated_date: decode_optional_timestamp(
            "reactivated_date",
            row.try_get("reactivated_date")?,
        )?,
        is_permanently_closed: row.try_get("is_permanently_closed")?,
    })
}
