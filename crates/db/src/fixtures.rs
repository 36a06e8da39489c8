use cadence_core::domain::customer::{CustomerId, CustomerProfile, TenantId};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::connection::DbPool;
use crate::repositories::customer::upsert_customer;
use crate::repositories::order_history::{upsert_order, NewOrder, OrderStatus};
use crate::repositories::RepositoryError;

pub const DEMO_TENANT_ID: &str = "tenant-demo";

/// One seeded order, placed `days_ago` days before the anchor.
#[derive(Debug, Clone, Copy)]
struct SeedOrder {
    days_ago: i64,
    total_cents: i64,
    status: OrderStatus,
    /// Days between placement and delivery for fulfilled orders.
    delivery_lag_days: Option<i64>,
}

const fn fulfilled(days_ago: i64, total_cents: i64) -> SeedOrder {
    SeedOrder { days_ago, total_cents, status: OrderStatus::Fulfilled, delivery_lag_days: Some(1) }
}

const fn with_status(days_ago: i64, total_cents: i64, status: OrderStatus) -> SeedOrder {
    SeedOrder { days_ago, total_cents, status, delivery_lag_days: None }
}

#[derive(Debug, Clone, Copy)]
struct SeedCustomerContract {
    customer_id: &'static str,
    name: &'static str,
    pattern: &'static str,
    established_revenue_cents: Option<i64>,
    permanently_closed: bool,
    orders: &'static [SeedOrder],
    description: &'static str,
}

impl SeedCustomerContract {
    fn realized_order_count(&self) -> i64 {
        self.orders.iter().filter(|order| order.status.is_realized()).count() as i64
    }
}

/// Deterministic demo customers covering each ordering pattern the engine distinguishes.
const SEED_CUSTOMERS: &[SeedCustomerContract] = &[
    SeedCustomerContract {
        customer_id: "cust-harbor-cafe",
        name: "Harbor Cafe",
        pattern: "regular",
        established_revenue_cents: Some(45_000),
        permanently_closed: false,
        orders: &[
            fulfilled(152, 45_000),
            fulfilled(122, 46_000),
            fulfilled(92, 44_500),
            fulfilled(62, 45_500),
            fulfilled(32, 45_000),
            with_status(10, 45_000, OrderStatus::Cancelled),
            with_status(4, 46_000, OrderStatus::Submitted),
            with_status(1, 47_000, OrderStatus::Draft),
        ],
        description: "Orders every 30 days like clockwork",
    },
    SeedCustomerContract {
        customer_id: "cust-summit-grocers",
        name: "Summit Grocers",
        pattern: "growing",
        established_revenue_cents: Some(30_000),
        permanently_closed: false,
        orders: &[
            fulfilled(85, 30_000),
            fulfilled(78, 31_000),
            fulfilled(71, 29_500),
            fulfilled(64, 30_500),
            fulfilled(57, 42_000),
            fulfilled(50, 44_000),
            fulfilled(43, 45_500),
            fulfilled(36, 47_000),
            fulfilled(29, 52_000),
            fulfilled(22, 54_000),
            fulfilled(15, 56_000),
            fulfilled(8, 58_000),
        ],
        description: "Weekly buyer with rising basket size",
    },
    SeedCustomerContract {
        customer_id: "cust-old-mill",
        name: "Old Mill Bakery",
        pattern: "lapsed",
        established_revenue_cents: Some(38_000),
        permanently_closed: false,
        orders: &[
            fulfilled(262, 38_000),
            fulfilled(232, 37_500),
            fulfilled(202, 39_000),
            fulfilled(172, 36_000),
        ],
        description: "Monthly buyer silent for almost six months",
    },
    SeedCustomerContract {
        customer_id: "cust-pier-nine",
        name: "Pier 9 Catering",
        pattern: "irregular",
        established_revenue_cents: Some(180_000),
        permanently_closed: false,
        orders: &[
            fulfilled(205, 210_000),
            fulfilled(199, 95_000),
            fulfilled(131, 260_000),
            fulfilled(118, 120_000),
            fulfilled(33, 185_000),
            fulfilled(29, 150_000),
        ],
        description: "Event caterer with bursty, high-value orders",
    },
    SeedCustomerContract {
        customer_id: "cust-lantern-deli",
        name: "Lantern Deli",
        pattern: "single_order",
        established_revenue_cents: None,
        permanently_closed: false,
        orders: &[fulfilled(6, 12_000)],
        description: "New account with one delivered order",
    },
    SeedCustomerContract {
        customer_id: "cust-copper-kettle",
        name: "Copper Kettle",
        pattern: "no_history",
        established_revenue_cents: None,
        permanently_closed: false,
        orders: &[],
        description: "Prospect that has not ordered yet",
    },
    SeedCustomerContract {
        customer_id: "cust-shuttered-diner",
        name: "Shuttered Diner",
        pattern: "closed",
        established_revenue_cents: Some(20_000),
        permanently_closed: true,
        orders: &[fulfilled(400, 20_000), fulfilled(370, 21_000)],
        description: "Permanently closed account excluded from batch jobs",
    },
];

/// Demo seed dataset: one tenant, seven customers, order dates relative to an anchor
/// instant so predictions stay meaningful whenever the seed is loaded.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub fn tenant_id() -> TenantId {
        TenantId::from(DEMO_TENANT_ID)
    }

    /// Load the dataset. Re-running replaces the seeded rows in place.
    pub async fn load(pool: &DbPool, anchor: DateTime<Utc>) -> Result<SeedResult, RepositoryError> {
        let tenant_id = Self::tenant_id();
        let mut tx = pool.begin().await?;
        let mut orders_seeded = 0usize;

        for contract in SEED_CUSTOMERS {
            let customer_id = CustomerId::from(contract.customer_id);
            let mut profile = CustomerProfile::new(tenant_id.clone(), customer_id.clone(), contract.name);
            profile.established_revenue = contract.established_revenue_cents.map(|cents| Decimal::new(cents, 2));
            profile.is_permanently_closed = contract.permanently_closed;
            upsert_customer(&mut *tx, &profile, anchor).await?;

            for (index, seed) in contract.orders.iter().enumerate() {
                let ordered_at = anchor - Duration::days(seed.days_ago);
                let order = NewOrder {
                    id: format!("{}-ord-{:02}", contract.customer_id, index + 1),
                    tenant_id: tenant_id.clone(),
                    customer_id: customer_id.clone(),
                    status: seed.status,
                    ordered_at,
                    delivered_at: seed.delivery_lag_days.map(|lag| ordered_at + Duration::days(lag)),
                    total: Decimal::new(seed.total_cents, 2),
                };
                upsert_order(&mut *tx, &order).await?;
                orders_seeded += 1;
            }
        }

        tx.commit().await?;

        let customers_seeded = SEED_CUSTOMERS
            .iter()
            .map(|contract| CustomerSeedInfo {
                customer_id: contract.customer_id,
                pattern: contract.pattern,
                description: contract.description,
            })
            .collect();

        Ok(SeedResult { tenant_id, customers_seeded, orders_seeded })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_CUSTOMERS {
            let customer_exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM customer WHERE tenant_id = ?1 AND id = ?2 AND is_permanently_closed = ?3)",
            )
            .bind(DEMO_TENANT_ID)
            .bind(contract.customer_id)
            .bind(contract.permanently_closed)
            .fetch_one(pool)
            .await?;
            checks.push(SeedCheck {
                name: format!("{}:customer", contract.customer_id),
                passed: customer_exists == 1,
            });

            let realized: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM customer_order
                 WHERE tenant_id = ?1 AND customer_id = ?2 AND status IN ('FULFILLED', 'SUBMITTED')",
            )
            .bind(DEMO_TENANT_ID)
            .bind(contract.customer_id)
            .fetch_one(pool)
            .await?;
            checks.push(SeedCheck {
                name: format!("{}:realized_orders", contract.customer_id),
                passed: realized == contract.realized_order_count(),
            });
        }

        let all_passed = checks.iter().all(|check| check.passed);
        Ok(VerificationResult { checks, all_passed })
    }

    /// Remove every seeded row for the demo tenant.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM customer_order WHERE tenant_id = ?1")
            .bind(DEMO_TENANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM customer WHERE tenant_id = ?1")
            .bind(DEMO_TENANT_ID)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub fn customer_count() -> usize {
        SEED_CUSTOMERS.len()
    }

    /// Customer id seeded for a given pattern label such as `regular` or `lapsed`.
    pub fn customer_for_pattern(pattern: &str) -> Option<CustomerId> {
        SEED_CUSTOMERS
            .iter()
            .find(|contract| contract.pattern == pattern)
            .map(|contract| CustomerId::from(contract.customer_id))
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub tenant_id: TenantId,
    pub customers_seeded: Vec<CustomerSeedInfo>,
    pub orders_seeded: usize,
}

#[derive(Debug)]
pub struct CustomerSeedInfo {
    pub customer_id: &'static str,
    pub pattern: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SeedCheck {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub checks: Vec<SeedCheck>,
    pub all_passed: bool,
}
