use cadence_core::analytics::insights::GrowthTrend;
use cadence_core::analytics::policy::CadencePolicy;
use cadence_core::analytics::predictor::{ConfidenceLevel, PredictionMethod};
use cadence_core::batch::{
    batch_update_predictions, run_health_assessment, BatchOptions, BatchSummary,
    HealthAssessmentSummary,
};
use cadence_core::domain::customer::{CustomerId, RiskStatus};
use cadence_core::engine::{CadenceEngine, FixedClock};
use cadence_db::{
    connect_with_settings, migrations, DbPool, DemoSeedDataset, SqlCustomerRepository,
    SqlOrderHistoryRepository,
};
use chrono::{DateTime, TimeZone, Utc};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 15, 9, 0, 0).unwrap()
}

async fn seeded_pool() -> SeedContractTestResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|err| format!("connect: {err}"))?;
    migrations::run_pending(&pool).await.map_err(|err| format!("migrate: {err}"))?;
    DemoSeedDataset::load(&pool, anchor()).await.map_err(|err| format!("seed: {err}"))?;
    Ok(pool)
}

fn engine(pool: &DbPool) -> CadenceEngine<SqlOrderHistoryRepository, FixedClock> {
    CadenceEngine::with_clock(
        SqlOrderHistoryRepository::new(pool.clone()),
        FixedClock(anchor()),
        CadencePolicy::default(),
    )
}

fn seeded(pattern: &str) -> SeedContractTestResult<CustomerId> {
    DemoSeedDataset::customer_for_pattern(pattern)
        .ok_or_else(|| format!("no seeded customer for pattern {pattern}"))
}

#[tokio::test]
async fn seeded_patterns_drive_expected_predictions() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let engine = engine(&pool);
    let tenant = DemoSeedDataset::tenant_id();

    let regular = engine
        .predict_next_order_date(&seeded("regular")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(regular.confidence_level, ConfidenceLevel::High);
    require!(regular.next_expected_order_date.is_some());

    let single = engine
        .predict_next_order_date(&seeded("single_order")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(single.prediction_method, PredictionMethod::SingleOrderDefault);

    let prospect = engine
        .predict_next_order_date(&seeded("no_history")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(prospect.prediction_method, PredictionMethod::NoHistory);
    require_eq!(prospect.next_expected_order_date, None::<DateTime<Utc>>);

    let irregular = engine
        .predict_next_order_date(&seeded("irregular")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(irregular.confidence_level, ConfidenceLevel::Low);

    Ok(())
}

#[tokio::test]
async fn seeded_patterns_drive_expected_insights() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let engine = engine(&pool);
    let tenant = DemoSeedDataset::tenant_id();

    let growing = engine
        .generate_customer_insights(&seeded("growing")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(growing.growth_trend, GrowthTrend::Growing);
    require!(
        growing.recommendations.iter().any(|rec| rec.contains("frequency")),
        "weekly buyer should get a frequency recommendation: {:?}",
        growing.recommendations
    );

    let caterer = engine
        .generate_customer_insights(&seeded("irregular")?, &tenant)
        .await
        .map_err(|err| err.to_string())?;
    require!(
        caterer.recommendations.iter().any(|rec| rec.contains("High-value")),
        "caterer should be flagged high value: {:?}",
        caterer.recommendations
    );

    Ok(())
}

#[tokio::test]
async fn batch_jobs_update_stored_profiles() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let engine = engine(&pool);
    let directory = SqlCustomerRepository::new(pool.clone());
    let tenant = DemoSeedDataset::tenant_id();

    let predictions =
        batch_update_predictions(&engine, &directory, &tenant, &BatchOptions::default())
            .await
            .map_err(|err| err.to_string())?;
    require_eq!(predictions, BatchSummary { updated: DemoSeedDataset::customer_count() - 1, failed: 0 });

    let health = run_health_assessment(&engine, &directory, &tenant, 4)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(
        health,
        HealthAssessmentSummary {
            analyzed: 6,
            updated: 5,
            dormant: 1,
            at_risk_cadence: 0,
            at_risk_revenue: 1,
            reactivated: 0,
            failed: 0,
        }
    );

    let lapsed = directory
        .find_by_id(&tenant, &seeded("lapsed")?)
        .await
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "lapsed customer should exist".to_string())?;
    require_eq!(lapsed.risk_status, RiskStatus::Dormant);
    require_eq!(lapsed.dormancy_since, Some(anchor()));

    let closed = directory
        .find_by_id(&tenant, &seeded("closed")?)
        .await
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "closed customer should exist".to_string())?;
    require_eq!(closed.next_expected_order_date, None::<DateTime<Utc>>);

    Ok(())
}
