use crate::commands::{
    build_runtime, load_config, open_pool, to_data, CommandFailure, CommandResult, LoadedConfig,
};
use cadence_core::config::AppConfig;
use cadence_core::domain::customer::{CustomerId, TenantId};
use cadence_core::engine::CadenceEngine;
use cadence_core::errors::ApplicationError;
use cadence_db::SqlOrderHistoryRepository;
use serde_json::Value;

/// Predicts the next order date for one customer.
pub fn run(loaded: &LoadedConfig, tenant: &str, customer: &str) -> CommandResult {
    execute("predict", loaded, tenant, customer, |config, tenant_id, customer_id| async move {
        let pool = open_pool(&config).await?;
        let engine =
            CadenceEngine::new(SqlOrderHistoryRepository::new(pool.clone()), config.engine.clone());
        let outcome = engine.predict_next_order_date(&customer_id, &tenant_id).await;
        pool.close().await;

        let prediction = outcome.map_err(engine_failure)?;
        let message = match prediction.next_expected_order_date {
            Some(date) => format!(
                "next order for `{customer_id}` expected {} ({} confidence)",
                date.format("%Y-%m-%d"),
                prediction.confidence_level.as_str()
            ),
            None => format!("no order history for `{customer_id}`"),
        };
        let data = to_data(&prediction)?;
        Ok::<_, CommandFailure>((message, data))
    })
}

/// Derives lifetime value, churn risk, growth trend and recommendations for one customer.
pub fn insights(loaded: &LoadedConfig, tenant: &str, customer: &str) -> CommandResult {
    execute("insights", loaded, tenant, customer, |config, tenant_id, customer_id| async move {
        let pool = open_pool(&config).await?;
        let engine =
            CadenceEngine::new(SqlOrderHistoryRepository::new(pool.clone()), config.engine.clone());
        let outcome = engine.generate_customer_insights(&customer_id, &tenant_id).await;
        pool.close().await;

        let insights = outcome.map_err(engine_failure)?;
        let message = format!(
            "`{customer_id}`: {} churn risk, {} spend, {} recommendation(s)",
            insights.churn_risk.as_str(),
            insights.growth_trend.as_str(),
            insights.recommendations.len()
        );
        let data = to_data(&insights)?;
        Ok::<_, CommandFailure>((message, data))
    })
}

fn execute<F, Fut>(
    command: &str,
    loaded: &LoadedConfig,
    tenant: &str,
    customer: &str,
    work: F,
) -> CommandResult
where
    F: FnOnce(AppConfig, TenantId, CustomerId) -> Fut,
    Fut: std::future::Future<Output = Result<(String, Value), CommandFailure>>,
{
    let (tenant_id, customer_id) = match parse_scope(tenant, customer) {
        Ok(scope) => scope,
        Err(message) => return CommandResult::failure(command, "invalid_argument", message, 2),
    };
    let config = match load_config(command, loaded) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(work(config.clone(), tenant_id, customer_id)) {
        Ok((message, data)) => CommandResult::success_with_data(command, message, Some(data)),
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}

pub(crate) fn parse_tenant(tenant: &str) -> Result<TenantId, String> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err("tenant id must not be empty".to_string());
    }
    Ok(TenantId::from(tenant))
}

fn parse_scope(tenant: &str, customer: &str) -> Result<(TenantId, CustomerId), String> {
    let tenant_id = parse_tenant(tenant)?;
    let customer = customer.trim();
    if customer.is_empty() {
        return Err("customer id must not be empty".to_string());
    }
    Ok((tenant_id, CustomerId::from(customer)))
}

pub(crate) fn engine_failure(error: ApplicationError) -> CommandFailure {
    (error.class(), error.to_string(), 6u8)
}
