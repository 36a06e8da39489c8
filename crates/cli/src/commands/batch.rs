use crate::commands::predict::{engine_failure, parse_tenant};
use crate::commands::{build_runtime, load_config, open_pool, to_data, CommandResult, LoadedConfig};
use cadence_core::batch::{batch_update_predictions, run_health_assessment, BatchOptions};
use cadence_core::engine::CadenceEngine;
use cadence_db::{SqlCustomerRepository, SqlOrderHistoryRepository};

/// Flags accepted by `cadence batch`; unset values fall back to the `[batch]` config section.
#[derive(Clone, Debug, Default)]
pub struct BatchArgs {
    pub limit: Option<u32>,
    pub include_inactive: bool,
    pub concurrency: Option<usize>,
}

impl BatchArgs {
    fn resolve(&self, base: &BatchOptions) -> BatchOptions {
        BatchOptions {
            limit_customers: self.limit.unwrap_or(base.limit_customers),
            only_active: base.only_active && !self.include_inactive,
            concurrency: self.concurrency.unwrap_or(base.concurrency).max(1),
        }
    }
}

/// Refreshes the stored next-expected-order date of every listed customer.
pub fn run(loaded: &LoadedConfig, tenant: &str, args: &BatchArgs) -> CommandResult {
    let tenant_id = match parse_tenant(tenant) {
        Ok(tenant_id) => tenant_id,
        Err(message) => return CommandResult::failure("batch", "invalid_argument", message, 2),
    };
    let config = match load_config("batch", loaded) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("batch") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let options = args.resolve(&config.batch);

    let result = runtime.block_on(async {
        let pool = open_pool(config).await?;
        let engine =
            CadenceEngine::new(SqlOrderHistoryRepository::new(pool.clone()), config.engine.clone());
        let directory = SqlCustomerRepository::new(pool.clone());
        let outcome = batch_update_predictions(&engine, &directory, &tenant_id, &options).await;
        pool.close().await;
        outcome.map_err(engine_failure)
    });

    match result.and_then(|summary| Ok((summary, to_data(&summary)?))) {
        Ok((summary, data)) => CommandResult::success_with_data(
            "batch",
            format!(
                "refreshed predictions for tenant `{tenant_id}`: {} updated, {} failed",
                summary.updated, summary.failed
            ),
            Some(data),
        ),
        Err(failure) => CommandResult::from_failure("batch", failure),
    }
}

/// Runs the health assessment over every open customer of the tenant.
pub fn health(loaded: &LoadedConfig, tenant: &str) -> CommandResult {
    let tenant_id = match parse_tenant(tenant) {
        Ok(tenant_id) => tenant_id,
        Err(message) => return CommandResult::failure("health", "invalid_argument", message, 2),
    };
    let config = match load_config("health", loaded) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("health") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(config).await?;
        let engine =
            CadenceEngine::new(SqlOrderHistoryRepository::new(pool.clone()), config.engine.clone())
                .with_health_policy(config.health.clone());
        let directory = SqlCustomerRepository::new(pool.clone());
        let outcome =
            run_health_assessment(&engine, &directory, &tenant_id, config.batch.concurrency).await;
        pool.close().await;
        outcome.map_err(engine_failure)
    });

    match result.and_then(|summary| Ok((summary, to_data(&summary)?))) {
        Ok((summary, data)) => CommandResult::success_with_data(
            "health",
            format!(
                "assessed {} customer(s) in tenant `{tenant_id}`: {} updated, {} failed",
                summary.analyzed, summary.updated, summary.failed
            ),
            Some(data),
        ),
        Err(failure) => CommandResult::from_failure("health", failure),
    }
}
