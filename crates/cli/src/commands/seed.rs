use crate::commands::{
    build_runtime, load_config, open_pool, CommandFailure, CommandResult, LoadedConfig,
};
use cadence_db::{migrations, DemoSeedDataset, SeedResult};
use chrono::Utc;
use serde_json::json;

pub fn run(loaded: &LoadedConfig) -> CommandResult {
    let config = match load_config("seed", loaded) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        // Order dates are laid out backwards from the moment of seeding.
        let seed_result = DemoSeedDataset::load(&pool, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, CommandFailure> = if verification.all_passed {
            Ok(seed_result)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|check| (!check.passed).then_some(check.name.as_str()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => {
            let customer_lines: Vec<String> = seeded
                .customers_seeded
                .iter()
                .map(|info| format!("  - {}: {} ({})", info.pattern, info.customer_id, info.description))
                .collect();
            let message = format!(
                "demo dataset loaded for tenant `{}` ({} orders):\n{}",
                seeded.tenant_id,
                seeded.orders_seeded,
                customer_lines.join("\n")
            );
            let data = json!({
                "tenant_id": seeded.tenant_id.0,
                "orders_seeded": seeded.orders_seeded,
                "customers": seeded
                    .customers_seeded
                    .iter()
                    .map(|info| json!({ "customer_id": info.customer_id, "pattern": info.pattern }))
                    .collect::<Vec<_>>(),
            });
            CommandResult::success_with_data("seed", message, Some(data))
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
