use crate::commands::{build_runtime, CommandResult, LoadedConfig};
use cadence_core::config::AppConfig;
use cadence_db::{connect_with_config, migrations, ping, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
        let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
        let summary = if all_pass {
            "doctor: all readiness checks passed".to_string()
        } else {
            "doctor: one or more readiness checks failed".to_string()
        };
        Self { overall_status, summary, checks }
    }

    fn exit_code(&self) -> u8 {
        if self.overall_status == CheckStatus::Pass {
            return 0;
        }
        let config_failed = self
            .checks
            .iter()
            .any(|check| check.name == "config_validation" && check.status == CheckStatus::Fail);
        if config_failed {
            2
        } else {
            4
        }
    }
}

pub fn run(loaded: &LoadedConfig, json_output: bool) -> CommandResult {
    let report = build_report(loaded);
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(loaded: &LoadedConfig) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_database(config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("database_connectivity", "configuration did not load"));
            checks.push(skipped("schema_migrations", "configuration did not load"));
        }
    }

    DoctorReport::from_checks(checks)
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match build_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: "failed to initialize async runtime".to_string(),
                },
                skipped("schema_migrations", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    skipped("schema_migrations", "the database is unreachable"),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            Err(error) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("database did not answer: {error}"),
            },
        };
        let schema = check_schema(&pool).await;

        pool.close().await;
        vec![connectivity, schema]
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    match migrations::schema_status(pool).await {
        Ok(status) if status.is_current() => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Pass,
            details: format!("{} of {} migration(s) applied", status.applied, status.expected),
        },
        Ok(status) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!(
                "{} of {} migration(s) applied; run `cadence migrate`",
                status.applied, status.expected
            ),
        },
        Err(error) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!("could not read migration state: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{skipped, CheckStatus, DoctorCheck, DoctorReport};

    fn pass(name: &'static str) -> DoctorCheck {
        DoctorCheck { name, status: CheckStatus::Pass, details: String::new() }
    }

    #[test]
    fn all_passing_checks_exit_cleanly() {
        let report = DoctorReport::from_checks(vec![
            pass("config_validation"),
            pass("database_connectivity"),
            pass("schema_migrations"),
        ]);

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn config_failure_uses_config_exit_code() {
        let report = DoctorReport::from_checks(vec![
            DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: "bad".to_string(),
            },
            skipped("database_connectivity", "configuration did not load"),
        ]);

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn schema_failure_uses_database_exit_code() {
        let report = DoctorReport::from_checks(vec![
            pass("config_validation"),
            pass("database_connectivity"),
            DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Fail,
                details: "not migrated".to_string(),
            },
        ]);

        assert_eq!(report.exit_code(), 4);
    }
}
