pub mod commands;

use cadence_core::config::{AppConfig, LogFormat};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "cadence",
    about = "Cadence operator CLI",
    long_about = "Predict customer reorder dates, derive customer insights, and run the tenant-wide refresh and health jobs.",
    after_help = "Examples:\n  cadence migrate\n  cadence seed\n  cadence predict --tenant tenant-demo --customer cust-harbor-cafe\n  cadence health --tenant tenant-demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo tenant with one customer per ordering pattern")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Predict the next order date for one customer")]
    Predict {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        customer: String,
    },
    #[command(about = "Derive lifetime value, churn risk, growth trend and recommendations")]
    Insights {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        customer: String,
    },
    #[command(about = "Refresh stored next-order predictions for every customer of a tenant")]
    Batch {
        #[arg(long)]
        tenant: String,
        #[arg(long, help = "Maximum number of customers to refresh")]
        limit: Option<u32>,
        #[arg(long, help = "Include permanently closed customers")]
        include_inactive: bool,
        #[arg(long, help = "Customers processed in parallel")]
        concurrency: Option<usize>,
    },
    #[command(about = "Classify every open customer of a tenant and store status changes")]
    Health {
        #[arg(long)]
        tenant: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let loaded = commands::load();
    init_logging(loaded.as_ref().ok());

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&loaded),
        Command::Seed => commands::seed::run(&loaded),
        Command::Config => commands::config::run(&loaded),
        Command::Doctor { json } => commands::doctor::run(&loaded, json),
        Command::Predict { tenant, customer } => {
            commands::predict::run(&loaded, &tenant, &customer)
        }
        Command::Insights { tenant, customer } => {
            commands::predict::insights(&loaded, &tenant, &customer)
        }
        Command::Batch { tenant, limit, include_inactive, concurrency } => {
            let args = commands::batch::BatchArgs { limit, include_inactive, concurrency };
            commands::batch::run(&loaded, &tenant, &args)
        }
        Command::Health { tenant } => commands::batch::health(&loaded, &tenant),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the command payload. A config that failed to
/// load gets default logging; the command itself reports the config error.
fn init_logging(config: Option<&AppConfig>) {
    let fallback = AppConfig::default();
    let config = config.unwrap_or(&fallback);
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        tracing::debug!(
            event_name = "cli.logging.init_skipped",
            error = %error,
            "a global subscriber is already installed"
        );
    }
}
