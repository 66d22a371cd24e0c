use std::sync::Arc;
use std::time::Duration;

use aero_core::PlanarEngine;
use aero_server::analysis::{AnalysisOrchestrator, AnalysisOutcome};
use aero_server::config::Config;
use aero_server::persistence::{init_database, SqliteGateway};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run one conflict analysis against a database file and print the report.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project to analyze
    #[arg(long)]
    project_id: i64,

    /// SQLite database path (defaults to AERO_DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Timeout for each database call, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("aero_server=info".parse()?))
        .init();

    let database = args.database.unwrap_or(config.database_path.clone());
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.gateway_timeout());

    let db = init_database(&database, 1).await?;
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(SqliteGateway::new(db)),
        Arc::new(PlanarEngine::new()),
        timeout,
    );

    let report = orchestrator.run(args.project_id).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Project {}", report.project_id);
    match &report.outcome {
        AnalysisOutcome::Completed {
            project_geometries,
            zones_tested,
            zones_skipped,
            conflicts_found,
            conflicts_persisted,
            status_updated,
        } => {
            println!("Result: COMPLETED");
            println!(
                "Geometries: {} | zones tested={} skipped={}",
                project_geometries, zones_tested, zones_skipped
            );
            println!(
                "Conflicts: found={} saved={} | status updated: {}",
                conflicts_found, conflicts_persisted, status_updated
            );
        }
        AnalysisOutcome::Aborted(reason) => {
            println!("Result: ABORTED");
            println!("Reason: {}", reason);
        }
    }
    println!(
        "Duration: {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );

    Ok(())
}
