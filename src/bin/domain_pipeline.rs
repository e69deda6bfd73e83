//! domain-pipeline: run the scheduled domain pipeline.
//!
//! Usage:
//!   domain-pipeline [run] [--config <file.yaml>]   Start the scheduler until Ctrl-C
//!   domain-pipeline jobs [--config <file.yaml>]    List registered jobs and triggers

use anyhow::Context;
use domain_pipeline::config::Settings;
use domain_pipeline::context::AppContext;
use domain_pipeline::scheduler::Scheduler;
use domain_pipeline::stages::{register_pipeline, PipelineServices};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.first().map(String::as_str) {
        None => ("run", &args[..]),
        Some("--config") => ("run", &args[..]),
        Some(cmd) => (cmd, &args[1..]),
    };

    match command {
        "run" => cmd_run(rest).await,
        "jobs" => cmd_jobs(rest).await,
        "version" | "--version" | "-V" => {
            println!("domain-pipeline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!(
        r#"domain-pipeline: trend-to-listing domain pipeline

USAGE:
    domain-pipeline <COMMAND> [OPTIONS]

COMMANDS:
    run [--config <file>]       Start the scheduler and run until Ctrl-C (default)
    jobs [--config <file>]      List registered jobs and their triggers
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    DOMAIN_PIPELINE_*           Override settings (e.g. DOMAIN_PIPELINE_DEBUG=true)
    RUST_LOG                    Log filter, overrides DOMAIN_PIPELINE_DEBUG"#
    );
}

fn config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" {
            let path = args.get(i + 1).context("--config requires a file path")?;
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(None)
}

async fn build(args: &[String]) -> anyhow::Result<(Scheduler, Arc<AppContext>)> {
    let path = config_path(args)?;
    let settings = Settings::load(path.as_deref()).context("loading settings")?;
    domain_pipeline::logging::init(&settings);

    let scheduler = Scheduler::from_settings(&settings)?;
    let services = PipelineServices::offline(&settings.resilience);
    let ctx = AppContext::from_settings(settings)
        .await
        .context("building application context")?;
    register_pipeline(&scheduler, Arc::clone(&ctx), services)?;
    Ok((scheduler, ctx))
}

async fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    let (scheduler, _ctx) = build(args).await?;
    scheduler.start()?;
    tracing::info!("pipeline running; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    scheduler.shutdown();
    Ok(())
}

async fn cmd_jobs(args: &[String]) -> anyhow::Result<()> {
    let (scheduler, _ctx) = build(args).await?;
    println!("{:<18} TRIGGER", "JOB");
    for job in scheduler.jobs() {
        println!("{:<18} {}", job.id, job.trigger);
    }
    Ok(())
}
