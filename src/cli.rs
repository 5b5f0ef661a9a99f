//! Command-line interface for the scrivener worker process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrivener_stages::send_resume;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::{ShutdownSignal, WorkerHarness};

use crate::wiring::{self, DiagramBackend, StorageBackend};

/// scrivener — stage orchestrator for the document-generation pipeline.
///
/// Runs the thirteen stage workers that carry a job from intake through
/// finalization, or drives one job through them for local testing.
#[derive(Parser)]
#[command(name = "scrivener")]
#[command(about = "Worker process for the document-generation pipeline")]
#[command(version)]
pub struct Cli {
    /// Persist artifacts under this directory instead of in memory.
    #[arg(long, global = true)]
    pub storage_dir: Option<camino::Utf8PathBuf>,

    /// Base URL of a PlantUML render server (e.g. `http://localhost:9090`).
    /// Without this, diagram rendering returns a fixed stub image.
    #[arg(long, global = true)]
    pub plantuml_server: Option<String>,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every stage worker until interrupted.
    ///
    /// Each of the thirteen queues gets its own polling loop; Ctrl-C
    /// triggers a cooperative shutdown once in-flight handlers finish.
    Serve,

    /// Run a single stage worker's queue once and exit.
    Worker {
        /// Queue to drain, e.g. `write`, `review_style`, `finalize_ready`.
        queue: String,
    },

    /// Enqueue a new job's intake stage.
    Submit {
        /// Job id.
        job_id: String,
        /// User id the job belongs to.
        user_id: String,
        /// Document title.
        title: String,
        /// Intended audience.
        #[arg(long, default_value = "general readers")]
        audience: String,
        /// Number of review/rewrite cycles to run.
        #[arg(long, default_value_t = 1)]
        cycles: i64,
    },

    /// Resume a job paused at `intake_resume` after its questions were answered.
    Resume {
        job_id: String,
        user_id: String,
    },
}

fn queue_by_name(name: &str) -> Result<QueueName> {
    QueueName::ALL
        .into_iter()
        .find(|q| q.as_default_str() == name)
        .with_context(|| format!("unknown queue '{name}'"))
}

/// Parse arguments and dispatch, the binary's only job after this call is
/// to map the returned error to a process exit.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    scrivener_config::init_tracing(cli.verbose)?;

    let storage = match &cli.storage_dir {
        Some(dir) => StorageBackend::LocalFs(dir.clone()),
        None => StorageBackend::Memory,
    };
    let diagrams = match &cli.plantuml_server {
        Some(url) => DiagramBackend::Http(url.clone()),
        None => DiagramBackend::Stub,
    };
    let wiring = wiring::build(storage, diagrams, scrivener_config::Config::from_env());

    match cli.command {
        Commands::Serve => serve(wiring).await,
        Commands::Worker { queue } => run_one_queue(wiring, &queue).await,
        Commands::Submit {
            job_id,
            user_id,
            title,
            audience,
            cycles,
        } => submit(wiring, job_id, user_id, title, audience, cycles).await,
        Commands::Resume { job_id, user_id } => {
            send_resume(wiring.broker.as_ref(), &job_id, &user_id).await?;
            tracing::info!(job_id, "resume queued");
            Ok(())
        }
    }
}

async fn serve(wiring: wiring::Wiring) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
        ctrl_c_shutdown.trigger();
    });

    let harness = Arc::new(
        WorkerHarness::new(
            wiring.broker.clone(),
            wiring.status_store.clone(),
            wiring.document_index.clone(),
            wiring.config.clone(),
        )
        .with_poll_interval(Duration::from_millis(500)),
    );

    let mut tasks = Vec::with_capacity(wiring.handlers.len());
    for handler in wiring.handlers {
        let harness = harness.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move { harness.run(handler, shutdown).await }));
    }
    for task in tasks {
        task.await.context("worker task panicked")?;
    }
    Ok(())
}

async fn run_one_queue(wiring: wiring::Wiring, queue_name: &str) -> Result<()> {
    let queue = queue_by_name(queue_name)?;
    let handler = wiring
        .handlers
        .iter()
        .find(|h| h.queue() == queue)
        .with_context(|| format!("no handler registered for queue '{queue_name}'"))?
        .clone();

    let harness = WorkerHarness::new(
        wiring.broker.clone(),
        wiring.status_store.clone(),
        wiring.document_index.clone(),
        wiring.config.clone(),
    );
    let processed = harness.run_once(handler).await?;
    tracing::info!(queue = queue_name, processed, "drained queue");
    Ok(())
}

async fn submit(
    wiring: wiring::Wiring,
    job_id: String,
    user_id: String,
    title: String,
    audience: String,
    cycles: i64,
) -> Result<()> {
    let mut payload = JobPayload::new(&job_id, &user_id);
    payload.title = Some(title);
    payload.audience = Some(audience);
    payload.cycles = Some(cycles);
    payload.expected_cycles = Some(cycles);

    scrivener_messaging::send_queue(wiring.broker.as_ref(), QueueName::PlanIntake, payload).await?;
    tracing::info!(job_id, "job submitted to plan_intake");
    Ok(())
}
