//! leadflow CLI
//!
//! JSON fixture から in-memory store を作り、リクエストをキューに投入して
//! 全タスクの最終レコードを JSON で出力する。
//!
//! ```text
//! leadflow-cli --fixture demos/store.json --request demos/enrich.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use leadflow_core::app::PipelineBuilder;
use leadflow_core::config::Settings;
use leadflow_core::domain::AutomationRequest;
use leadflow_core::impls::{InMemoryLeadStore, StoreSeed};
use leadflow_core::ports::SystemClock;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "leadflow-cli")]
#[command(about = "Run automation requests against a fixture-seeded lead store")]
struct Cli {
    /// Store fixture (leads, business profiles, automation settings)
    #[arg(long)]
    fixture: PathBuf,

    /// Request file; repeat to submit several requests
    #[arg(long = "request", required = true)]
    requests: Vec<PathBuf>,

    /// Emit logs as JSON (same as LEADFLOW_LOG_JSON=1)
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json || std::env::var("LEADFLOW_LOG_JSON").is_ok_and(|v| v == "1"));

    let settings = Settings::load().context("Failed to load settings")?;
    let seed: StoreSeed = read_json(&cli.fixture)?;
    let requests = cli
        .requests
        .iter()
        .map(|path| read_json::<AutomationRequest>(path))
        .collect::<Result<Vec<_>>>()?;

    let store = InMemoryLeadStore::seeded(seed, Arc::new(SystemClock));
    let pipeline = PipelineBuilder::from_settings(&settings)?
        .store(Arc::new(store.clone()))
        .build()?;
    let queue = pipeline.start_queue(settings.pipeline.queue_capacity, settings.pipeline.workers);

    for (path, request) in cli.requests.iter().zip(requests) {
        match queue.submit_request(request) {
            Ok(Some(task_id)) => info!(%task_id, path = %path.display(), "task submitted"),
            Ok(None) => info!(path = %path.display(), "new lead submitted"),
            Err(err) => warn!(path = %path.display(), error = %err, "request rejected"),
        }
    }

    tokio::select! {
        _ = queue.shutdown_and_join() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, unfinished tasks are dropped");
        }
    }

    let records = store.tasks().await;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
