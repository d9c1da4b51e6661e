//! `gantry-agentd`: runs one job, or interprets a structured script.
//!
//! ```text
//! gantry-agentd <agent.json> <job.json>
//! gantry-agentd run-structured [script.json|-]
//! ```
//!
//! The agent file holds a `logger` and a `runner` section. Only the `shell`
//! and `custom` executors are registered here; the autoscaled `instance`
//! executor needs a fleet plugin and is wired by embedders through
//! `gantry_fleet::AutoscalerProvider`.
mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gantry_core::{ExecutorRegistry, JobRunner};
use gantry_exec::{CustomProvider, ShellProvider};
use gantry_observe::{JobTrace, TraceConfig, TracingTrace, init_local_offset, init_logger};
use gantry_shell::{
    ShellRegistry,
    structured::{Interpreter, Script},
};

use crate::config::{AgentConfig, load_job};

const USAGE: &str = "usage: gantry-agentd <agent.json> <job.json>\n       gantry-agentd run-structured [script.json|-]";

fn main() -> anyhow::Result<()> {
    // The local offset can only be read while the process is single-threaded.
    init_local_offset();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, rest @ ..] if cmd == "run-structured" => {
            let code = runtime.block_on(run_structured(rest.first().map(String::as_str)))?;
            drop(runtime);
            std::process::exit(code);
        }
        [agent, job] => runtime.block_on(run_job(PathBuf::from(agent), PathBuf::from(job))),
        _ => bail!(USAGE),
    }
}

/// Run one job to completion; a failed job is returned as the error.

async fn run_job(agent: PathBuf, job: PathBuf) -> anyhow::Result<()> {
    // 1) config + logger
    let cfg = AgentConfig::load(&agent)?;
    init_logger(&cfg.logger)?;
    info!(runner = %cfg.runner.name, "logger initialized");

    let job = Arc::new(load_job(&job)?);
    let runner = Arc::new(cfg.runner);

    // 2) registries
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let shells = ShellRegistry::with_defaults();
    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(ShellProvider::new(&cwd)));
    executors.register(Arc::new(CustomProvider::new(&cwd)));

    // 3) cancellation
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, canceling job");
            on_signal.cancel();
        }
    });

    // 4) job
    let masked = job
        .variables
        .iter()
        .filter(|v| v.masked)
        .map(|v| v.value.clone())
        .collect();
    let trace: Arc<dyn JobTrace> =
        Arc::new(TracingTrace::new(job.id, TraceConfig::default()).with_masked(masked));
    JobRunner::new(&executors, &shells)
        .run(job, runner, trace, cancel)
        .await?;
    Ok(())
}

/// Interpret a structured script from `source`, or stdin for `-` and
/// `None`, returning the exit code the script ended with.
async fn run_structured(source: Option<&str>) -> anyhow::Result<i32> {
    let text = match source {
        None | Some("-") => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading script from stdin")?;
            text
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading script {path}"))?,
    };
    let script = Script::from_json(&text).context("parsing structured script")?;
    let cwd = std::env::current_dir().context("resolving working directory")?;
    Ok(Interpreter::new(cwd).run(&script).await?)
}
