//! Process spawning and escalating termination.
//!
//! Every job process runs as the leader of its own process group so a
//! cancellation reaches the children a script spawns. Termination sends
//! `SIGTERM` to the group, waits the grace period, sends `SIGKILL`, and
//! waits a second bound before declaring the process dormant.
mod group;
pub use group::{ProcessGroup, Signal, Signaler};

mod output;
pub(crate) use output::{OutputPump, capture};

use std::{
    future::Future,
    pin::{Pin, pin},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use gantry_model::{DEFAULT_FORCE_KILL_TIMEOUT, DEFAULT_GRACEFUL_KILL_TIMEOUT};
use gantry_observe::JobTrace;

use crate::{ProcessError, ProcessResult};

/// How long output readers may outlive their process.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds of the termination sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillPolicy {
    /// Time a process gets to exit after `SIGTERM`.
    pub graceful: Duration,
    /// Time a process gets to exit after `SIGKILL`.
    pub force: Duration,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            graceful: DEFAULT_GRACEFUL_KILL_TIMEOUT,
            force: DEFAULT_FORCE_KILL_TIMEOUT,
        }
    }
}

/// Why a process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited on its own.
    Exited(ExitStatus),
    /// Terminated after cancellation.
    Canceled(ExitStatus),
    /// Terminated after its deadline.
    TimedOut(ExitStatus),
}

/// Spawn `cmd` as a process group leader with piped output and no stdin.
pub fn spawn_process(cmd: &mut Command) -> ProcessResult<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: cmd.as_std().get_program().to_string_lossy().into_owned(),
        source,
    })
}

/// Terminate `target` and wait for `wait` to resolve.
///
/// Returns the wait result, or [`ProcessError::Dormant`] when the process
/// survives `SIGKILL` for `policy.force`.
pub async fn kill_and_wait<F>(
    target: &dyn Signaler,
    mut wait: Pin<&mut F>,
    policy: KillPolicy,
) -> ProcessResult<F::Output>
where
    F: Future + ?Sized,
{
    if let Err(e) = target.signal(Signal::Terminate) {
        warn!(error = %e, "failed to send SIGTERM");
    }
    if let Ok(out) = tokio::time::timeout(policy.graceful, wait.as_mut()).await {
        trace!("process exited after SIGTERM");
        return Ok(out);
    }

    warn!(grace = ?policy.graceful, "process ignored SIGTERM; sending SIGKILL");
    if let Err(e) = target.signal(Signal::Kill) {
        warn!(error = %e, "failed to send SIGKILL");
    }
    match tokio::time::timeout(policy.force, wait.as_mut()).await {
        Ok(out) => Ok(out),
        Err(_) => Err(ProcessError::Dormant(policy.force)),
    }
}

/// Wait for `child`, terminating its group on cancellation or after `deadline`.
pub async fn wait_or_kill(
    child: &mut Child,
    cancel: &CancellationToken,
    deadline: Option<Duration>,
    policy: KillPolicy,
) -> ProcessResult<ProcessExit> {
    let group = ProcessGroup::of(child);
    let mut wait = pin!(child.wait());
    let expired = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    let canceled = tokio::select! {
        res = &mut wait => return res.map(ProcessExit::Exited).map_err(ProcessError::Wait),
        _ = cancel.cancelled() => true,
        _ = expired => false,
    };
    debug!(pgid = ?group.pid(), canceled, "terminating process group");

    let status = kill_and_wait(&group, wait.as_mut(), policy)
        .await?
        .map_err(ProcessError::Wait)?;
    Ok(if canceled {
        ProcessExit::Canceled(status)
    } else {
        ProcessExit::TimedOut(status)
    })
}

/// Spawn `cmd`, stream its output into `trace`, and wait for it.
pub async fn run_traced(
    mut cmd: Command,
    trace: &Arc<dyn JobTrace>,
    cancel: &CancellationToken,
    deadline: Option<Duration>,
    policy: KillPolicy,
) -> ProcessResult<ProcessExit> {
    let mut child = spawn_process(&mut cmd)?;
    let pump = OutputPump::attach(&mut child, trace);
    let exit = wait_or_kill(&mut child, cancel, deadline, policy).await;
    pump.drain(OUTPUT_DRAIN_TIMEOUT).await;
    exit
}

/// Like [`run_traced`], returning stdout instead of tracing it.
pub async fn run_captured(
    mut cmd: Command,
    trace: &Arc<dyn JobTrace>,
    cancel: &CancellationToken,
    deadline: Option<Duration>,
    policy: KillPolicy,
) -> ProcessResult<(ProcessExit, String)> {
    let mut child = spawn_process(&mut cmd)?;
    let stdout = capture(&mut child);
    let pump = OutputPump::attach(&mut child, trace);
    let exit = wait_or_kill(&mut child, cancel, deadline, policy).await;
    pump.drain(OUTPUT_DRAIN_TIMEOUT).await;
    let text = match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, stdout).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    };
    Ok((exit?, text))
}
