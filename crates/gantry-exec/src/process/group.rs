use std::io;

use tokio::process::Child;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ask politely (`SIGTERM`).
    Terminate,
    /// `SIGKILL`.
    Kill,
}

/// Something that can be told to stop.
pub trait Signaler: Send + Sync {
    fn signal(&self, signal: Signal) -> io::Result<()>;
}

/// The process group led by a child spawned with [`spawn_process`](super::spawn_process).
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroup {
    pid: Option<u32>,
}

impl ProcessGroup {
    /// Group of `child`; empty once the child was reaped.
    pub fn of(child: &Child) -> Self {
        Self { pid: child.id() }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Signaler for ProcessGroup {
    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> io::Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let signo = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        trace!(pgid = pid, ?signal, "signaling process group");
        let rc = unsafe { libc::killpg(pid as libc::pid_t, signo) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // group already gone
            return Ok(());
        }
        Err(err)
    }

    #[cfg(not(unix))]
    fn signal(&self, signal: Signal) -> io::Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        trace!(pid, ?signal, "terminating process tree");
        let mut cmd = std::process::Command::new("taskkill");
        cmd.arg("/T").arg("/PID").arg(pid.to_string());
        if signal == Signal::Kill {
            cmd.arg("/F");
        }
        cmd.stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|_| ())
    }
}
