use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::Child,
    task::JoinHandle,
};
use tracing::debug;

use gantry_observe::{JobTrace, TraceStream};

/// Readers forwarding a child's output into a [`JobTrace`].
pub(crate) struct OutputPump {
    tasks: Vec<JoinHandle<()>>,
}

impl OutputPump {
    /// Take the child's piped stdout/stderr and forward them line by line.
    pub(crate) fn attach(child: &mut Child, trace: &Arc<dyn JobTrace>) -> Self {
        let mut tasks = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            tasks.push(tokio::spawn(forward(out, Arc::clone(trace), TraceStream::Stdout)));
        }
        if let Some(err) = child.stderr.take() {
            tasks.push(tokio::spawn(forward(err, Arc::clone(trace), TraceStream::Stderr)));
        }
        Self { tasks }
    }

    /// Wait for the readers to hit EOF; abandon them after `bound`.
    ///
    /// Output can outlive the child when a grandchild keeps the pipe open.
    pub(crate) async fn drain(self, bound: Duration) {
        for mut task in self.tasks {
            if tokio::time::timeout(bound, &mut task).await.is_err() {
                debug!(?bound, "output reader still open; abandoning");
                task.abort();
            }
        }
    }
}

async fn forward<R>(reader: R, trace: Arc<dyn JobTrace>, stream: TraceStream)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                trace.line(stream, line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                debug!(?stream, error = %e, "output read failed");
                break;
            }
        }
    }
}

/// Collect a child's stdout into a string.
pub(crate) fn capture(child: &mut Child) -> JoinHandle<String> {
    let out = child.stdout.take();
    tokio::spawn(async move {
        let mut text = String::new();
        if let Some(mut out) = out {
            let mut bytes = Vec::new();
            if let Err(e) = out.read_to_end(&mut bytes).await {
                debug!(error = %e, "stdout capture failed");
            }
            text = String::from_utf8_lossy(&bytes).into_owned();
        }
        text
    })
}
