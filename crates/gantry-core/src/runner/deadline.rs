use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ExecutorError;

/// Child token of `parent` that is also cancelled once `timeout` elapses.
pub(crate) struct Deadline {
    token: CancellationToken,
    expired: Arc<AtomicBool>,
    timeout: Duration,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub(crate) fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let expired = Arc::new(AtomicBool::new(false));
        let timer = tokio::spawn({
            let token = token.clone();
            let expired = Arc::clone(&expired);
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        expired.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            }
        });
        Self {
            token,
            expired,
            timeout,
            timer,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// Report an interruption caused by this deadline as a timeout.
    pub(crate) fn explain(&self, err: ExecutorError) -> ExecutorError {
        if self.expired() && err.is_interrupted() {
            ExecutorError::Timeout(self.timeout)
        } else {
            err
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
