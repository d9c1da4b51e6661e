//! Sinks for job output.
//!
//! Child processes write line-oriented output; executors forward every
//! line to a [`JobTrace`] after masking secret values.
mod buffer;
pub use buffer::BufferTrace;

mod forward;
pub use forward::{TraceConfig, TracingTrace};

use std::fmt;

const MASK: &str = "[MASKED]";

/// Origin of a traced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStream {
    Stdout,
    Stderr,
}

impl fmt::Display for TraceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceStream::Stdout => "stdout",
            TraceStream::Stderr => "stderr",
        })
    }
}

/// Receives job output line by line.
pub trait JobTrace: Send + Sync {
    /// Record one line (without its trailing newline).
    fn line(&self, stream: TraceStream, line: &str);

    /// Record a runner-generated message (not produced by the job).
    fn notice(&self, message: &str) {
        self.line(TraceStream::Stderr, message);
    }
}

/// Replace every occurrence of a masked value.
pub(crate) fn mask_line(line: &str, masked: &[String]) -> String {
    masked
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(line.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_occurrences() {
        let masked = vec!["s3cr3t".to_string(), String::new()];
        assert_eq!(
            mask_line("token=s3cr3t again s3cr3t", &masked),
            "token=[MASKED] again [MASKED]"
        );
        assert_eq!(mask_line("plain", &masked), "plain");
    }
}
