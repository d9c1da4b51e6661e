use tracing::{debug, info, warn};

use super::{JobTrace, TraceStream, mask_line};

/// Forwarding rules for [`TracingTrace`].
#[derive(Debug, Clone, Copy)]
pub struct TraceConfig {
    /// Lines longer than this are cut at a char boundary.
    pub max_line_length: usize,
    /// stdout at INFO (otherwise DEBUG).
    pub stdout_info: bool,
    /// stderr at WARN (otherwise DEBUG).
    pub stderr_warn: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: true,
            stderr_warn: true,
        }
    }
}

/// Forwards job output to the agent's own `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct TracingTrace {
    job: u64,
    cfg: TraceConfig,
    masked: Vec<String>,
}

impl TracingTrace {
    pub fn new(job: u64, cfg: TraceConfig) -> Self {
        Self {
            job,
            cfg,
            masked: Vec::new(),
        }
    }

    pub fn with_masked(mut self, masked: Vec<String>) -> Self {
        self.masked = masked;
        self
    }

    fn truncate<'a>(&self, line: &'a str) -> &'a str {
        if line.len() <= self.cfg.max_line_length {
            return line;
        }
        let mut end = self.cfg.max_line_length;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        &line[..end]
    }
}

impl JobTrace for TracingTrace {
    fn line(&self, stream: TraceStream, line: &str) {
        let masked = mask_line(line, &self.masked);
        let line = self.truncate(&masked);
        match stream {
            TraceStream::Stdout if self.cfg.stdout_info => info!(job = self.job, %stream, "{line}"),
            TraceStream::Stderr if self.cfg.stderr_warn => warn!(job = self.job, %stream, "{line}"),
            _ => debug!(job = self.job, %stream, "{line}"),
        }
    }
}
