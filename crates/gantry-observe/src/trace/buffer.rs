use std::sync::Mutex;

use super::{JobTrace, TraceStream, mask_line};

/// In-memory trace, for callers that inspect output afterwards.
#[derive(Debug, Default)]
pub struct BufferTrace {
    masked: Vec<String>,
    lines: Mutex<Vec<(TraceStream, String)>>,
}

impl BufferTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_masked(masked: Vec<String>) -> Self {
        Self {
            masked,
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every recorded line.
    pub fn lines(&self) -> Vec<(TraceStream, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Lines of one stream joined with `\n`.
    pub fn stream(&self, stream: TraceStream) -> String {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, l)| l)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, l)| l.contains(needle))
    }
}

impl JobTrace for BufferTrace {
    fn line(&self, stream: TraceStream, line: &str) {
        let line = mask_line(line, &self.masked);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((stream, line));
        }
    }
}
