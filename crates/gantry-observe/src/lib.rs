mod logger;
pub use logger::*;

mod trace;
pub use trace::{BufferTrace, JobTrace, TraceConfig, TraceStream, TracingTrace};
