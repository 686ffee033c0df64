//! Lifecycle event tracing with buffered, append-only persistence.
//!
//! Producers call hook methods on a tracer from any thread; each call stamps
//! an event and appends it to the tracer's in-memory buffer. A
//! [`TraceFileLogger`] drains that buffer on a schedule and appends the events
//! to a newline-delimited JSON file. Persistence is at-most-once: a failed
//! append drops the drained batch.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod event;
mod hooks;
mod logger;
mod reader;
mod tracer;

pub use error::{TraceError, TraceResult};
pub use event::{EventSourceEvent, EventSourceEventKind, InvocationEvent, InvocationEventKind};
pub use hooks::{
    CompositeInvocationHooks, EventSourceHooks, EventSourceTracer, InvocationHooks, InvocationRef,
    InvocationTracer, SourceRecord, TracingInvocationHooks,
};
pub use logger::{FlushOutcome, TraceFileLogger};
pub use reader::{
    InvocationSummary, InvocationTimeline, TraceReadout, format_timestamp, read_trace_file,
};
pub use tracer::{EventTracer, TraceSource};

/// Subsystem directory for invocation lifecycle traces.
pub const INVOCATION_TRACES: &str = "invocation-traces";
/// Subsystem directory for queue-to-function pipeline traces.
pub const EVENT_SOURCE_TRACES: &str = "event-source-traces";
