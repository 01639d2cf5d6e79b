//! Per-instance state handed to the capability functions

use crate::clock::{Clock, SystemClock};
use crate::record::Record;
use crate::sink::{LogSink, TracingSink};
use std::sync::Arc;
use wasmtime::{Memory, TypedFunc};

/// Collaborators a guest instance runs against.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = HostContext::new(Event::new().with_field("message", "hello"))
///     .with_sink(Arc::new(MemorySink::new()))
///     .with_clock(Arc::new(FixedClock(0)));
/// ```
pub struct HostContext<R> {
    pub(crate) record: R,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<R: Record> HostContext<R> {
    /// Context logging to `tracing` and reading the system clock
    pub fn new(record: R) -> Self {
        Self {
            record,
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn record(&self) -> &R {
        &self.record
    }
}

/// Guest exports the capability surface calls back into
#[derive(Clone)]
pub(crate) struct GuestExports {
    pub(crate) memory: Memory,
    pub(crate) malloc: TypedFunc<i32, i32>,
}

/// Data stored in the wasmtime `Store`
pub struct HostState<R> {
    pub(crate) record: R,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Resolved after instantiation; `None` while the start function runs
    pub(crate) exports: Option<GuestExports>,
}

impl<R: Record> HostState<R> {
    pub(crate) fn new(ctx: HostContext<R>) -> Self {
        Self {
            record: ctx.record,
            sink: ctx.sink,
            clock: ctx.clock,
            exports: None,
        }
    }

    pub fn record(&self) -> &R {
        &self.record
    }
}
