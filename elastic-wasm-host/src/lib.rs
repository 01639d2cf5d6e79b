//! elastic-wasm-host: Wasm host runtime for field-processing guests
//!
//! Loads an untrusted guest module, exposes the `elastic` capability surface
//! to it (field access, logging, wall-clock time), and runs its `process`
//! entry point once.

pub mod capability;
pub mod clock;
pub mod context;
pub mod error;
pub mod loader;
pub mod memory;
pub mod record;
pub mod sink;
pub mod supervisor;
pub mod tracing_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{HostContext, HostState};
pub use elastic_wasm_api::{FieldValue, LogLevel, StatusCode};
pub use error::{HostError, Phase};
pub use loader::{CompiledModule, Completion, GuestInstance, HostConfig, ModuleHost};
pub use memory::{MemoryError, MemoryView};
pub use record::{Event, EventError, Record};
pub use sink::{LogEntry, LogSink, MemorySink, TracingSink};
pub use supervisor::Supervisor;
