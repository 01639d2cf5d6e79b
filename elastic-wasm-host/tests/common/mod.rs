//! Shared helpers for host integration tests
#![allow(dead_code)]

use elastic_wasm_host::{
    Clock, Completion, Event, FixedClock, HostConfig, HostContext, HostError, MemorySink,
    ModuleHost,
};
use std::sync::Arc;

/// Result of one guest run plus everything it logged
pub type RunOutcome = (Result<Completion<Event>, HostError>, Arc<MemorySink>);

/// Bump allocator over a heap starting at 1024
pub const BUMP_MALLOC: &str = r#"
    (global.get $heap)
    (global.set $heap (i32.add (global.get $heap) (local.get $size)))
"#;

/// Calls `get_field("message")` and stores the result under `echo` with
/// `put_field`.
///
/// Returns `100 + status` when `get_field` fails, `-1` when the field is
/// absent, otherwise the status of `put_field`.
pub const ECHO_PROCESS: &str = r#"
    (local $status i32)
    (local.set $status
      (call $get_field (i32.const 0) (i32.const 7) (i32.const 64) (i32.const 68)))
    (if (local.get $status)
      (then (return (i32.add (i32.const 100) (local.get $status)))))
    (if (i32.eqz (i32.load (i32.const 68)))
      (then (return (i32.const -1))))
    (call $put_field
      (i32.const 16) (i32.const 4)
      (i32.load (i32.const 64)) (i32.load (i32.const 68)))
"#;

/// Build a guest module importing the whole `elastic` surface.
///
/// Memory layout of the data segments:
///
/// | Offset | Bytes |
/// |--------|-------|
/// | 0 | `message` |
/// | 16 | `echo` |
/// | 32 | `0xc1` (never valid MessagePack) |
/// | 40 | `0xff` (invalid UTF-8) |
/// | 48 | `0xc0` (nil) |
/// | 64, 68 | `get_field` out-parameters |
/// | 80 | `hello from guest` |
/// | 198 | `0xc4 0x08` (bin8 header for an 8-byte timestamp) |
/// | 208 | `0xff` sentinel |
pub fn guest(malloc_body: &str, process_body: &str) -> String {
    format!(
        r#"
(module
  (import "elastic" "elastic_get_field" (func $get_field (param i32 i32 i32 i32) (result i32)))
  (import "elastic" "elastic_put_field" (func $put_field (param i32 i32 i32 i32) (result i32)))
  (import "elastic" "elastic_log" (func $log (param i32 i32 i32) (result i32)))
  (import "elastic" "elastic_get_current_time_nanoseconds" (func $now (param i32) (result i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (data (i32.const 0) "message")
  (data (i32.const 16) "echo")
  (data (i32.const 32) "\c1")
  (data (i32.const 40) "\ff")
  (data (i32.const 48) "\c0")
  (data (i32.const 80) "hello from guest")
  (data (i32.const 198) "\c4\08")
  (data (i32.const 208) "\ff")
  (func (export "malloc") (param $size i32) (result i32)
    {malloc_body})
  (func (export "process") (result i32)
    {process_body}))
"#
    )
}

/// Guest with the bump allocator
pub fn guest_with(process_body: &str) -> String {
    guest(BUMP_MALLOC, process_body)
}

pub fn compile(wat_src: &str) -> Vec<u8> {
    wat::parse_str(wat_src).expect("test guest should be valid WAT")
}

/// Run a guest once against `event`, logging into a fresh [`MemorySink`]
pub fn run_guest(wat_src: &str, event: Event) -> RunOutcome {
    run_guest_with(HostConfig::default(), wat_src, event, Arc::new(FixedClock(0)))
}

pub fn run_guest_with(
    config: HostConfig,
    wat_src: &str,
    event: Event,
    clock: Arc<dyn Clock>,
) -> RunOutcome {
    let sink = Arc::new(MemorySink::new());
    let ctx = HostContext::new(event)
        .with_sink(sink.clone())
        .with_clock(clock);

    let host = ModuleHost::new(config).expect("engine should build");
    let result = host
        .compile(&compile(wat_src))
        .and_then(|module| module.instantiate(ctx))
        .and_then(|instance| instance.process());
    (result, sink)
}

/// Return code of a run that must succeed
pub fn return_code(result: &Result<Completion<Event>, HostError>) -> i32 {
    match result {
        Ok(completion) => completion.return_code,
        Err(e) => panic!("guest run failed: {e}"),
    }
}
