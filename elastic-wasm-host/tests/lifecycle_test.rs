//! Integration tests for compile / instantiate / process failures

mod common;

use common::{compile, guest_with, run_guest, run_guest_with};
use elastic_wasm_host::{Event, FixedClock, HostConfig, HostContext, HostError, ModuleHost, Phase};
use std::sync::Arc;

fn expect_error(wat_src: &str) -> HostError {
    match run_guest(wat_src, Event::new()).0 {
        Ok(completion) => panic!("expected failure, guest returned {}", completion.return_code),
        Err(e) => e,
    }
}

#[test]
fn test_missing_malloc() {
    let err = expect_error(
        r#"(module
             (memory (export "memory") 1)
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::MissingExport("malloc")));
    assert_eq!(err.phase(), Phase::Instantiate);
}

#[test]
fn test_missing_process() {
    let err = expect_error(
        r#"(module
             (memory (export "memory") 1)
             (func (export "malloc") (param i32) (result i32) (i32.const 1024)))"#,
    );
    assert!(matches!(err, HostError::MissingExport("process")));
}

#[test]
fn test_missing_memory() {
    let err = expect_error(
        r#"(module
             (func (export "malloc") (param i32) (result i32) (i32.const 1024))
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::MissingExport("memory")));
}

#[test]
fn test_malloc_with_wrong_signature() {
    let err = expect_error(
        r#"(module
             (memory (export "memory") 1)
             (func (export "malloc") (param i64) (result i64) (i64.const 1024))
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::IncompatibleExport { name: "malloc", .. }));
}

#[test]
fn test_unknown_import() {
    let err = expect_error(
        r#"(module
             (import "elastic" "elastic_delete_field" (func (param i32 i32) (result i32)))
             (memory (export "memory") 1)
             (func (export "malloc") (param i32) (result i32) (i32.const 1024))
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::Instantiation(_)));
}

#[test]
fn test_wasi_import_rejected() {
    let err = expect_error(
        r#"(module
             (import "wasi_snapshot_preview1" "fd_write"
               (func (param i32 i32 i32 i32) (result i32)))
             (memory (export "memory") 1)
             (func (export "malloc") (param i32) (result i32) (i32.const 1024))
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::Instantiation(_)));
}

#[test]
fn test_host_call_from_start_function_traps() {
    let err = expect_error(
        r#"(module
             (import "elastic" "elastic_log" (func $log (param i32 i32 i32) (result i32)))
             (memory (export "memory") 1)
             (func $init (drop (call $log (i32.const 1) (i32.const 0) (i32.const 0))))
             (start $init)
             (func (export "malloc") (param i32) (result i32) (i32.const 1024))
             (func (export "process") (result i32) (i32.const 0)))"#,
    );
    assert!(matches!(err, HostError::Instantiation(_)));
}

#[test]
fn test_invalid_binary() {
    let host = ModuleHost::new(HostConfig::default()).unwrap();
    let err = host.compile(b"definitely not wasm").err().unwrap();
    assert!(matches!(err, HostError::Compilation(_)));
    assert_eq!(err.phase(), Phase::Compile);
}

#[test]
fn test_process_trap() {
    let err = expect_error(&guest_with("(unreachable)"));
    assert!(matches!(err, HostError::Invocation { function: "process", .. }));
    assert_eq!(err.phase(), Phase::Invoke);
}

#[test]
fn test_fuel_exhausted() {
    let config = HostConfig::default().with_fuel_limit(10_000);
    let process = "(loop $spin (br $spin)) (i32.const 0)";
    let clock = Arc::new(FixedClock(0));
    let (result, _) = run_guest_with(config, &guest_with(process), Event::new(), clock);

    let err = result.err().unwrap();
    assert!(matches!(err, HostError::FuelExhausted));
    assert_eq!(err.phase(), Phase::Invoke);
}

#[test]
fn test_fuel_sufficient() {
    let config = HostConfig::default().with_fuel_limit(1_000_000);
    let clock = Arc::new(FixedClock(0));
    let (result, _) = run_guest_with(config, &guest_with("(i32.const 5)"), Event::new(), clock);

    assert_eq!(result.unwrap().return_code, 5);
}

#[test]
fn test_return_code_passed_through() {
    for code in [0, 1, -1, i32::MAX, i32::MIN] {
        let (result, _) = run_guest(&guest_with(&format!("(i32.const {code})")), Event::new());
        assert_eq!(result.unwrap().return_code, code);
    }
}

#[test]
fn test_instance_exposes_record_before_process() {
    let host = ModuleHost::new(HostConfig::default()).unwrap();
    let wasm = compile(&guest_with("(i32.const 0)"));
    let module = host.compile(&wasm).unwrap();

    let event = Event::new().with_field("message", "hello");
    let instance = module
        .instantiate(HostContext::new(event.clone()))
        .unwrap();
    assert_eq!(instance.record(), &event);
    assert_eq!(instance.memory_size(), 65536);

    let completion = instance.process().unwrap();
    assert_eq!(completion.record, event);
}
