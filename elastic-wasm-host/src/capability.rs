//! The `elastic` host functions
//!
//! These four imports are the guest's only way to observe or affect the host:
//!
//! | Import | Signature | Effect |
//! |--------|-----------|--------|
//! | `elastic_get_field` | `(name_ptr, name_len, out_ptr, out_len) -> status` | read a field |
//! | `elastic_put_field` | `(key_ptr, key_len, value_ptr, value_len) -> status` | set a field |
//! | `elastic_log` | `(level, msg_ptr, msg_len) -> status` | emit a log line |
//! | `elastic_get_current_time_nanoseconds` | `(out_ptr) -> status` | read the clock |
//!
//! All pointers are offsets into the guest's `memory` export and are checked
//! through [`MemoryView`] before use. Problems caused by the guest come back
//! as a [`StatusCode`]; a host function only traps when the instance was set
//! up without its exports, which no status code can describe.
//!
//! `elastic_get_field` returns variable-length data by asking the guest's own
//! `malloc` for a buffer of exactly the encoded size, copying the MessagePack
//! bytes there and writing `(ptr, len)` as little-endian `u32`s to the
//! out-parameters. A missing field is `Ok` with the out-parameters untouched.

use crate::context::{GuestExports, HostState};
use crate::error::HostError;
use crate::memory::{MemoryError, MemoryView};
use crate::record::Record;
use elastic_wasm_api::{abi, codec, LogLevel, StatusCode, IMPORT_MODULE};
use std::sync::Arc;
use wasmtime::{Caller, Linker, Memory};

/// Register every `elastic` import on `linker`
pub fn register<R: Record>(linker: &mut Linker<HostState<R>>) -> Result<(), HostError> {
    linker
        .func_wrap(IMPORT_MODULE, abi::GET_FIELD, get_field::<R>)
        .map_err(HostError::Registration)?;
    linker
        .func_wrap(IMPORT_MODULE, abi::PUT_FIELD, put_field::<R>)
        .map_err(HostError::Registration)?;
    linker
        .func_wrap(IMPORT_MODULE, abi::LOG, log::<R>)
        .map_err(HostError::Registration)?;
    linker
        .func_wrap(IMPORT_MODULE, abi::GET_CURRENT_TIME, get_current_time::<R>)
        .map_err(HostError::Registration)?;

    Ok(())
}

fn get_field<R: Record>(
    mut caller: Caller<'_, HostState<R>>,
    data_ptr: i32,
    data_len: i32,
    out_ptr: i32,
    out_len: i32,
) -> wasmtime::Result<i32> {
    let exports = guest_exports(&caller, abi::GET_FIELD)?;

    let raw_name = match read_guest(&mut caller, exports.memory, data_ptr, data_len) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(memory_failure(abi::GET_FIELD, &err)),
    };
    let Ok(name) = String::from_utf8(raw_name) else {
        tracing::warn!(function = abi::GET_FIELD, "Field name is not valid UTF-8");
        return Ok(StatusCode::InvalidArgument.as_i32());
    };

    let sink = Arc::clone(&caller.data().sink);
    sink.log(LogLevel::Debug, &format!("get_field: {name}"));

    let Some(value) = caller.data().record.lookup(&name) else {
        tracing::trace!(field = %name, "Field absent");
        return Ok(StatusCode::Ok.as_i32());
    };

    let encoded = match codec::encode(&value) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(field = %name, error = %err, "Failed to encode field value");
            return Ok(StatusCode::InternalFailure.as_i32());
        }
    };
    let Ok(size) = i32::try_from(encoded.len()) else {
        tracing::warn!(
            field = %name,
            size = encoded.len(),
            "Encoded value exceeds guest address space"
        );
        return Ok(StatusCode::InternalFailure.as_i32());
    };

    let ptr = match exports.malloc.call(&mut caller, size) {
        Ok(0) => {
            tracing::warn!(field = %name, size, "Guest allocator returned null");
            return Ok(StatusCode::InternalFailure.as_i32());
        }
        Ok(ptr) => ptr,
        Err(err) => {
            tracing::warn!(field = %name, size, error = %err, "Guest allocator failed");
            return Ok(StatusCode::InternalFailure.as_i32());
        }
    };

    // malloc may have grown memory; take a fresh view.
    let mut view = MemoryView::new(exports.memory.data_mut(&mut caller));
    if let Err(err) = write_result(
        &mut view,
        ptr as u32,
        &encoded,
        out_ptr as u32,
        out_len as u32,
    ) {
        return Ok(memory_failure(abi::GET_FIELD, &err));
    }

    tracing::debug!(
        field = %name,
        kind = value.kind(),
        ptr,
        size,
        "Field returned to guest"
    );
    Ok(StatusCode::Ok.as_i32())
}

/// Validate all three destinations before writing any of them
fn write_result(
    view: &mut MemoryView<'_>,
    ptr: u32,
    encoded: &[u8],
    out_ptr: u32,
    out_len: u32,
) -> Result<(), MemoryError> {
    let len = encoded.len() as u32;
    view.check(ptr, len)?;
    view.check(out_ptr, 4)?;
    view.check(out_len, 4)?;

    view.write(ptr, encoded)?;
    view.write_u32_le(out_ptr, ptr)?;
    view.write_u32_le(out_len, len)
}

fn put_field<R: Record>(
    mut caller: Caller<'_, HostState<R>>,
    key_ptr: i32,
    key_len: i32,
    value_ptr: i32,
    value_len: i32,
) -> wasmtime::Result<i32> {
    let exports = guest_exports(&caller, abi::PUT_FIELD)?;

    let raw_key = match read_guest(&mut caller, exports.memory, key_ptr, key_len) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(memory_failure(abi::PUT_FIELD, &err)),
    };
    let raw_value = match read_guest(&mut caller, exports.memory, value_ptr, value_len) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(memory_failure(abi::PUT_FIELD, &err)),
    };

    let Ok(key) = String::from_utf8(raw_key) else {
        tracing::warn!(function = abi::PUT_FIELD, "Field key is not valid UTF-8");
        return Ok(StatusCode::InvalidArgument.as_i32());
    };
    let value = match codec::decode(&raw_value) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(field = %key, error = %err, "Failed to decode field value");
            return Ok(StatusCode::InvalidArgument.as_i32());
        }
    };

    let sink = Arc::clone(&caller.data().sink);
    sink.log(LogLevel::Debug, &format!("put_field: {key}"));
    tracing::debug!(field = %key, kind = value.kind(), "Field updated by guest");

    caller.data_mut().record.apply(&key, value);
    Ok(StatusCode::Ok.as_i32())
}

fn log<R: Record>(
    mut caller: Caller<'_, HostState<R>>,
    level: i32,
    data_ptr: i32,
    data_len: i32,
) -> wasmtime::Result<i32> {
    let exports = guest_exports(&caller, abi::LOG)?;

    let message = match read_guest(&mut caller, exports.memory, data_ptr, data_len) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(memory_failure(abi::LOG, &err)),
    };

    caller
        .data()
        .sink
        .log(LogLevel::from(level), &String::from_utf8_lossy(&message));
    Ok(StatusCode::Ok.as_i32())
}

fn get_current_time<R: Record>(
    mut caller: Caller<'_, HostState<R>>,
    out_ptr: i32,
) -> wasmtime::Result<i32> {
    let exports = guest_exports(&caller, abi::GET_CURRENT_TIME)?;

    let nanos = caller.data().clock.now_nanos();
    let mut view = MemoryView::new(exports.memory.data_mut(&mut caller));
    if let Err(err) = view.write_u64_le(out_ptr as u32, nanos) {
        return Ok(memory_failure(abi::GET_CURRENT_TIME, &err));
    }
    Ok(StatusCode::Ok.as_i32())
}

fn guest_exports<R: Record>(
    caller: &Caller<'_, HostState<R>>,
    function: &'static str,
) -> wasmtime::Result<GuestExports> {
    caller
        .data()
        .exports
        .clone()
        .ok_or_else(|| {
            anyhow::anyhow!("{function} called before the guest exports were resolved")
        })
}

/// Guest pointers are unsigned offsets; reinterpret the raw `i32` bits.
fn read_guest<R: Record>(
    caller: &mut Caller<'_, HostState<R>>,
    memory: Memory,
    ptr: i32,
    len: i32,
) -> Result<Vec<u8>, MemoryError> {
    let view = MemoryView::new(memory.data_mut(&mut *caller));
    view.read_vec(ptr as u32, len as u32)
}

fn memory_failure(function: &'static str, err: &MemoryError) -> i32 {
    tracing::warn!(function, error = %err, "Rejected guest memory access");
    StatusCode::InternalFailure.as_i32()
}
