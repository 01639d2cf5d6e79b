//! elastic-wasm-sdk: SDK for writing guest modules
//!
//! Wraps the raw `elastic` imports in safe functions and provides the
//! `malloc` export the host needs to hand field values to the guest.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use elastic_wasm_sdk::prelude::*;
//!
//! export_malloc!();
//!
//! #[no_mangle]
//! pub extern "C" fn process() -> i32 {
//!     match get_field("message") {
//!         Ok(Some(value)) => {
//!             let _ = log(LogLevel::Info, &format!("message is a {}", value.kind()));
//!             0
//!         }
//!         Ok(None) => 1,
//!         Err(status) => status.as_i32(),
//!     }
//! }
//! ```

// Re-export everything from elastic-wasm-api
pub use elastic_wasm_api::*;

#[cfg(target_arch = "wasm32")]
pub use guest::{get_field, log, now_nanos, put_field};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{export_malloc, memory, status_result};
    pub use elastic_wasm_api::{FieldValue, LogLevel, StatusCode};

    #[cfg(target_arch = "wasm32")]
    pub use crate::guest::{get_field, log, now_nanos, put_field};
}

/// Turn a raw status returned by a host function into a `Result`.
///
/// Codes the SDK does not know are reported as
/// [`StatusCode::InternalFailure`].
pub fn status_result(raw: i32) -> Result<(), StatusCode> {
    match StatusCode::try_from(raw) {
        Ok(StatusCode::Ok) => Ok(()),
        Ok(status) => Err(status),
        Err(_) => Err(StatusCode::InternalFailure),
    }
}

/// Memory utilities for guest development
pub mod memory {
    use std::alloc::{alloc, Layout};

    /// Allocate `size` bytes in linear memory, returning 0 on failure.
    ///
    /// Buffers are byte-aligned, so a `(ptr, len)` returned by the host can be
    /// reclaimed with `Vec::from_raw_parts(ptr, len, len)`.
    #[inline]
    pub fn guest_alloc(size: i32) -> i32 {
        if size <= 0 {
            return 0;
        }
        let Ok(layout) = Layout::from_size_align(size as usize, 1) else {
            return 0;
        };
        unsafe { alloc(layout) as i32 }
    }
}

#[cfg(target_arch = "wasm32")]
mod ffi {
    #[link(wasm_import_module = "elastic")]
    extern "C" {
        pub fn elastic_get_field(
            name_ptr: *const u8,
            name_len: i32,
            out_ptr: *mut u32,
            out_len: *mut u32,
        ) -> i32;
        pub fn elastic_put_field(
            key_ptr: *const u8,
            key_len: i32,
            value_ptr: *const u8,
            value_len: i32,
        ) -> i32;
        pub fn elastic_log(level: i32, msg_ptr: *const u8, msg_len: i32) -> i32;
        pub fn elastic_get_current_time_nanoseconds(out_ptr: *mut u64) -> i32;
    }
}

#[cfg(target_arch = "wasm32")]
mod guest {
    use crate::{ffi, status_result};
    use elastic_wasm_api::{codec, FieldValue, LogLevel, StatusCode};

    /// Read a field of the current event. `Ok(None)` when it is absent.
    pub fn get_field(name: &str) -> Result<Option<FieldValue>, StatusCode> {
        let mut ptr: u32 = 0;
        let mut len: u32 = 0;
        let name_len = name.len() as i32;
        let status =
            unsafe { ffi::elastic_get_field(name.as_ptr(), name_len, &mut ptr, &mut len) };
        status_result(status)?;

        if len == 0 {
            return Ok(None);
        }
        if ptr == 0 {
            return Err(StatusCode::InternalFailure);
        }

        // The buffer came from our own `malloc`; take ownership so it is freed.
        let bytes = unsafe { Vec::from_raw_parts(ptr as *mut u8, len as usize, len as usize) };
        codec::decode(&bytes)
            .map(Some)
            .map_err(|_| StatusCode::InvalidArgument)
    }

    /// Set a field of the current event
    pub fn put_field(key: &str, value: &FieldValue) -> Result<(), StatusCode> {
        let bytes = codec::encode(value).map_err(|_| StatusCode::InternalFailure)?;
        let (key_len, value_len) = (key.len() as i32, bytes.len() as i32);
        let status =
            unsafe { ffi::elastic_put_field(key.as_ptr(), key_len, bytes.as_ptr(), value_len) };
        status_result(status)
    }

    pub fn log(level: LogLevel, message: &str) -> Result<(), StatusCode> {
        let len = message.len() as i32;
        let status = unsafe { ffi::elastic_log(level.as_i32(), message.as_ptr(), len) };
        status_result(status)
    }

    /// Host wall-clock time in nanoseconds since the Unix epoch
    pub fn now_nanos() -> Result<u64, StatusCode> {
        let mut nanos: u64 = 0;
        let status = unsafe { ffi::elastic_get_current_time_nanoseconds(&mut nanos) };
        status_result(status).map(|()| nanos)
    }
}

/// Export the `malloc` function the host allocates result buffers with.
///
/// Only expands on `wasm32`, where no libc `malloc` exists to clash with.
///
/// # Example
///
/// ```rust,ignore
/// elastic_wasm_sdk::export_malloc!();
/// ```
#[macro_export]
macro_rules! export_malloc {
    () => {
        #[cfg(target_arch = "wasm32")]
        #[no_mangle]
        pub extern "C" fn malloc(size: i32) -> i32 {
            $crate::memory::guest_alloc(size)
        }
    };
}
