//! elastic-wasm-api: Shared types for the elastic-wasm guest ABI
//!
//! This crate defines the protocol between host and guest (wasm module).
//! Field values cross the boundary as MessagePack, see [`codec`].

pub mod codec;
pub mod value;

pub use codec::{decode, encode, CodecError};
pub use value::FieldValue;

use std::fmt;

/// ABI version for compatibility checking.
///
/// Bumped whenever a function name, signature or status code changes.
pub const ABI_VERSION: u32 = 1;

/// Import namespace of every host function.
pub const IMPORT_MODULE: &str = "elastic";

/// Names of host functions and required guest exports
pub mod abi {
    /// `(name_ptr, name_len, out_ptr, out_len) -> status`
    pub const GET_FIELD: &str = "elastic_get_field";
    /// `(key_ptr, key_len, value_ptr, value_len) -> status`
    pub const PUT_FIELD: &str = "elastic_put_field";
    /// `(level, msg_ptr, msg_len) -> status`
    pub const LOG: &str = "elastic_log";
    /// `(out_ptr) -> status`
    pub const GET_CURRENT_TIME: &str = "elastic_get_current_time_nanoseconds";

    /// Guest allocator: `malloc(size: i32) -> i32`
    pub const EXPORT_MALLOC: &str = "malloc";
    /// Guest entry point: `process() -> i32`
    pub const EXPORT_PROCESS: &str = "process";
    /// Guest linear memory
    pub const EXPORT_MEMORY: &str = "memory";
}

/// Outcome of a host function call, returned to the guest as an `i32`.
///
/// Out-parameters written by a call are only meaningful when the status
/// is [`StatusCode::Ok`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Call succeeded
    Ok = 0,
    /// The host could not complete the call (memory access, allocator, ...)
    InternalFailure = 1,
    /// The guest passed something the host could not interpret
    InvalidArgument = 2,
    /// A host-side lookup failed; distinct from an absent field
    NotFound = 3,
}

impl StatusCode {
    /// Raw value handed to the guest
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse a raw status, `None` for values outside the ABI
    pub const fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Ok),
            1 => Some(Self::InternalFailure),
            2 => Some(Self::InvalidArgument),
            3 => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Whether this is [`StatusCode::Ok`]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> Self {
        status.as_i32()
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::from_i32(raw).ok_or(raw)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::InternalFailure => "internal failure",
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
        };
        f.write_str(name)
    }
}

/// Severity carried by `elastic_log`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Critical = 4,
}

impl LogLevel {
    /// Raw value passed by the guest
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<i32> for LogLevel {
    /// Out-of-range levels are clamped rather than rejected: a log line is
    /// never a reason to fail the call.
    fn from(raw: i32) -> Self {
        match raw {
            i32::MIN..=0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            3 => Self::Error,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_names() {
        assert_eq!(ABI_VERSION, 1);
        assert_eq!(IMPORT_MODULE, "elastic");
        assert!(abi::GET_FIELD.starts_with(IMPORT_MODULE));
        assert!(abi::GET_CURRENT_TIME.starts_with(IMPORT_MODULE));
    }

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Ok.as_i32(), 0);
        assert_eq!(StatusCode::InternalFailure.as_i32(), 1);
        assert_eq!(StatusCode::InvalidArgument.as_i32(), 2);
        assert_eq!(StatusCode::NotFound.as_i32(), 3);
    }

    #[test]
    fn test_status_code_try_from() {
        assert_eq!(StatusCode::try_from(2), Ok(StatusCode::InvalidArgument));
        assert_eq!(StatusCode::try_from(4), Err(4));
        assert_eq!(StatusCode::try_from(-1), Err(-1));
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::NotFound.is_ok());
    }

    #[test]
    fn test_log_level_clamping() {
        assert_eq!(LogLevel::from(0), LogLevel::Debug);
        assert_eq!(LogLevel::from(3), LogLevel::Error);
        assert_eq!(LogLevel::from(4), LogLevel::Critical);
        assert_eq!(LogLevel::from(-7), LogLevel::Debug);
        assert_eq!(LogLevel::from(99), LogLevel::Critical);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::InvalidArgument.to_string(), "invalid argument");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
