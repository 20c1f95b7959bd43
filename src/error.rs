//! Unified error types for the parameter store and provisioning portal.
//!
//! One `Error` enum that every subsystem converts into, keeping the portal
//! poll loop's error handling uniform. All variants are `Copy` and carry no
//! allocation; every fallible operation returns `Result`.

use core::fmt;

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A parameter name did not resolve to a schema entry.
    NotFound,
    /// A parameter index is past the end of the schema.
    OutOfRange,
    /// A caller-supplied buffer is too small for a fixed-width field.
    BufferTooSmall,
    /// Text or binary input failed to parse for the field's type.
    Malformed,
    /// The persisted record's signature or CRC did not match on load.
    IntegrityFailure,
    /// Underlying storage or network bring-up failed.
    Io(&'static str),
    /// An HTTP method the form handler does not support.
    ProtocolViolation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "parameter not found"),
            Self::OutOfRange => write!(f, "parameter index out of range"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::Malformed => write!(f, "malformed input"),
            Self::IntegrityFailure => write!(f, "record integrity check failed"),
            Self::Io(msg) => write!(f, "I/O: {msg}"),
            Self::ProtocolViolation => write!(f, "unsupported method"),
        }
    }
}

impl core::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
