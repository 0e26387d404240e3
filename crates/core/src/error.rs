//! Error types for litra-deck-core.

use thiserror::Error;

/// Core library error type.
///
/// Device operations on [`Registry`](crate::registry::Registry) log these
/// and report plain success/failure values instead.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Value out of the device's accepted range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The device accepted fewer bytes than the report length.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Button settings could not be parsed or serialized.
    #[error("settings error: {0}")]
    Settings(String),

    /// Permission denied opening the HID endpoint (missing udev rule, exclusive access).
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
