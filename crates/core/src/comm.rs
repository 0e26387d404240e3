//! Failure classification for device communication.
//!
//! No operation retries on its own: a failed command is reported as `false`
//! and the caller may simply press again. The classification only decides
//! what to log and which hint to show the user.

use crate::error::Error;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The light went away between enumeration and use.
    Disconnected,
    /// The OS refused access to the endpoint.
    PermissionDenied,
    /// The request itself was invalid (out-of-range value, bad settings).
    InvalidInput,
    /// Any other I/O failure.
    Io,
}

impl ErrorClass {
    /// Classify an error.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::PermissionDenied(_) => Self::PermissionDenied,
            Error::OutOfRange { .. } | Error::Settings(_) => Self::InvalidInput,
            Error::ShortWrite { .. } => Self::Io,
            Error::Hid(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("disconnect")
                    || lower.contains("not found")
                    || lower.contains("no such device")
                {
                    Self::Disconnected
                } else if lower.contains("permission")
                    || lower.contains("access denied")
                    || lower.contains("access is denied")
                {
                    Self::PermissionDenied
                } else {
                    Self::Io
                }
            }
        }
    }

    /// A short hint for user-facing output, if there is one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Disconnected => Some("Check that the light is still plugged in."),
            Self::PermissionDenied => Some(
                "Grant access to the Litra HID interface (on Linux add a udev rule for 046d:c900/c901).",
            ),
            Self::InvalidInput | Self::Io => None,
        }
    }
}
