//! litra-deck-core: Litra device discovery, command encoding, and state reconciliation.
//!
//! This crate talks to Logitech Litra Glow and Litra Beam lights over USB HID.
//! It enumerates the control interface of each light, encodes power,
//! brightness and color temperature reports, and reconciles a caller-held
//! on/off belief against whatever the device can report back.

pub mod actions;
pub mod command;
pub mod comm;
pub mod device;
pub mod error;
pub mod hid;
pub mod poll;
pub mod registry;
pub mod safety;
pub mod settings;
pub mod state;
pub mod transport;

/// Logitech USB Vendor ID.
pub const LOGITECH_VID: u16 = 0x046D;

/// HID usage page of the vendor control interface. Other interfaces exposed
/// by the same light do not accept control reports.
pub const CONTROL_USAGE_PAGE: u16 = 0xFF43;

/// Known Litra product IDs.
pub mod pids {
    /// Litra Glow.
    pub const LITRA_GLOW: u16 = 0xC900;
    /// Litra Beam.
    pub const LITRA_BEAM: u16 = 0xC901;
}

pub use device::{Device, DeviceOption, DeviceType};
pub use registry::{Registry, Selector};
pub use state::{AggregatePower, PowerState};
