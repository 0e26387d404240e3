//! Safety layer: validates brightness and temperature against the ranges the
//! lights accept before any report is encoded.
//!
//! Out-of-range input is rejected, never clamped. A bad value usually means a
//! typo in a button's settings and the caller decides whether to alert.
//!
//! ## Brightness
//! - **Range**: 1 – 100 %
//! - **Device scale**: 31 – 399 (linear, floored)
//!
//! ## Color temperature
//! - **Range**: 2700 – 6500 K, sent as-is

use crate::error::{Error, Result};

pub const BRIGHTNESS_MIN: u16 = 1;
pub const BRIGHTNESS_MAX: u16 = 100;

/// Device intensity at 0 %.
pub const DEVICE_BRIGHTNESS_MIN: u16 = 31;
/// Device intensity at 100 %.
pub const DEVICE_BRIGHTNESS_MAX: u16 = 399;

pub const TEMPERATURE_MIN: u16 = 2700;
pub const TEMPERATURE_MAX: u16 = 6500;

/// Validate a brightness percentage.
pub fn validate_brightness(percent: u16) -> Result<u16> {
    if !(BRIGHTNESS_MIN..=BRIGHTNESS_MAX).contains(&percent) {
        return Err(Error::OutOfRange {
            field: "brightness",
            value: percent.into(),
            min: BRIGHTNESS_MIN.into(),
            max: BRIGHTNESS_MAX.into(),
        });
    }
    Ok(percent)
}

/// Validate a color temperature in Kelvin.
pub fn validate_temperature(kelvin: u16) -> Result<u16> {
    if !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&kelvin) {
        return Err(Error::OutOfRange {
            field: "temperature",
            value: kelvin.into(),
            min: TEMPERATURE_MIN.into(),
            max: TEMPERATURE_MAX.into(),
        });
    }
    Ok(kelvin)
}

/// Map a validated percentage onto the device intensity scale:
/// `floor(31 + percent / 100 * 368)`.
pub fn brightness_to_device(percent: u16) -> u16 {
    let span = u32::from(DEVICE_BRIGHTNESS_MAX - DEVICE_BRIGHTNESS_MIN);
    let scaled = u32::from(percent) * span / 100;
    DEVICE_BRIGHTNESS_MIN + scaled as u16
}
