//! Per-button settings, owned and persisted by the host.
//!
//! The core only reads these and hands back updated values; it never stores
//! them. Field names follow the host's camelCase JSON.

use crate::device::DeviceType;
use crate::error::{Error, Result};
use crate::registry::Selector;
use serde::{Deserialize, Serialize};

/// Brightness applied when a light is toggled on without a stored level.
pub const DEFAULT_TOGGLE_BRIGHTNESS: u16 = 100;
/// Default brightness step in percent.
pub const DEFAULT_BRIGHTNESS_STEP: u16 = 10;
/// Default temperature step in Kelvin.
pub const DEFAULT_TEMPERATURE_STEP: u16 = 100;

/// Settings stored for one button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonSettings {
    /// Device path, or `"all"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,
    /// Display name chosen when the device was selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    /// Last believed on/off state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_on_toggle: Option<bool>,
    /// Step size for relative buttons (percent or Kelvin).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u16>,
}

impl ButtonSettings {
    /// Parse settings from the host's JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Settings(e.to_string()))
    }

    /// Serialize settings for the host to persist.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Settings(e.to_string()))
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type.unwrap_or_default()
    }

    /// Which lights this button drives.
    pub fn selector(&self) -> Selector {
        Selector::from_value(self.device_path.as_deref(), self.device_type())
    }

    /// Believed state; a button that never stored one is off.
    pub fn is_on(&self) -> bool {
        self.is_on.unwrap_or(false)
    }

    /// Apply brightness/temperature when toggling on, unless explicitly disabled.
    pub fn apply_on_toggle(&self) -> bool {
        self.apply_on_toggle != Some(false)
    }

    /// Brightness to apply when toggling on.
    pub fn toggle_brightness(&self) -> u16 {
        nonzero_or(self.brightness, DEFAULT_TOGGLE_BRIGHTNESS)
    }

    /// Temperature to apply when toggling on, if one is configured.
    pub fn toggle_temperature(&self) -> Option<u16> {
        self.temperature.filter(|&k| k != 0)
    }

    pub fn brightness_step(&self) -> u16 {
        nonzero_or(self.step, DEFAULT_BRIGHTNESS_STEP)
    }

    pub fn temperature_step(&self) -> u16 {
        nonzero_or(self.step, DEFAULT_TEMPERATURE_STEP)
    }
}

/// Zero counts as unset.
fn nonzero_or(value: Option<u16>, default: u16) -> u16 {
    value.filter(|&v| v != 0).unwrap_or(default)
}
