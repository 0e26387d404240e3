//! Device model: Litra discovery and selection lists.
//!
//! Devices are rebuilt on every enumeration and never cached; lights come
//! and go while the process runs.

use crate::transport::{HidBackend, HidEndpoint};
use crate::{pids, CONTROL_USAGE_PAGE, LOGITECH_VID};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Value of the synthetic "all lights" entry in [`DeviceOption`] lists.
pub const ALL_DEVICES_VALUE: &str = "all";

/// Supported Litra models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LitraModel {
    Glow,
    Beam,
}

impl LitraModel {
    /// Both models, in the order they are matched.
    pub const ALL: &'static [LitraModel] = &[LitraModel::Glow, LitraModel::Beam];

    /// Look up model from USB vendor and product ID.
    pub fn from_ids(vid: u16, pid: u16) -> Option<Self> {
        if vid != LOGITECH_VID {
            return None;
        }
        match pid {
            pids::LITRA_GLOW => Some(Self::Glow),
            pids::LITRA_BEAM => Some(Self::Beam),
            _ => None,
        }
    }

    /// Short name used in labels ("Glow", "Beam").
    pub fn name(&self) -> &'static str {
        match self {
            Self::Glow => "Glow",
            Self::Beam => "Beam",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::Glow => pids::LITRA_GLOW,
            Self::Beam => pids::LITRA_BEAM,
        }
    }
}

impl std::fmt::Display for LitraModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Query filter over models. `All` matches either model and is never stored on a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    Glow,
    Beam,
    #[default]
    All,
}

impl DeviceType {
    /// Whether a device of `model` passes this filter.
    pub fn matches(&self, model: LitraModel) -> bool {
        match self {
            Self::All => true,
            Self::Glow => model == LitraModel::Glow,
            Self::Beam => model == LitraModel::Beam,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Glow => "Glow",
            Self::Beam => "Beam",
            Self::All => "All",
        }
    }

    /// Parse a filter name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "glow" => Some(Self::Glow),
            "beam" => Some(Self::Beam),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl From<LitraModel> for DeviceType {
    fn from(model: LitraModel) -> Self {
        match model {
            LitraModel::Glow => Self::Glow,
            LitraModel::Beam => Self::Beam,
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The control endpoint of one physical Litra light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub vendor_id: u16,
    pub product_id: u16,
    /// OS path of the control endpoint; stable for the session and the lookup key.
    pub path: String,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub model: LitraModel,
}

impl Device {
    /// Build a device from a raw endpoint if it is the control interface of a
    /// light passing `filter`.
    pub fn from_endpoint(endpoint: &HidEndpoint, filter: DeviceType) -> Option<Self> {
        let model = LitraModel::from_ids(endpoint.vendor_id, endpoint.product_id)?;
        if !filter.matches(model) || endpoint.path.is_empty() {
            return None;
        }
        if endpoint.usage_page != CONTROL_USAGE_PAGE {
            debug!(
                model = model.name(),
                usage_page = format_args!("0x{:04X}", endpoint.usage_page),
                "Skipped non-control interface"
            );
            return None;
        }
        Some(Self {
            vendor_id: endpoint.vendor_id,
            product_id: endpoint.product_id,
            path: endpoint.path.clone(),
            product: endpoint.product.clone(),
            manufacturer: endpoint.manufacturer.clone(),
            model,
        })
    }
}

/// A selectable entry for a device dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOption {
    pub label: String,
    pub value: String,
}

/// List the Litra lights matching `filter`, in OS enumeration order.
///
/// An enumeration failure is logged and reported as no devices.
pub fn list_devices(backend: &dyn HidBackend, filter: DeviceType) -> Vec<Device> {
    debug!(filter = filter.name(), "Starting HID device enumeration");
    let endpoints = match backend.endpoints() {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("HID enumeration failed: {e}");
            return Vec::new();
        }
    };

    let devices: Vec<Device> = endpoints
        .iter()
        .filter_map(|endpoint| Device::from_endpoint(endpoint, filter))
        .inspect(|device| {
            info!(
                model = device.model.name(),
                product = device.product.as_deref().unwrap_or("Unknown"),
                vid = format_args!("0x{:04X}", device.vendor_id),
                pid = format_args!("0x{:04X}", device.product_id),
                path = %device.path,
                "Found Litra device"
            );
        })
        .collect();

    debug!(
        scanned = endpoints.len(),
        count = devices.len(),
        "Device enumeration complete"
    );
    devices
}

/// Re-enumerate and find the device at `path`.
pub fn get_device_by_path(
    backend: &dyn HidBackend,
    path: &str,
    filter: DeviceType,
) -> Option<Device> {
    list_devices(backend, filter)
        .into_iter()
        .find(|device| device.path == path)
}

/// Build dropdown options for `filter`.
///
/// With more than one device an "All <type> Lights (N)" entry with value
/// [`ALL_DEVICES_VALUE`] comes first. Device labels are positional
/// (`"Beam #2"`) and can change when lights are re-plugged.
pub fn list_device_options(backend: &dyn HidBackend, filter: DeviceType) -> Vec<DeviceOption> {
    device_options(&list_devices(backend, filter), filter)
}

/// Build dropdown options from an already enumerated list.
pub fn device_options(devices: &[Device], filter: DeviceType) -> Vec<DeviceOption> {
    let mut options = Vec::with_capacity(devices.len() + 1);
    if devices.len() > 1 {
        options.push(DeviceOption {
            label: format!("All {} Lights ({})", filter.name(), devices.len()),
            value: ALL_DEVICES_VALUE.to_string(),
        });
    }
    options.extend(devices.iter().enumerate().map(|(i, device)| DeviceOption {
        label: format!("{} #{}", device.model.name(), i + 1),
        value: device.path.clone(),
    }));
    options
}
