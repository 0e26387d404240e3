//! System HID backend built on `hidapi`.

use crate::error::{Error, Result};
use crate::transport::{HidBackend, HidEndpoint, HidHandle};
use hidapi::{HidApi, HidDevice, HidError};
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// [`HidBackend`] over the OS HID stack.
///
/// The device list is refreshed on every enumeration so plug and unplug
/// events are seen without restarting.
pub struct HidApiBackend {
    api: Mutex<HidApi>,
}

impl HidApiBackend {
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(hid_error)?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }

    fn api(&self) -> Result<MutexGuard<'_, HidApi>> {
        self.api
            .lock()
            .map_err(|e| Error::Hid(format!("hidapi lock poisoned: {e}")))
    }
}

fn hid_error(err: HidError) -> Error {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("access is denied") {
        Error::PermissionDenied(msg)
    } else {
        Error::Hid(msg)
    }
}

impl HidBackend for HidApiBackend {
    fn endpoints(&self) -> Result<Vec<HidEndpoint>> {
        let mut api = self.api()?;
        api.refresh_devices().map_err(hid_error)?;

        let endpoints: Vec<HidEndpoint> = api
            .device_list()
            .map(|info| HidEndpoint {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                usage_page: info.usage_page(),
                path: info.path().to_string_lossy().into_owned(),
                product: info.product_string().map(str::to_string),
                manufacturer: info.manufacturer_string().map(str::to_string),
            })
            .collect();
        trace!(count = endpoints.len(), "HID endpoints listed");
        Ok(endpoints)
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>> {
        let c_path =
            CString::new(path).map_err(|e| Error::Hid(format!("invalid HID path {path:?}: {e}")))?;
        let device = self.api()?.open_path(&c_path).map_err(hid_error)?;
        Ok(Box::new(HidApiHandle { device }))
    }
}

/// An open endpoint; `hidapi` closes it when dropped.
struct HidApiHandle {
    device: HidDevice,
}

impl HidHandle for HidApiHandle {
    fn write(&self, data: &[u8]) -> Result<usize> {
        self.device
            .write(data)
            .map_err(|e| Error::Hid(format!("write: {e}")))
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize> {
        self.device
            .get_feature_report(buf)
            .map_err(|e| Error::Hid(format!("get_feature_report: {e}")))
    }
}
