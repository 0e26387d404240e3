//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real HID endpoints and
//! mock endpoints share the same interface. Every command opens its own
//! handle, writes one report and drops the handle before returning; no
//! connection is held between commands.

use crate::command::Command;
use crate::comm::ErrorClass;
use crate::error::{Error, Result};
use tracing::{debug, trace, warn};

/// Feature report IDs tried when a device's readable report shape is not yet known.
pub const PROBE_REPORT_IDS: [u8; 12] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x10, 0x11, 0x1C, 0x1D, 0x20, 0x21,
];

/// Buffer sizes tried for each probed report ID, smallest first.
pub const PROBE_REPORT_SIZES: [usize; 5] = [8, 16, 20, 32, 64];

/// One raw HID endpoint as reported by the OS, before any Litra filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidEndpoint {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    /// OS path of the endpoint; empty when the OS did not provide one.
    pub path: String,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
}

/// An open HID endpoint. Dropping the handle closes it.
pub trait HidHandle {
    /// Write one output report, returning the number of bytes written.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Read a feature report. `buf[0]` holds the report ID on entry.
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize>;
}

/// Abstraction over the OS HID layer.
pub trait HidBackend: Send + Sync {
    /// List every HID endpoint currently visible to the OS.
    fn endpoints(&self) -> Result<Vec<HidEndpoint>>;

    /// Open an exclusive handle to the endpoint at `path`.
    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>>;
}

impl<T: HidBackend + ?Sized> HidBackend for std::sync::Arc<T> {
    fn endpoints(&self) -> Result<Vec<HidEndpoint>> {
        (**self).endpoints()
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>> {
        (**self).open(path)
    }
}

/// Send one encoded command to the endpoint at `path`.
///
/// Returns `false` on any open, write or short-write failure; never panics
/// or propagates errors.
pub fn send(backend: &dyn HidBackend, path: &str, command: Command) -> bool {
    match write_command(backend, path, &command) {
        Ok(written) => {
            debug!(path, written, "Command sent");
            true
        }
        Err(e) => {
            warn!(
                path,
                class = ?ErrorClass::classify(&e),
                report_hex = format_args!("{:02X?}", command.as_bytes()),
                "Failed to send command: {e}"
            );
            false
        }
    }
}

fn write_command(backend: &dyn HidBackend, path: &str, command: &Command) -> Result<usize> {
    let handle = backend.open(path)?;
    trace!(
        path,
        report_hex = format_args!("{:02X?}", command.as_bytes()),
        "HID TX"
    );
    let written = handle.write(command.as_bytes())?;
    if written < command.len() {
        return Err(Error::ShortWrite {
            written,
            expected: command.len(),
        });
    }
    Ok(written)
}

/// Report ID and buffer size that yielded readable data from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportShape {
    pub report_id: u8,
    pub size: usize,
}

/// A feature report with meaningful content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureReport {
    pub shape: ReportShape,
    /// Raw bytes including the leading report ID.
    pub data: Vec<u8>,
}

/// Read a feature report from the endpoint at `path`.
///
/// With a known `shape` only that shape is read. Otherwise every
/// [`PROBE_REPORT_IDS`] entry is tried with each of [`PROBE_REPORT_SIZES`]
/// until one returns a non-placeholder payload. `Ok(None)` means the device
/// answered nothing interpretable.
///
/// A read counts as data only when a byte after the report ID is non-zero.
/// Byte 0 is excluded: the OS echoes the requested ID there, so a non-zero
/// ID followed by an all-zero payload would otherwise pass as data.
pub fn read_feature_report(
    backend: &dyn HidBackend,
    path: &str,
    shape: Option<ReportShape>,
) -> Result<Option<FeatureReport>> {
    let handle = backend.open(path)?;

    if let Some(shape) = shape {
        return Ok(read_shape(handle.as_ref(), shape).map(|data| FeatureReport { shape, data }));
    }

    for report_id in PROBE_REPORT_IDS {
        for size in PROBE_REPORT_SIZES {
            let shape = ReportShape { report_id, size };
            if let Some(data) = read_shape(handle.as_ref(), shape) {
                debug!(
                    path,
                    report_id = format_args!("0x{report_id:02X}"),
                    size,
                    "Feature report found"
                );
                return Ok(Some(FeatureReport { shape, data }));
            }
        }
    }

    debug!(path, "No readable feature report");
    Ok(None)
}

fn read_shape(handle: &dyn HidHandle, shape: ReportShape) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; shape.size.max(1)];
    buf[0] = shape.report_id;
    let n = match handle.get_feature_report(&mut buf) {
        Ok(n) => n.min(buf.len()),
        Err(e) => {
            trace!(
                report_id = format_args!("0x{:02X}", shape.report_id),
                size = shape.size,
                "Feature report unavailable: {e}"
            );
            return None;
        }
    };
    buf.truncate(n);
    trace!(report_hex = format_args!("{:02X?}", buf), "HID RX");

    let meaningful = buf.iter().skip(1).any(|&b| b != 0);
    meaningful.then_some(buf)
}


#[cfg(test)]
mod tests {
    use super::mock::{beam, Fault, MockBackend};
    use super::*;
    use crate::command;

    #[test]
    fn send_writes_full_report_and_closes_handle() {
        let mock = MockBackend::with_endpoints(vec![beam("beam-1")]);
        assert!(send(&mock, "beam-1", command::encode_power(true)));
        assert_eq!(
            mock.writes_to("beam-1"),
            vec![vec![0x11, 0xFF, 0x04, 0x1D, 0x01]]
        );
        assert_eq!(mock.open_handles(), 0);
    }

    #[test]
    fn send_reports_open_failure() {
        let mock = MockBackend::new();
        mock.inject_fault("gone", Fault::Open);
        assert!(!send(&mock, "gone", command::encode_power(false)));
        assert_eq!(mock.opens(), 0);
    }

    #[test]
    fn send_releases_handle_on_write_failure() {
        let mock = MockBackend::new();
        mock.inject_fault("beam-1", Fault::Write);
        assert!(!send(&mock, "beam-1", command::encode_power(true)));
        assert_eq!(mock.opens(), 1);
        assert_eq!(mock.open_handles(), 0);
    }

    #[test]
    fn send_treats_zero_byte_write_as_failure() {
        let mock = MockBackend::new();
        mock.inject_fault("beam-1", Fault::ShortWrite);
        assert!(!send(&mock, "beam-1", command::encode_power(true)));
        assert_eq!(mock.open_handles(), 0);
    }

    #[test]
    fn probe_finds_first_meaningful_report() {
        let mock = MockBackend::new();
        let mut data = vec![0x11, 0xFF, 0x04, 0x1D, 0x01];
        data.resize(20, 0);
        mock.on_feature_report("beam-1", data.clone());

        let report = read_feature_report(&mock, "beam-1", None).unwrap().unwrap();
        assert_eq!(
            report.shape,
            ReportShape {
                report_id: 0x11,
                size: 20
            }
        );
        assert_eq!(report.data, data);
        assert_eq!(mock.open_handles(), 0);
    }

    #[test]
    fn echoed_report_id_alone_is_placeholder() {
        let mock = MockBackend::new();
        // Report ID echoed back with an all-zero payload
        mock.on_feature_report("beam-1", vec![0x01, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(read_feature_report(&mock, "beam-1", None).unwrap(), None);
        assert_eq!(
            mock.report_reads(),
            PROBE_REPORT_IDS.len() * PROBE_REPORT_SIZES.len()
        );
    }

    #[test]
    fn known_shape_reads_once() {
        let mock = MockBackend::new();
        mock.on_feature_report("beam-1", vec![0x11, 0xFF, 0x04, 0x1D, 0x00, 0x01]);
        let shape = ReportShape {
            report_id: 0x11,
            size: 8,
        };
        let report = read_feature_report(&mock, "beam-1", Some(shape))
            .unwrap()
            .unwrap();
        assert_eq!(report.shape, shape);
        assert_eq!(mock.report_reads(), 1);
    }

    #[test]
    fn read_feature_report_propagates_open_failure() {
        let mock = MockBackend::new();
        mock.inject_fault("gone", Fault::Open);
        assert!(read_feature_report(&mock, "gone", None).is_err());
    }
}
