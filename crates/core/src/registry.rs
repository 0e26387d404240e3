//! The façade callers use to find and drive Litra lights.
//!
//! Nothing here returns an error: single-device operations return `bool`,
//! batch operations return a success count, and power queries return a
//! tri-state. Every failure has already been logged by the time it is
//! collapsed into one of these.

use crate::command::{self, Command};
use crate::device::{self, Device, DeviceOption, DeviceType, ALL_DEVICES_VALUE};
use crate::error::Result;
use crate::hid::HidApiBackend;
use crate::state::{self, AggregatePower, PollOutcome, PowerState, ReportShapeCache, StepCache};
use crate::transport::{self, HidBackend};
use tracing::{debug, info, warn};

/// Which lights an operation targets, resolved to a device list before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// One light by OS path, of either model.
    SingleDevice(String),
    /// Every light passing the filter.
    AllOfType(DeviceType),
}

impl Selector {
    /// Build a selector from a stored device value: absent, empty or `"all"`
    /// selects every light of `device_type`.
    pub fn from_value(value: Option<&str>, device_type: DeviceType) -> Self {
        match value {
            None | Some("") | Some(ALL_DEVICES_VALUE) => Self::AllOfType(device_type),
            Some(path) => Self::SingleDevice(path.to_string()),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::AllOfType(_))
    }

    /// Combine the states queried for this selection.
    ///
    /// A single light keeps its tri-state so an unreadable light falls back
    /// to the caller's belief. A group follows [`state::aggregate`], where an
    /// unreadable light counts as off.
    pub fn combine(&self, states: &[PowerState]) -> AggregatePower {
        match self {
            Self::SingleDevice(_) => states
                .first()
                .map_or(AggregatePower::NoDevices, |s| AggregatePower::from(*s)),
            Self::AllOfType(_) => state::aggregate(states),
        }
    }
}

/// One operation applied to a set of lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PowerOn,
    PowerOff,
    Brightness(u16),
    Temperature(u16),
}

/// How many lights an operation reached and how many accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// Entry point for every device operation.
///
/// Owns the backend and the process-lifetime caches (step values and
/// feature report shapes). Construct one per process and share it.
pub struct Registry {
    backend: Box<dyn HidBackend>,
    steps: StepCache,
    shapes: ReportShapeCache,
}

impl Registry {
    /// Create a registry over any HID backend.
    pub fn new(backend: impl HidBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            steps: StepCache::new(),
            shapes: ReportShapeCache::new(),
        }
    }

    /// Create a registry over the system HID stack.
    pub fn with_hidapi() -> Result<Self> {
        Ok(Self::new(HidApiBackend::new()?))
    }

    /// Last applied brightness/temperature per device.
    pub fn steps(&self) -> &StepCache {
        &self.steps
    }

    pub fn list_devices(&self, filter: DeviceType) -> Vec<Device> {
        device::list_devices(self.backend.as_ref(), filter)
    }

    pub fn get_device_by_path(&self, path: &str, filter: DeviceType) -> Option<Device> {
        device::get_device_by_path(self.backend.as_ref(), path, filter)
    }

    pub fn list_device_options(&self, filter: DeviceType) -> Vec<DeviceOption> {
        device::list_device_options(self.backend.as_ref(), filter)
    }

    /// Resolve a selector to the lights currently connected.
    pub fn resolve(&self, selector: &Selector) -> Vec<Device> {
        match selector {
            Selector::SingleDevice(path) => self
                .get_device_by_path(path, DeviceType::All)
                .into_iter()
                .collect(),
            Selector::AllOfType(filter) => self.list_devices(*filter),
        }
    }

    fn send(&self, device: &Device, command: Command) -> bool {
        transport::send(self.backend.as_ref(), &device.path, command)
    }

    pub fn turn_on(&self, device: &Device) -> bool {
        self.send(device, command::encode_power(true))
    }

    pub fn turn_off(&self, device: &Device) -> bool {
        self.send(device, command::encode_power(false))
    }

    /// Set brightness in percent. Returns `false` without touching the device
    /// when `percent` is outside `1..=100`. An accepted value becomes the
    /// starting point for the next relative step.
    pub fn set_brightness(&self, device: &Device, percent: u16) -> bool {
        match command::encode_brightness(percent) {
            Ok(cmd) => {
                let ok = self.send(device, cmd);
                if ok {
                    self.steps.set_brightness(&device.path, percent);
                }
                ok
            }
            Err(e) => {
                warn!(path = %device.path, "Brightness rejected: {e}");
                false
            }
        }
    }

    /// Set color temperature in Kelvin. Returns `false` without touching the
    /// device when `kelvin` is outside `2700..=6500`.
    pub fn set_temperature(&self, device: &Device, kelvin: u16) -> bool {
        match command::encode_temperature(kelvin) {
            Ok(cmd) => {
                let ok = self.send(device, cmd);
                if ok {
                    self.steps.set_temperature(&device.path, kelvin);
                }
                ok
            }
            Err(e) => {
                warn!(path = %device.path, "Temperature rejected: {e}");
                false
            }
        }
    }

    /// Apply one operation to a single device.
    pub fn apply(&self, device: &Device, op: Operation) -> bool {
        match op {
            Operation::PowerOn => self.turn_on(device),
            Operation::PowerOff => self.turn_off(device),
            Operation::Brightness(percent) => self.set_brightness(device, percent),
            Operation::Temperature(kelvin) => self.set_temperature(device, kelvin),
        }
    }

    /// Apply one operation to every device independently. A failure on one
    /// light never stops the others.
    pub fn apply_each(&self, devices: &[Device], op: Operation) -> BatchOutcome {
        let succeeded = devices
            .iter()
            .filter(|device| self.apply(device, op))
            .count();
        let outcome = BatchOutcome {
            attempted: devices.len(),
            succeeded,
        };
        debug!(?op, ?outcome, "Batch operation complete");
        outcome
    }

    /// Resolve `selector` and apply `op` to each light.
    pub fn apply_selected(&self, selector: &Selector, op: Operation) -> BatchOutcome {
        self.apply_each(&self.resolve(selector), op)
    }

    /// Turn on every light of `filter`, returning how many accepted.
    pub fn turn_on_all(&self, filter: DeviceType) -> usize {
        let outcome = self.apply_selected(&Selector::AllOfType(filter), Operation::PowerOn);
        info!(filter = filter.name(), ?outcome, "Turned lights on");
        outcome.succeeded
    }

    /// Turn off every light of `filter`, returning how many accepted.
    pub fn turn_off_all(&self, filter: DeviceType) -> usize {
        let outcome = self.apply_selected(&Selector::AllOfType(filter), Operation::PowerOff);
        info!(filter = filter.name(), ?outcome, "Turned lights off");
        outcome.succeeded
    }

    /// Tri-state power query for one device.
    pub fn power_state(&self, device: &Device) -> PowerState {
        state::query_power(self.backend.as_ref(), &device.path, &self.shapes)
    }

    /// `Some(true)` on, `Some(false)` off, `None` when the device cannot tell.
    pub fn is_on(&self, device: &Device) -> Option<bool> {
        self.power_state(device).as_bool()
    }

    /// Query every light the selector resolves to, once each.
    pub fn query(&self, selector: &Selector) -> Vec<(Device, PowerState)> {
        self.resolve(selector)
            .into_iter()
            .map(|device| {
                let state = self.power_state(&device);
                (device, state)
            })
            .collect()
    }

    /// Combined power of every light the selector resolves to.
    pub fn power(&self, selector: &Selector) -> AggregatePower {
        let states: Vec<PowerState> = self
            .query(selector)
            .into_iter()
            .map(|(_, state)| state)
            .collect();
        selector.combine(&states)
    }

    /// Query the selection and reconcile it with the caller's `believed` state.
    pub fn poll(&self, selector: &Selector, believed: bool) -> PollOutcome {
        let outcome = state::reconcile_aggregate(believed, self.power(selector));
        if let PollOutcome::Reconciled(r) = outcome {
            if r.persist {
                info!(?selector, is_on = r.is_on, "Power state corrected");
            }
        }
        outcome
    }

    /// Step brightness by `delta` percent from each light's last applied
    /// value. The cache moves only for lights that accepted the new value.
    pub fn step_brightness(&self, selector: &Selector, delta: i32) -> BatchOutcome {
        let devices = self.resolve(selector);
        let succeeded = devices
            .iter()
            .filter(|device| {
                let next = state::step_brightness(self.steps.brightness(&device.path), delta);
                self.set_brightness(device, next)
            })
            .count();
        BatchOutcome {
            attempted: devices.len(),
            succeeded,
        }
    }

    /// Step temperature by `delta` Kelvin from each light's last applied value.
    pub fn step_temperature(&self, selector: &Selector, delta: i32) -> BatchOutcome {
        let devices = self.resolve(selector);
        let succeeded = devices
            .iter()
            .filter(|device| {
                let next = state::step_temperature(self.steps.temperature(&device.path), delta);
                self.set_temperature(device, next)
            })
            .count();
        BatchOutcome {
            attempted: devices.len(),
            succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LitraModel;
    use crate::state::Reconciled;
    use crate::transport::mock::{beam, glow, Fault, MockBackend};
    use std::sync::Arc;

    /// Registry over a mock that the test keeps a handle to.
    fn registry(mock: MockBackend) -> (Registry, Arc<MockBackend>) {
        let mock = Arc::new(mock);
        (Registry::new(Arc::clone(&mock)), mock)
    }

    #[test]
    fn selector_from_value() {
        assert_eq!(
            Selector::from_value(None, DeviceType::Beam),
            Selector::AllOfType(DeviceType::Beam)
        );
        assert_eq!(
            Selector::from_value(Some("all"), DeviceType::All),
            Selector::AllOfType(DeviceType::All)
        );
        assert_eq!(
            Selector::from_value(Some("/dev/hidraw4"), DeviceType::Glow),
            Selector::SingleDevice("/dev/hidraw4".into())
        );
    }

    #[test]
    fn resolve_single_device_of_either_model() {
        let (reg, _) = registry(MockBackend::with_endpoints(vec![glow("g1"), beam("b1")]));
        let devices = reg.resolve(&Selector::SingleDevice("g1".into()));
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].model, LitraModel::Glow);
        assert!(reg.resolve(&Selector::SingleDevice("x".into())).is_empty());
    }

    #[test]
    fn set_brightness_rejects_before_io() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1")]));
        let device = reg.get_device_by_path("b1", DeviceType::Beam).unwrap();
        assert!(!reg.set_brightness(&device, 0));
        assert!(!reg.set_brightness(&device, 101));
        assert!(!reg.set_temperature(&device, 2699));
        assert_eq!(mock.opens(), 0);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn turn_on_all_counts_successes_without_short_circuit() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![
            beam("b1"),
            beam("b2"),
            glow("g1"),
        ]));
        mock.inject_fault("b1", Fault::Write);

        assert_eq!(reg.turn_on_all(DeviceType::All), 2);
        // b1 was still opened and attempted
        assert_eq!(mock.opens(), 3);
        assert_eq!(mock.writes_to("b2").len(), 1);
        assert_eq!(mock.writes_to("g1").len(), 1);
    }

    #[test]
    fn turn_off_all_respects_filter() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1"), glow("g1")]));
        assert_eq!(reg.turn_off_all(DeviceType::Glow), 1);
        assert_eq!(
            mock.writes(),
            vec![("g1".to_string(), vec![0x11, 0xFF, 0x04, 0x1D, 0x00])]
        );
    }

    #[test]
    fn turn_on_all_without_devices_is_zero() {
        let (reg, _) = registry(MockBackend::new());
        assert_eq!(reg.turn_on_all(DeviceType::All), 0);
    }

    #[test]
    fn apply_selected_reports_outcome() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1"), beam("b2")]));
        mock.inject_fault("b2", Fault::ShortWrite);
        let outcome =
            reg.apply_selected(&Selector::AllOfType(DeviceType::Beam), Operation::Brightness(50));
        assert_eq!(
            outcome,
            BatchOutcome {
                attempted: 2,
                succeeded: 1
            }
        );
        assert_eq!(outcome.failed(), 1);
    }

    #[test]
    fn is_on_exposes_tri_state() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1"), beam("b2")]));
        mock.on_feature_report("b1", vec![0x11, 0xFF, 0x04, 0x1D, 0x01, 0x00, 0x00, 0x00]);
        let b1 = reg.get_device_by_path("b1", DeviceType::Beam).unwrap();
        let b2 = reg.get_device_by_path("b2", DeviceType::Beam).unwrap();
        assert_eq!(reg.is_on(&b1), Some(true));
        assert_eq!(reg.is_on(&b2), None);
    }

    #[test]
    fn power_of_empty_selection_is_no_devices() {
        let (reg, _) = registry(MockBackend::new());
        assert_eq!(
            reg.power(&Selector::AllOfType(DeviceType::All)),
            AggregatePower::NoDevices
        );
        assert_eq!(
            reg.poll(&Selector::SingleDevice("b1".into()), true),
            PollOutcome::NoDevices
        );
    }

    #[test]
    fn unreadable_group_reconciles_to_off() {
        let (reg, _) = registry(MockBackend::with_endpoints(vec![beam("b1"), glow("g1")]));
        let all = Selector::AllOfType(DeviceType::All);
        assert_eq!(reg.power(&all), AggregatePower::Off);
        assert_eq!(
            reg.poll(&all, true),
            PollOutcome::Reconciled(Reconciled {
                is_on: false,
                persist: true
            })
        );
    }

    #[test]
    fn query_reads_each_light_once() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1"), glow("g1")]));
        mock.on_feature_report("b1", vec![0x11, 0xFF, 0x04, 0x1D, 0x01, 0x00, 0x00, 0x00]);

        let states = reg.query(&Selector::AllOfType(DeviceType::All));
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].0.path, "b1");
        assert_eq!(states[0].1, PowerState::On);
        assert_eq!(states[1].1, PowerState::Unknown);
        // b1 answers at report ID 0x11 with the smallest size; g1 tries every shape
        let sizes = transport::PROBE_REPORT_SIZES.len();
        let b1_reads = transport::PROBE_REPORT_IDS
            .iter()
            .position(|&id| id == 0x11)
            .unwrap()
            * sizes
            + 1;
        let g1_reads = transport::PROBE_REPORT_IDS.len() * sizes;
        assert_eq!(mock.report_reads(), b1_reads + g1_reads);
    }

    #[test]
    fn unreadable_single_light_keeps_belief() {
        let (reg, _) = registry(MockBackend::with_endpoints(vec![beam("b1")]));
        let single = Selector::SingleDevice("b1".into());
        assert_eq!(reg.power(&single), AggregatePower::Unknown);
        assert_eq!(
            reg.poll(&single, true),
            PollOutcome::Reconciled(Reconciled {
                is_on: true,
                persist: false
            })
        );
    }

    #[test]
    fn extreme_step_saturates_instead_of_overflowing() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1")]));
        let sel = Selector::SingleDevice("b1".into());

        assert_eq!(reg.step_temperature(&sel, i32::MAX).succeeded, 1);
        assert_eq!(reg.steps().temperature("b1"), 6500);
        assert_eq!(reg.step_brightness(&sel, i32::MIN).succeeded, 1);
        assert_eq!(reg.steps().brightness("b1"), 1);
        assert_eq!(
            mock.writes_to("b1").last().unwrap(),
            &vec![0x11, 0xFF, 0x04, 0x4F, 0x00, 0x22]
        );
    }

    #[test]
    fn step_brightness_tracks_last_applied_value() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![beam("b1")]));
        let sel = Selector::SingleDevice("b1".into());

        assert_eq!(reg.step_brightness(&sel, 10).succeeded, 1);
        assert_eq!(reg.steps().brightness("b1"), 60);
        assert_eq!(reg.step_brightness(&sel, 50).succeeded, 1);
        assert_eq!(reg.steps().brightness("b1"), 100);

        let writes = mock.writes_to("b1");
        // 60% -> 31 + 220 = 251 = 0x00FB
        assert_eq!(writes[0], vec![0x11, 0xFF, 0x04, 0x4F, 0x00, 0xFB]);
        // clamped to 100% -> 399 = 0x018F
        assert_eq!(writes[1], vec![0x11, 0xFF, 0x04, 0x4F, 0x01, 0x8F]);
    }

    #[test]
    fn step_cache_unchanged_on_failure() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![glow("g1")]));
        mock.inject_fault("g1", Fault::Write);
        let sel = Selector::AllOfType(DeviceType::Glow);
        let outcome = reg.step_temperature(&sel, -100);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(reg.steps().temperature("g1"), 4500);
    }

    #[test]
    fn absolute_set_moves_step_origin() {
        let (reg, _) = registry(MockBackend::with_endpoints(vec![beam("b1")]));
        let b1 = reg.get_device_by_path("b1", DeviceType::All).unwrap();
        assert!(reg.set_brightness(&b1, 20));
        assert!(reg.set_temperature(&b1, 3000));
        let sel = Selector::SingleDevice("b1".into());
        reg.step_brightness(&sel, -10);
        reg.step_temperature(&sel, 200);
        assert_eq!(reg.steps().brightness("b1"), 10);
        assert_eq!(reg.steps().temperature("b1"), 3200);
    }

    #[test]
    fn step_temperature_down_from_seed() {
        let (reg, mock) = registry(MockBackend::with_endpoints(vec![glow("g1")]));
        let sel = Selector::AllOfType(DeviceType::All);
        reg.step_temperature(&sel, -100);
        assert_eq!(reg.steps().temperature("g1"), 4400);
        // 4400 = 0x1130
        assert_eq!(
            mock.writes_to("g1"),
            vec![vec![0x11, 0xFF, 0x04, 0x9D, 0x11, 0x30]]
        );
    }
}
