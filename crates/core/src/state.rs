//! Power state queries and reconciliation of believed vs. actual state.
//!
//! The lights offer no dependable read-back. A feature-report read sometimes
//! carries the power flag and sometimes nothing useful, so every query is
//! tri-state and the caller's persisted belief fills the gaps.
//!
//! Brightness and temperature cannot be read at all. [`StepCache`] remembers
//! the last value this process applied per device path so relative steps
//! have a starting point. It drifts whenever a light is adjusted by anything
//! else (its own buttons, another app); that is accepted.

use crate::command::{functions, REPORT_PREFIX};
use crate::safety;
use crate::transport::{self, HidBackend, ReportShape};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Brightness assumed for a light this process has not adjusted yet.
pub const DEFAULT_BRIGHTNESS: u16 = 50;
/// Temperature assumed for a light this process has not adjusted yet.
pub const DEFAULT_TEMPERATURE: u16 = 4500;

/// Function bytes whose payload carries the power flag: the get-power
/// response and the echo of a set-power report.
const POWER_REPORT_FUNCTIONS: [u8; 2] = [0x00, functions::POWER];

/// Tri-state result of a power query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    On,
    Off,
    /// The device answered nothing interpretable.
    Unknown,
}

impl PowerState {
    /// `Some(true)` / `Some(false)` for a known state, `None` for unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// Combined power state of a set of lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatePower {
    /// The set was empty: nothing is connected.
    NoDevices,
    /// Every light reported on.
    On,
    /// At least one light reported off or could not be read.
    Off,
    /// A single selected light could not be read.
    Unknown,
}

impl From<PowerState> for AggregatePower {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::On => Self::On,
            PowerState::Off => Self::Off,
            PowerState::Unknown => Self::Unknown,
        }
    }
}

impl AggregatePower {
    /// Collapse to a tri-state, or `None` when there were no devices.
    pub fn as_power_state(&self) -> Option<PowerState> {
        match self {
            Self::NoDevices => None,
            Self::On => Some(PowerState::On),
            Self::Off => Some(PowerState::Off),
            Self::Unknown => Some(PowerState::Unknown),
        }
    }
}

/// Aggregate per-device states.
///
/// On only when every light is on. An unknown light counts as off, so
/// `{On, Unknown}` and `{Unknown, Unknown}` are both Off.
pub fn aggregate(states: &[PowerState]) -> AggregatePower {
    if states.is_empty() {
        return AggregatePower::NoDevices;
    }
    if states.iter().all(|s| *s == PowerState::On) {
        AggregatePower::On
    } else {
        AggregatePower::Off
    }
}

/// Outcome of reconciling a believed state against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// The state to display.
    pub is_on: bool,
    /// Whether the caller must persist `is_on` (it differs from the belief).
    pub persist: bool,
}

/// Reconcile the caller's `believed` state with a fresh query.
///
/// A known query result wins; an unknown one falls back to the belief.
pub fn reconcile(believed: bool, actual: PowerState) -> Reconciled {
    let is_on = actual.as_bool().unwrap_or(believed);
    Reconciled {
        is_on,
        persist: is_on != believed,
    }
}

/// Result of polling a selection against the caller's belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing matched the selection; show "not connected".
    NoDevices,
    Reconciled(Reconciled),
}

/// Reconcile a belief against an aggregate query.
pub fn reconcile_aggregate(believed: bool, actual: AggregatePower) -> PollOutcome {
    match actual.as_power_state() {
        None => PollOutcome::NoDevices,
        Some(state) => PollOutcome::Reconciled(reconcile(believed, state)),
    }
}

/// Interpret a raw feature report as a power state.
///
/// The control prefix may sit at byte 0 (numbered report 0x11) or byte 1
/// (after a zero report ID). The byte after the function is the power flag.
pub fn power_from_report(data: &[u8]) -> PowerState {
    for offset in 0..=1 {
        let Some(window) = data.get(offset..offset + REPORT_PREFIX.len() + 2) else {
            continue;
        };
        let (prefix, rest) = window.split_at(REPORT_PREFIX.len());
        if prefix != REPORT_PREFIX || !POWER_REPORT_FUNCTIONS.contains(&rest[0]) {
            continue;
        }
        return match rest[1] {
            0x00 => PowerState::Off,
            0x01 => PowerState::On,
            _ => PowerState::Unknown,
        };
    }
    PowerState::Unknown
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remembers which feature report shape each device path answered with.
#[derive(Debug, Default)]
pub struct ReportShapeCache {
    shapes: Mutex<HashMap<String, ReportShape>>,
}

impl ReportShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<ReportShape> {
        lock(&self.shapes).get(path).copied()
    }

    pub fn remember(&self, path: &str, shape: ReportShape) {
        lock(&self.shapes).insert(path.to_string(), shape);
    }

    pub fn forget(&self, path: &str) {
        lock(&self.shapes).remove(path);
    }
}

/// Query the power state of the light at `path`.
///
/// Transport errors and uninterpretable reports both yield
/// [`PowerState::Unknown`]. A shape that stops answering is forgotten so the
/// next query probes again.
pub fn query_power(backend: &dyn HidBackend, path: &str, shapes: &ReportShapeCache) -> PowerState {
    let known = shapes.get(path);
    match transport::read_feature_report(backend, path, known) {
        Ok(Some(report)) => {
            shapes.remember(path, report.shape);
            let state = power_from_report(&report.data);
            debug!(path, ?state, "Power state queried");
            state
        }
        Ok(None) => {
            if known.is_some() {
                shapes.forget(path);
            }
            debug!(path, "Power state unknown");
            PowerState::Unknown
        }
        Err(e) => {
            shapes.forget(path);
            warn!(path, "Power query failed: {e}");
            PowerState::Unknown
        }
    }
}

/// Last brightness and temperature applied per device path, for relative steps.
#[derive(Debug, Default)]
pub struct StepCache {
    brightness: Mutex<HashMap<String, u16>>,
    temperature: Mutex<HashMap<String, u16>>,
}

impl StepCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied brightness, or [`DEFAULT_BRIGHTNESS`].
    pub fn brightness(&self, path: &str) -> u16 {
        lock(&self.brightness)
            .get(path)
            .copied()
            .unwrap_or(DEFAULT_BRIGHTNESS)
    }

    pub fn set_brightness(&self, path: &str, percent: u16) {
        lock(&self.brightness).insert(path.to_string(), percent);
    }

    /// Last applied temperature, or [`DEFAULT_TEMPERATURE`].
    pub fn temperature(&self, path: &str) -> u16 {
        lock(&self.temperature)
            .get(path)
            .copied()
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn set_temperature(&self, path: &str, kelvin: u16) {
        lock(&self.temperature).insert(path.to_string(), kelvin);
    }
}

/// Apply a signed step to a brightness, staying within `1..=100`.
pub fn step_brightness(current: u16, delta: i32) -> u16 {
    step_within(
        current,
        delta,
        safety::BRIGHTNESS_MIN,
        safety::BRIGHTNESS_MAX,
    )
}

/// Apply a signed step to a temperature, staying within `2700..=6500`.
pub fn step_temperature(current: u16, delta: i32) -> u16 {
    step_within(
        current,
        delta,
        safety::TEMPERATURE_MIN,
        safety::TEMPERATURE_MAX,
    )
}

fn step_within(current: u16, delta: i32, min: u16, max: u16) -> u16 {
    let next = i32::from(current)
        .saturating_add(delta)
        .clamp(i32::from(min), i32::from(max));
    // Clamped into a u16 range above.
    next as u16
}
