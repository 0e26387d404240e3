//! Button actions: what a key press or appearance refresh does to the lights.
//!
//! Each function takes the button's [`ButtonSettings`], drives the
//! [`Registry`], and tells the host what to show and whether the settings
//! changed. Showing alerts and persisting settings stay with the host.

use crate::device::DeviceType;
use crate::registry::{BatchOutcome, Operation, Registry, Selector};
use crate::settings::ButtonSettings;
use crate::state::PollOutcome;
use tracing::{debug, info, warn};

/// Title shown when no light matches the button.
pub const NOT_CONNECTED_TITLE: &str = "\n❌";

/// Daytime window used for Glow scheduling: 08:00 to 16:59.
pub const DAYTIME_HOURS: std::ops::Range<u32> = 8..17;

/// Direction of a relative step button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn apply(self, step: u16) -> i32 {
        match self {
            Self::Up => i32::from(step),
            Self::Down => -i32::from(step),
        }
    }

    fn sign(self) -> char {
        match self {
            Self::Up => '+',
            Self::Down => '-',
        }
    }
}

/// Result of a toggle press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Nothing matched the selection; settings untouched.
    NoDevices,
    /// No light accepted the command; settings untouched.
    Failed,
    /// Lights were switched and `is_on` was written back to the settings.
    Toggled { is_on: bool, succeeded: usize },
}

/// What a button should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonAppearance {
    /// 0 = off, 1 = on.
    pub state: u8,
    pub title: String,
}

impl ButtonAppearance {
    fn not_connected() -> Self {
        Self {
            state: 0,
            title: NOT_CONNECTED_TITLE.to_string(),
        }
    }
}

/// Result of an appearance refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refresh {
    pub appearance: ButtonAppearance,
    /// The settings' `is_on` was corrected and must be persisted.
    pub persist: bool,
}

/// Toggle the lights a control button is bound to.
///
/// Turning on also applies the stored brightness (default 100 %) and
/// temperature to each light that accepted power-on, unless
/// `applyOnToggle` is `false`. The new state is written to `settings`
/// whenever at least one light was found.
pub fn toggle(registry: &Registry, settings: &mut ButtonSettings) -> ToggleOutcome {
    let new_state = !settings.is_on();
    let devices = registry.resolve(&settings.selector());
    debug!(new_state, count = devices.len(), "Toggle pressed");
    if devices.is_empty() {
        warn!("No Litra lights found");
        return ToggleOutcome::NoDevices;
    }

    let succeeded = if new_state {
        devices
            .iter()
            .filter(|device| {
                if !registry.turn_on(device) {
                    return false;
                }
                if settings.apply_on_toggle() {
                    registry.set_brightness(device, settings.toggle_brightness());
                    if let Some(kelvin) = settings.toggle_temperature() {
                        registry.set_temperature(device, kelvin);
                    }
                }
                true
            })
            .count()
    } else {
        registry
            .apply_each(&devices, Operation::PowerOff)
            .succeeded
    };

    settings.is_on = Some(new_state);
    info!(succeeded, is_on = new_state, "Toggled Litra lights");
    ToggleOutcome::Toggled {
        is_on: new_state,
        succeeded,
    }
}

/// Toggle every connected light. Zero lights switched is a failure and
/// leaves the settings untouched.
///
/// Brightness and temperature are applied only when stored.
pub fn toggle_all(registry: &Registry, settings: &mut ButtonSettings) -> ToggleOutcome {
    let new_state = !settings.is_on();
    let devices = registry.resolve(&Selector::AllOfType(DeviceType::All));
    if devices.is_empty() {
        warn!("No Litra lights found");
        return ToggleOutcome::NoDevices;
    }

    let op = if new_state {
        Operation::PowerOn
    } else {
        Operation::PowerOff
    };
    let outcome = registry.apply_each(&devices, op);
    if outcome.succeeded == 0 {
        warn!(is_on = new_state, "Could not switch any light");
        return ToggleOutcome::Failed;
    }

    if new_state && settings.apply_on_toggle() {
        for device in &devices {
            if let Some(percent) = settings.brightness.filter(|&p| p != 0) {
                registry.set_brightness(device, percent);
            }
            if let Some(kelvin) = settings.toggle_temperature() {
                registry.set_temperature(device, kelvin);
            }
        }
    }

    settings.is_on = Some(new_state);
    info!(
        succeeded = outcome.succeeded,
        is_on = new_state,
        "Toggled all Litra lights"
    );
    ToggleOutcome::Toggled {
        is_on: new_state,
        succeeded: outcome.succeeded,
    }
}

/// Step brightness for the button's lights by its configured step.
pub fn adjust_brightness(
    registry: &Registry,
    settings: &ButtonSettings,
    direction: Direction,
) -> BatchOutcome {
    let step = settings.brightness_step();
    let outcome = registry.step_brightness(&settings.selector(), direction.apply(step));
    info!(?direction, step, ?outcome, "Adjusted brightness");
    outcome
}

/// Step color temperature for the button's lights by its configured step.
pub fn adjust_temperature(
    registry: &Registry,
    settings: &ButtonSettings,
    direction: Direction,
) -> BatchOutcome {
    let step = settings.temperature_step();
    let outcome = registry.step_temperature(&settings.selector(), direction.apply(step));
    info!(?direction, step, ?outcome, "Adjusted temperature");
    outcome
}

/// Appearance of an on/off button for a believed state.
pub fn toggle_appearance(settings: &ButtonSettings, has_devices: bool) -> ButtonAppearance {
    if !has_devices {
        return ButtonAppearance::not_connected();
    }
    let is_on = settings.is_on();
    let word = if is_on { "On" } else { "Off" };
    let title = if settings.selector().is_aggregate() {
        format!("\nAll {word}")
    } else if let Some(name) = settings.device_name.as_deref() {
        format!("\n{name}\n{word}")
    } else {
        format!("\n{word}")
    };
    ButtonAppearance {
        state: u8::from(is_on),
        title,
    }
}

/// Title of a brightness step button, e.g. `"\n+10%"`.
pub fn brightness_step_title(settings: &ButtonSettings, direction: Direction) -> String {
    format!("\n{}{}%", direction.sign(), settings.brightness_step())
}

/// Title of a temperature step button, e.g. `"\n-100K"`.
pub fn temperature_step_title(settings: &ButtonSettings, direction: Direction) -> String {
    format!("\n{}{}K", direction.sign(), settings.temperature_step())
}

/// Re-query an on/off button's lights and compute its appearance.
///
/// A readable state overrides the stored belief (written back into
/// `settings`, with `persist` set when it changed); an unreadable one keeps it.
pub fn refresh(registry: &Registry, settings: &mut ButtonSettings) -> Refresh {
    match registry.poll(&settings.selector(), settings.is_on()) {
        PollOutcome::NoDevices => Refresh {
            appearance: ButtonAppearance::not_connected(),
            persist: false,
        },
        PollOutcome::Reconciled(r) => {
            if r.persist {
                settings.is_on = Some(r.is_on);
            }
            Refresh {
                appearance: toggle_appearance(settings, true),
                persist: r.persist,
            }
        }
    }
}

/// Whether `hour` (0-23) falls in the daytime window.
pub fn is_daytime(hour: u32) -> bool {
    DAYTIME_HOURS.contains(&hour)
}
