//! Litra control report encoding.
//!
//! Every control report starts with the same fixed prefix followed by a
//! function byte and a 1 or 2 byte payload:
//!
//! ```text
//! 0x11 0xFF 0x04 <function> [payload...]
//! ```
//!
//! | Operation       | function | payload                    |
//! |-----------------|----------|----------------------------|
//! | Power on/off    | `0x1D`   | `0x01` / `0x00`            |
//! | Set brightness  | `0x4F`   | device intensity, big-endian |
//! | Set temperature | `0x9D`   | Kelvin, big-endian         |
//!
//! The big-endian payload order was taken from the vendor tooling and must
//! be kept: high byte first.

use crate::error::Result;
use crate::safety;

/// Fixed report prefix shared by every control report.
pub const REPORT_PREFIX: [u8; 3] = [0x11, 0xFF, 0x04];

/// Control function bytes.
pub mod functions {
    /// Power on/off.
    pub const POWER: u8 = 0x1D;
    /// Set brightness.
    pub const BRIGHTNESS: u8 = 0x4F;
    /// Set color temperature.
    pub const TEMPERATURE: u8 = 0x9D;
}

/// An encoded control report, consumed once by the transport.
#[derive(Debug, PartialEq, Eq)]
pub struct Command {
    bytes: Vec<u8>,
}

impl Command {
    fn new(function: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(REPORT_PREFIX.len() + 1 + payload.len());
        bytes.extend_from_slice(&REPORT_PREFIX);
        bytes.push(function);
        bytes.extend_from_slice(payload);
        Self { bytes }
    }

    /// The raw report bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Report length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the report has no bytes. Encoded reports never do.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The function byte following the prefix.
    pub fn function(&self) -> u8 {
        self.bytes[REPORT_PREFIX.len()]
    }
}

/// Encode a power on/off report (5 bytes).
pub fn encode_power(on: bool) -> Command {
    Command::new(functions::POWER, &[u8::from(on)])
}

/// Encode a brightness report (6 bytes) for a percentage in `1..=100`.
pub fn encode_brightness(percent: u16) -> Result<Command> {
    let percent = safety::validate_brightness(percent)?;
    let value = safety::brightness_to_device(percent);
    Ok(Command::new(functions::BRIGHTNESS, &value.to_be_bytes()))
}

/// Encode a color temperature report (6 bytes) for Kelvin in `2700..=6500`.
pub fn encode_temperature(kelvin: u16) -> Result<Command> {
    let kelvin = safety::validate_temperature(kelvin)?;
    Ok(Command::new(functions::TEMPERATURE, &kelvin.to_be_bytes()))
}

/// Decode the big-endian 16-bit payload of a brightness or temperature report.
pub fn payload_u16(command: &Command) -> Option<u16> {
    match command.as_bytes() {
        [_, _, _, _, high, low] => Some(u16::from_be_bytes([*high, *low])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_power_on() {
        let cmd = encode_power(true);
        assert_eq!(cmd.as_bytes(), &[0x11, 0xFF, 0x04, 0x1D, 0x01]);
        assert_eq!(cmd.function(), functions::POWER);
        assert_eq!(cmd.len(), 5);
        assert!(!cmd.is_empty());
    }

    #[test]
    fn encode_power_off() {
        assert_eq!(
            encode_power(false).as_bytes(),
            &[0x11, 0xFF, 0x04, 0x1D, 0x00]
        );
    }

    #[test]
    fn encode_brightness_fifty_percent() {
        // floor(31 + 0.5 * 368) = 215 = 0x00D7
        let cmd = encode_brightness(50).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x11, 0xFF, 0x04, 0x4F, 0x00, 0xD7]);
    }

    #[test]
    fn encode_brightness_full_uses_high_byte() {
        // 399 = 0x018F
        let cmd = encode_brightness(100).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x11, 0xFF, 0x04, 0x4F, 0x01, 0x8F]);
    }

    #[test]
    fn encode_brightness_decodes_to_device_scale() {
        for percent in 1..=100u16 {
            let cmd = encode_brightness(percent).unwrap();
            assert_eq!(cmd.len(), 6);
            assert_eq!(
                payload_u16(&cmd),
                Some(safety::brightness_to_device(percent))
            );
        }
    }

    #[test]
    fn encode_brightness_rejects_out_of_range() {
        assert!(encode_brightness(0).is_err());
        assert!(encode_brightness(101).is_err());
    }

    #[test]
    fn encode_temperature_4500() {
        let cmd = encode_temperature(4500).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x11, 0xFF, 0x04, 0x9D, 0x11, 0x94]);
    }

    #[test]
    fn encode_temperature_boundaries() {
        assert_eq!(payload_u16(&encode_temperature(2700).unwrap()), Some(2700));
        assert_eq!(payload_u16(&encode_temperature(6500).unwrap()), Some(6500));
        assert!(encode_temperature(2699).is_err());
        assert!(encode_temperature(6501).is_err());
    }

    #[test]
    fn encode_temperature_is_exact_across_range() {
        for kelvin in (2700..=6500u16).step_by(50) {
            assert_eq!(payload_u16(&encode_temperature(kelvin).unwrap()), Some(kelvin));
        }
    }

    #[test]
    fn payload_u16_absent_on_power_report() {
        assert_eq!(payload_u16(&encode_power(true)), None);
    }
}
