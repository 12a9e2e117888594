//! Module-specific command payloads.

use super::{CanFrame, DecodeError, ModuleKind, prefixed, require_len};

/// Pedal position request for the brake and throttle modules.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PedalCommand {
    /// Requested pedal travel; nominally `0.0..=1.0`, clamped when mapped.
    pub fraction: f32,
}

impl PedalCommand {
    /// Minimum payload length: prefix plus an `f32`.
    pub const LEN: u8 = 6;

    #[must_use]
    pub const fn new(fraction: f32) -> Self {
        Self { fraction }
    }

    /// Encodes the command for `module`.
    #[must_use]
    pub fn encode(&self, module: ModuleKind) -> CanFrame {
        let mut data = prefixed();
        data[2..6].copy_from_slice(&self.fraction.to_le_bytes());
        CanFrame::full(module.ids().command, data)
    }

    /// Decodes a pedal command payload, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for short payloads or a NaN/infinite request.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, Self::LEN)?;
        let fraction = f32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        if !fraction.is_finite() {
            return Err(DecodeError::NonFinite);
        }
        Ok(Self { fraction })
    }
}

/// Largest steering wheel angle accepted, in tenths of a degree.
pub const STEERING_ANGLE_LIMIT: i16 = 4700;
/// Slowest accepted wheel rate in degrees per second.
pub const STEERING_RATE_MIN: u16 = 20;
/// Fastest accepted wheel rate in degrees per second.
pub const STEERING_RATE_MAX: u16 = 254;

/// Steering wheel angle request with a slew-rate bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SteeringCommand {
    /// Target wheel angle in tenths of a degree, positive to the left.
    pub angle: i16,
    /// Maximum wheel rate in degrees per second.
    pub max_rate: u16,
}

impl SteeringCommand {
    /// Minimum payload length: prefix, `i16` angle and `u16` rate.
    pub const LEN: u8 = 6;

    /// Builds a command, clamping both fields to their accepted ranges.
    #[must_use]
    pub fn new(angle: i16, max_rate: u16) -> Self {
        Self {
            angle: angle.clamp(-STEERING_ANGLE_LIMIT, STEERING_ANGLE_LIMIT),
            max_rate: max_rate.clamp(STEERING_RATE_MIN, STEERING_RATE_MAX),
        }
    }

    #[must_use]
    pub fn encode(&self) -> CanFrame {
        let mut data = prefixed();
        data[2..4].copy_from_slice(&self.angle.to_le_bytes());
        data[4..6].copy_from_slice(&self.max_rate.to_le_bytes());
        CanFrame::full(ModuleKind::Steering.ids().command, data)
    }

    /// Decodes a steering command payload, clamping out-of-range fields.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when the payload is too short.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, Self::LEN)?;
        let angle = i16::from_le_bytes([payload[2], payload[3]]);
        let max_rate = u16::from_le_bytes([payload[4], payload[5]]);
        Ok(Self::new(angle, max_rate))
    }
}
