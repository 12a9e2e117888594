//! Per-actuator capability profiles.
//!
//! Brake, throttle and steering share one control core. What differs between
//! them is captured here: which CAN ids they own, how a command payload turns
//! into a normalised setpoint, and their default calibration (ranges, override
//! strategy, secondary output).

use core::fmt;

use crate::config::{ActuatorConfig, OverridePolicy};
use crate::protocol::command::STEERING_ANGLE_LIMIT;
use crate::protocol::{DecodeError, ModuleKind, PedalCommand, SteeringCommand};
use crate::sensor::CalibrationRange;
use crate::time::Ticks;

/// Capability set that specialises the control core for one actuator.
pub trait Actuator {
    /// Module identity on the bus.
    const MODULE: ModuleKind;

    /// Decoded command payload.
    type Command: Copy + fmt::Debug;

    /// Calibration written on first boot.
    fn defaults() -> ActuatorConfig;

    /// Decodes a command payload, magic prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for payloads that cannot be decoded.
    fn decode_command(payload: &[u8]) -> Result<Self::Command, DecodeError>;

    /// Turns the active command into a setpoint in `0.0..=1.0`.
    fn setpoint(&mut self, command: &Self::Command, now: Ticks) -> f32;

    /// Bytes echoed in the status report.
    fn command_echo(&self, command: Option<&Self::Command>) -> [u8; 3];

    /// Forgets any per-command state; called on every enable/disable transition.
    fn reset(&mut self) {}

    /// Starts per-command state from `baseline`, the setpoint equivalent of
    /// the sensor signal sampled when control was handed over.
    fn seed(&mut self, _baseline: f32) {}
}

/// Echoes a pedal fraction as per-mille.
fn pedal_echo(command: Option<&PedalCommand>) -> [u8; 3] {
    let per_mille = command.map_or(0, |command| {
        let scaled = command.fraction.clamp(0.0, 1.0) * 1000.0 + 0.5;
        // `scaled` lies in `0.5..=1000.5`.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = scaled as u16;
        rounded
    });
    let [low, high] = per_mille.to_le_bytes();
    [low, high, 0]
}

/// Brake pedal module with brake-light output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Brake;

impl Actuator for Brake {
    const MODULE: ModuleKind = ModuleKind::Brake;
    type Command = PedalCommand;

    fn defaults() -> ActuatorConfig {
        ActuatorConfig {
            spoof_a: CalibrationRange::new(229, 1135),
            spoof_b: CalibrationRange::new(499, 2359),
            override_threshold: 180,
            override_policy: OverridePolicy::ThresholdDebounce,
            override_hold_ms: 100,
            secondary_threshold_a: 300,
            secondary_threshold_b: 600,
            fault_check_frequency_hz: 5,
            report_publish_frequency_hz: 20,
        }
    }

    fn decode_command(payload: &[u8]) -> Result<PedalCommand, DecodeError> {
        PedalCommand::decode(payload)
    }

    fn setpoint(&mut self, command: &PedalCommand, _now: Ticks) -> f32 {
        command.fraction
    }

    fn command_echo(&self, command: Option<&PedalCommand>) -> [u8; 3] {
        pedal_echo(command)
    }
}

/// Accelerator pedal module.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Throttle;

impl Actuator for Throttle {
    const MODULE: ModuleKind = ModuleKind::Throttle;
    type Command = PedalCommand;

    fn defaults() -> ActuatorConfig {
        ActuatorConfig {
            spoof_a: CalibrationRange::new(250, 1850),
            spoof_b: CalibrationRange::new(550, 3475),
            override_threshold: 180,
            override_policy: OverridePolicy::ThresholdDebounce,
            override_hold_ms: 100,
            secondary_threshold_a: 0,
            secondary_threshold_b: 0,
            fault_check_frequency_hz: 5,
            report_publish_frequency_hz: 20,
        }
    }

    fn decode_command(payload: &[u8]) -> Result<PedalCommand, DecodeError> {
        PedalCommand::decode(payload)
    }

    fn setpoint(&mut self, command: &PedalCommand, _now: Ticks) -> f32 {
        command.fraction
    }

    fn command_echo(&self, command: Option<&PedalCommand>) -> [u8; 3] {
        pedal_echo(command)
    }
}

/// Steering torque module.
///
/// The applied wheel angle slews toward the commanded angle no faster than the
/// commanded rate and is mapped linearly from `-limit..=limit` onto the spoof
/// ranges. Slewing starts from the angle matching the sensor signal sampled at
/// enable, so the first output continues the driver's signal.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Steering {
    applied_angle: f32,
    last_update: Option<Ticks>,
}

impl Steering {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            applied_angle: 0.0,
            last_update: None,
        }
    }

    /// Angle currently being applied, in tenths of a degree.
    #[must_use]
    pub const fn applied_angle(&self) -> f32 {
        self.applied_angle
    }
}

impl Actuator for Steering {
    const MODULE: ModuleKind = ModuleKind::Steering;
    type Command = SteeringCommand;

    fn defaults() -> ActuatorConfig {
        ActuatorConfig {
            spoof_a: CalibrationRange::new(738, 3440),
            spoof_b: CalibrationRange::new(656, 3358),
            override_threshold: 400,
            override_policy: OverridePolicy::FilteredDiscrepancy,
            override_hold_ms: 0,
            secondary_threshold_a: 0,
            secondary_threshold_b: 0,
            fault_check_frequency_hz: 5,
            report_publish_frequency_hz: 20,
        }
    }

    fn decode_command(payload: &[u8]) -> Result<SteeringCommand, DecodeError> {
        SteeringCommand::decode(payload)
    }

    fn setpoint(&mut self, command: &SteeringCommand, now: Ticks) -> f32 {
        let elapsed_ms = self.last_update.map_or(0, |last| now.elapsed_since(last));
        self.last_update = Some(now);

        // Degrees per second to tenths of a degree per millisecond.
        #[allow(clippy::cast_precision_loss)]
        let max_step = f32::from(command.max_rate) * elapsed_ms as f32 / 100.0;
        let error = f32::from(command.angle) - self.applied_angle;
        self.applied_angle += error.clamp(-max_step, max_step);

        let limit = f32::from(STEERING_ANGLE_LIMIT);
        (self.applied_angle + limit) / (2.0 * limit)
    }

    fn command_echo(&self, _command: Option<&SteeringCommand>) -> [u8; 3] {
        #[allow(clippy::cast_possible_truncation)]
        let angle = self.applied_angle as i16;
        let [low, high] = angle.to_le_bytes();
        [low, high, 0]
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn seed(&mut self, baseline: f32) {
        let limit = f32::from(STEERING_ANGLE_LIMIT);
        self.applied_angle = (baseline.clamp(0.0, 1.0) * 2.0 - 1.0) * limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pedal_echo_is_per_mille() {
        assert_eq!(pedal_echo(Some(&PedalCommand::new(0.5))), [0xF4, 0x01, 0]);
        assert_eq!(pedal_echo(Some(&PedalCommand::new(3.0))), [0xE8, 0x03, 0]);
        assert_eq!(pedal_echo(None), [0, 0, 0]);
    }

    #[test]
    fn steering_starts_centred() {
        let mut steering = Steering::new();
        let command = SteeringCommand::new(4700, 100);

        let setpoint = steering.setpoint(&command, Ticks::from_millis(0));
        assert!((setpoint - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn steering_slews_at_commanded_rate() {
        let mut steering = Steering::new();
        let command = SteeringCommand::new(1000, 50);

        steering.setpoint(&command, Ticks::from_millis(0));
        steering.setpoint(&command, Ticks::from_millis(100));
        // 50 deg/s for 100 ms is 5 degrees.
        assert!((steering.applied_angle() - 50.0).abs() < 1e-3);

        steering.setpoint(&command, Ticks::from_millis(10_000));
        assert!((steering.applied_angle() - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn steering_slews_from_the_seeded_angle() {
        let mut steering = Steering::new();
        steering.seed(0.25);
        assert!((steering.applied_angle() + 2350.0).abs() < 1e-3);

        let command = SteeringCommand::new(0, 100);
        let setpoint = steering.setpoint(&command, Ticks::from_millis(0));
        assert!((setpoint - 0.25).abs() < 1e-6);
        steering.setpoint(&command, Ticks::from_millis(100));
        assert!((steering.applied_angle() + 2250.0).abs() < 1e-3);
    }

    #[test]
    fn steering_reset_returns_to_centre() {
        let mut steering = Steering::new();
        let command = SteeringCommand::new(-4700, 254);
        steering.setpoint(&command, Ticks::from_millis(0));
        steering.setpoint(&command, Ticks::from_millis(5_000));
        assert!(steering.applied_angle() < -4000.0);

        steering.reset();
        assert!(steering.applied_angle().abs() < f32::EPSILON);
    }
}
