//! Setpoint to spoof-code mapping.
//!
//! A normalised setpoint in `0.0..=1.0` is interpolated independently into each
//! channel's calibrated range and clamped there. Nothing a caller passes in can
//! produce a code outside the calibration, including NaN or infinities.

use core::fmt;

use crate::config::ActuatorConfig;
use crate::hardware::SpoofHardware;
use crate::protocol::ModuleKind;
use crate::sensor::{CalibrationRange, SENSOR_QUANTIZATION_DIVISOR, SensorReading};

/// Largest code accepted by the 12-bit DAC.
pub const DAC_MAX_CODE: u16 = 4095;

/// Sensor samples averaged before every spoof relay transition.
pub const DISCONTINUITY_SAMPLE_COUNT: u16 = 20;

/// DAC codes for both spoof channels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputCodes {
    pub a: u16,
    pub b: u16,
}

impl OutputCodes {
    #[must_use]
    pub const fn new(a: u16, b: u16) -> Self {
        Self { a, b }
    }
}

impl fmt::Display for OutputCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={} b={}", self.a, self.b)
    }
}

/// Maps `setpoint` into both calibrated ranges.
#[must_use]
pub fn map(setpoint: f32, range_a: CalibrationRange, range_b: CalibrationRange) -> OutputCodes {
    OutputCodes {
        a: interpolate(setpoint, range_a),
        b: interpolate(setpoint, range_b),
    }
}

/// Setpoint that [`map`] would turn into `code` on a channel calibrated to `range`.
///
/// Codes outside the range are clamped first; a zero-width range reads as `0.0`.
#[must_use]
pub fn setpoint_of(code: u16, range: CalibrationRange) -> f32 {
    let (low, high) = range.bounds();
    if high == low {
        return 0.0;
    }
    f32::from(range.clamp(code) - low) / f32::from(high - low)
}

fn interpolate(setpoint: f32, range: CalibrationRange) -> u16 {
    let fraction = if setpoint.is_nan() {
        0.0
    } else {
        setpoint.clamp(0.0, 1.0)
    };
    let (low, high) = range.bounds();
    let code = f32::from(low) + fraction * f32::from(high - low);

    // `code` is finite and within `low..=high` here.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = (code + 0.5) as u16;
    range.clamp(rounded)
}

/// Policy for a secondary output derived from the spoof codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecondaryOutputPolicy {
    /// The module has no secondary output.
    None,
    /// Active while either channel is above its threshold.
    ThresholdPair { threshold_a: u16, threshold_b: u16 },
}

impl SecondaryOutputPolicy {
    /// Derives the policy for `module` from its calibration.
    #[must_use]
    pub const fn for_module(module: ModuleKind, config: &ActuatorConfig) -> Self {
        if module.has_secondary_output() {
            Self::ThresholdPair {
                threshold_a: config.secondary_threshold_a,
                threshold_b: config.secondary_threshold_b,
            }
        } else {
            Self::None
        }
    }

    /// Returns the desired secondary output state, or `None` when the module
    /// has no secondary output.
    #[must_use]
    pub const fn evaluate(self, codes: OutputCodes) -> Option<bool> {
        match self {
            Self::None => None,
            Self::ThresholdPair {
                threshold_a,
                threshold_b,
            } => Some(codes.a > threshold_a || codes.b > threshold_b),
        }
    }

    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::ThresholdPair { .. })
    }
}

/// Averages `samples` sensor readings and seeds the DAC with the result so the
/// spoofed signal matches the real one at the moment the relay switches.
pub fn prevent_signal_discontinuity<H: SpoofHardware>(hardware: &mut H, samples: u16) -> OutputCodes {
    let samples = samples.max(1);
    let (mut sum_a, mut sum_b) = (0_u32, 0_u32);
    for _ in 0..samples {
        let SensorReading { a, b } = hardware.read_sensors();
        sum_a += u32::from(a);
        sum_b += u32::from(b);
    }

    let count = u32::from(samples);
    let codes = OutputCodes {
        a: scale_to_dac(sum_a / count),
        b: scale_to_dac(sum_b / count),
    };
    hardware.write_spoof(codes);
    codes
}

fn scale_to_dac(sample: u32) -> u16 {
    let code = sample.saturating_mul(u32::from(SENSOR_QUANTIZATION_DIVISOR));
    u16::try_from(code).map_or(DAC_MAX_CODE, |code| code.min(DAC_MAX_CODE))
}
