//! Redundant sensor pair validation.
//!
//! Sensor faults are debounced by count: a run of [`SENSOR_FAULT_THRESHOLD`]
//! consecutive out-of-range readings latches the fault, while a single good
//! reading clears it again.

use core::fmt;

/// Ratio between calibration resolution (12-bit DAC codes) and sensor
/// resolution (10-bit ADC samples).
pub const SENSOR_QUANTIZATION_DIVISOR: u16 = 4;

/// Consecutive invalid readings required to latch a sensor fault.
pub const SENSOR_FAULT_THRESHOLD: u8 = 4;

/// Both channels of the redundant sensor, sampled together.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    pub a: u16,
    pub b: u16,
}

impl SensorReading {
    #[must_use]
    pub const fn new(a: u16, b: u16) -> Self {
        Self { a, b }
    }

    /// Mean of the two channels, rounded down.
    #[must_use]
    pub fn average(self) -> u16 {
        let sum = u32::from(self.a) + u32::from(self.b);
        u16::try_from(sum / 2).unwrap_or(u16::MAX)
    }

    /// Absolute difference between the channels.
    #[must_use]
    pub const fn discrepancy(self) -> u16 {
        self.a.abs_diff(self.b)
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={} b={}", self.a, self.b)
    }
}

/// Calibrated bounds for one spoof channel, in DAC codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRange {
    pub min: u16,
    pub max: u16,
}

impl CalibrationRange {
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Returns `(low, high)` even if a config write left `min > max`.
    #[must_use]
    pub const fn bounds(self) -> (u16, u16) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }

    /// Clamps `code` into the range.
    #[must_use]
    pub const fn clamp(self, code: u16) -> u16 {
        let (low, high) = self.bounds();
        if code < low {
            low
        } else if code > high {
            high
        } else {
            code
        }
    }

    /// Returns `true` when a raw sensor sample lies inside the range once the
    /// bounds are scaled down to sensor resolution.
    #[must_use]
    pub const fn accepts_sample(self, sample: u16) -> bool {
        let (low, high) = self.bounds();
        sample >= low / SENSOR_QUANTIZATION_DIVISOR && sample <= high / SENSOR_QUANTIZATION_DIVISOR
    }
}

/// Returns `true` when both channels of `reading` are inside their ranges.
#[must_use]
pub const fn validate(reading: SensorReading, range_a: CalibrationRange, range_b: CalibrationRange) -> bool {
    range_a.accepts_sample(reading.a) && range_b.accepts_sample(reading.b)
}

/// Result of feeding one reading into a [`SensorValidator`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationOutcome {
    /// Reading was in range; the consecutive count is back to zero.
    Valid,
    /// Reading was out of range but the threshold has not been reached yet.
    Invalid { consecutive: u8 },
    /// The threshold has been reached; the fault must be latched.
    Latched,
}

/// Consecutive-invalid counter for one sensor pair.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SensorValidator {
    consecutive_invalid: u8,
}

impl SensorValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            consecutive_invalid: 0,
        }
    }

    /// Validates `reading` and advances the debounce counter.
    pub fn check(
        &mut self,
        reading: SensorReading,
        range_a: CalibrationRange,
        range_b: CalibrationRange,
    ) -> ValidationOutcome {
        if validate(reading, range_a, range_b) {
            self.consecutive_invalid = 0;
            return ValidationOutcome::Valid;
        }

        self.consecutive_invalid = self.consecutive_invalid.saturating_add(1);
        if self.consecutive_invalid >= SENSOR_FAULT_THRESHOLD {
            ValidationOutcome::Latched
        } else {
            ValidationOutcome::Invalid {
                consecutive: self.consecutive_invalid,
            }
        }
    }

    #[must_use]
    pub const fn consecutive_invalid(&self) -> u8 {
        self.consecutive_invalid
    }
}
