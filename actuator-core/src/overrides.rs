//! Operator-override detection.
//!
//! Two interchangeable strategies decide whether the driver is physically
//! operating the pedal or wheel. Which one runs is a calibration choice, see
//! [`OverridePolicy`].

use crate::config::{ActuatorConfig, OverridePolicy};
use crate::sensor::SensorReading;
use crate::time::Ticks;

/// Smoothing factor of the discrepancy filter.
pub const DISCREPANCY_FILTER_ALPHA: f32 = 0.01;

/// Average of both channels held at or above a threshold for a hold duration.
///
/// A reading below the threshold drops the hold timer immediately.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThresholdDebounce {
    threshold: u16,
    hold_ms: u32,
    above_since: Option<Ticks>,
}

impl ThresholdDebounce {
    #[must_use]
    pub const fn new(threshold: u16, hold_ms: u32) -> Self {
        Self {
            threshold,
            hold_ms,
            above_since: None,
        }
    }

    pub fn check(&mut self, reading: SensorReading, now: Ticks) -> bool {
        if reading.average() < self.threshold {
            self.above_since = None;
            return false;
        }

        let since = *self.above_since.get_or_insert(now);
        now.elapsed_since(since) >= self.hold_ms
    }

    /// Returns the tick at which the current above-threshold run started.
    #[must_use]
    pub const fn above_since(&self) -> Option<Ticks> {
        self.above_since
    }

    /// Forgets any above-threshold run in progress.
    pub fn reset(&mut self) {
        self.above_since = None;
    }
}

/// Exponential moving average of the inter-channel discrepancy.
///
/// The first sample after a reset seeds the filter directly so a large
/// discrepancy present at enable time is seen at once.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilteredDiscrepancy {
    threshold: u16,
    filtered: f32,
    seeded: bool,
}

impl FilteredDiscrepancy {
    #[must_use]
    pub const fn new(threshold: u16) -> Self {
        Self {
            threshold,
            filtered: 0.0,
            seeded: false,
        }
    }

    pub fn check(&mut self, reading: SensorReading) -> bool {
        let discrepancy = f32::from(reading.discrepancy());
        self.filtered = if self.seeded {
            DISCREPANCY_FILTER_ALPHA * discrepancy + (1.0 - DISCREPANCY_FILTER_ALPHA) * self.filtered
        } else {
            discrepancy
        };
        self.seeded = true;
        self.filtered > f32::from(self.threshold)
    }

    /// Current filter output.
    #[must_use]
    pub const fn filtered(&self) -> f32 {
        self.filtered
    }

    pub fn reset(&mut self) {
        self.filtered = 0.0;
        self.seeded = false;
    }
}

/// Configured override detector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OverrideStrategy {
    ThresholdDebounce(ThresholdDebounce),
    FilteredDiscrepancy(FilteredDiscrepancy),
}

impl OverrideStrategy {
    /// Builds the strategy selected by `config`.
    #[must_use]
    pub fn from_config(config: &ActuatorConfig) -> Self {
        match config.override_policy {
            OverridePolicy::ThresholdDebounce => Self::ThresholdDebounce(ThresholdDebounce::new(
                config.override_threshold,
                u32::from(config.override_hold_ms),
            )),
            OverridePolicy::FilteredDiscrepancy => {
                Self::FilteredDiscrepancy(FilteredDiscrepancy::new(config.override_threshold))
            }
        }
    }

    /// Applies new calibration, keeping detector state when the policy is
    /// unchanged.
    pub fn reconfigure(&mut self, config: &ActuatorConfig) {
        match (self, config.override_policy) {
            (Self::ThresholdDebounce(detector), OverridePolicy::ThresholdDebounce) => {
                detector.threshold = config.override_threshold;
                detector.hold_ms = u32::from(config.override_hold_ms);
            }
            (Self::FilteredDiscrepancy(detector), OverridePolicy::FilteredDiscrepancy) => {
                detector.threshold = config.override_threshold;
            }
            (strategy, _) => *strategy = Self::from_config(config),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> OverridePolicy {
        match self {
            Self::ThresholdDebounce(_) => OverridePolicy::ThresholdDebounce,
            Self::FilteredDiscrepancy(_) => OverridePolicy::FilteredDiscrepancy,
        }
    }

    /// Returns `true` when the driver is operating the control right now.
    pub fn check(&mut self, reading: SensorReading, now: Ticks) -> bool {
        match self {
            Self::ThresholdDebounce(detector) => detector.check(reading, now),
            Self::FilteredDiscrepancy(detector) => detector.check(reading),
        }
    }

    /// Called whenever control transitions to enabled.
    ///
    /// Sensors are not sampled while disabled without an override, so a hold
    /// timer started before the disable cannot count toward a new press.
    pub fn on_enable(&mut self) {
        if let Self::ThresholdDebounce(detector) = self {
            detector.reset();
        }
    }

    /// Called whenever control transitions to disabled.
    ///
    /// The hold timer survives so a press that caused the disable keeps the
    /// override latched until the pedal is released.
    pub fn on_disable(&mut self) {
        if let Self::FilteredDiscrepancy(detector) = self {
            detector.reset();
        }
    }
}
