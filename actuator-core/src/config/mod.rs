//! Calibration parameters and the persistent store contract.
//!
//! Calibration is a flat table of `u16` values keyed by [`ConfigId`]. A
//! reserved sentinel slot marks a seeded store: when it is missing, every
//! default is written before anything is loaded.

mod memory;

use core::fmt;

use crate::output::DAC_MAX_CODE;
use crate::sensor::CalibrationRange;

pub use memory::{ERASED_VALUE, MemoryConfigStore};

/// Value stored under [`ConfigId::StoreSentinel`] once defaults are written.
pub const STORE_SENTINEL: u16 = 0x0CC5;

/// Number of slots in the identifier space, sentinel included.
pub const CONFIG_SLOTS: usize = 12;

/// Fastest periodic tick a config write may request.
pub const MAX_TICK_FREQUENCY_HZ: u16 = 1000;

/// Identifier of one calibration value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConfigId {
    StoreSentinel = 0,
    SpoofARangeMin = 1,
    SpoofARangeMax = 2,
    SpoofBRangeMin = 3,
    SpoofBRangeMax = 4,
    OverrideThreshold = 5,
    OverridePolicy = 6,
    OverrideHoldMs = 7,
    SecondaryThresholdA = 8,
    SecondaryThresholdB = 9,
    FaultCheckFrequencyHz = 10,
    ReportPublishFrequencyHz = 11,
}

impl ConfigId {
    /// Every identifier, in slot order.
    pub const ALL: [Self; CONFIG_SLOTS] = [
        Self::StoreSentinel,
        Self::SpoofARangeMin,
        Self::SpoofARangeMax,
        Self::SpoofBRangeMin,
        Self::SpoofBRangeMax,
        Self::OverrideThreshold,
        Self::OverridePolicy,
        Self::OverrideHoldMs,
        Self::SecondaryThresholdA,
        Self::SecondaryThresholdB,
        Self::FaultCheckFrequencyHz,
        Self::ReportPublishFrequencyHz,
    ];

    /// Returns the identifier for a raw slot number.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if (raw as usize) < CONFIG_SLOTS {
            Some(Self::ALL[raw as usize])
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Slot index inside a store image.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for ids that hold calibration rather than bookkeeping.
    #[must_use]
    pub const fn is_calibration(self) -> bool {
        !matches!(self, Self::StoreSentinel)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StoreSentinel => "store-sentinel",
            Self::SpoofARangeMin => "spoof-a-min",
            Self::SpoofARangeMax => "spoof-a-max",
            Self::SpoofBRangeMin => "spoof-b-min",
            Self::SpoofBRangeMax => "spoof-b-max",
            Self::OverrideThreshold => "override-threshold",
            Self::OverridePolicy => "override-policy",
            Self::OverrideHoldMs => "override-hold-ms",
            Self::SecondaryThresholdA => "secondary-threshold-a",
            Self::SecondaryThresholdB => "secondary-threshold-b",
            Self::FaultCheckFrequencyHz => "fault-check-hz",
            Self::ReportPublishFrequencyHz => "report-hz",
        }
    }

    /// Looks an identifier up by its label, ignoring ASCII case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operator-override detection strategy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverridePolicy {
    /// Channel average held above a threshold for a hold duration.
    ThresholdDebounce,
    /// Filtered inter-channel discrepancy above a threshold.
    FilteredDiscrepancy,
}

impl OverridePolicy {
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::ThresholdDebounce),
            1 => Some(Self::FilteredDiscrepancy),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::ThresholdDebounce => 0,
            Self::FilteredDiscrepancy => 1,
        }
    }
}

/// Working calibration for one actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorConfig {
    pub spoof_a: CalibrationRange,
    pub spoof_b: CalibrationRange,
    /// Threshold compared by the active [`OverridePolicy`], in sensor counts.
    pub override_threshold: u16,
    pub override_policy: OverridePolicy,
    /// Hold duration for [`OverridePolicy::ThresholdDebounce`].
    pub override_hold_ms: u16,
    /// Per-channel DAC codes above which the secondary output activates.
    pub secondary_threshold_a: u16,
    pub secondary_threshold_b: u16,
    pub fault_check_frequency_hz: u16,
    pub report_publish_frequency_hz: u16,
}

impl ActuatorConfig {
    /// Returns the value stored under `id`.
    #[must_use]
    pub const fn get(&self, id: ConfigId) -> u16 {
        match id {
            ConfigId::StoreSentinel => STORE_SENTINEL,
            ConfigId::SpoofARangeMin => self.spoof_a.min,
            ConfigId::SpoofARangeMax => self.spoof_a.max,
            ConfigId::SpoofBRangeMin => self.spoof_b.min,
            ConfigId::SpoofBRangeMax => self.spoof_b.max,
            ConfigId::OverrideThreshold => self.override_threshold,
            ConfigId::OverridePolicy => self.override_policy.to_raw(),
            ConfigId::OverrideHoldMs => self.override_hold_ms,
            ConfigId::SecondaryThresholdA => self.secondary_threshold_a,
            ConfigId::SecondaryThresholdB => self.secondary_threshold_b,
            ConfigId::FaultCheckFrequencyHz => self.fault_check_frequency_hz,
            ConfigId::ReportPublishFrequencyHz => self.report_publish_frequency_hz,
        }
    }

    /// Validates and stores `value` under `id`.
    ///
    /// # Errors
    ///
    /// Rejects writes to the sentinel slot, DAC codes above 12 bits, unknown
    /// override policies and tick frequencies outside `1..=1000` Hz.
    pub fn set(&mut self, id: ConfigId, value: u16) -> Result<(), ConfigError> {
        let invalid = ConfigError::InvalidValue { id, value };
        match id {
            ConfigId::StoreSentinel => return Err(ConfigError::ReservedId),
            ConfigId::SpoofARangeMin
            | ConfigId::SpoofARangeMax
            | ConfigId::SpoofBRangeMin
            | ConfigId::SpoofBRangeMax
            | ConfigId::SecondaryThresholdA
            | ConfigId::SecondaryThresholdB
                if value > DAC_MAX_CODE =>
            {
                return Err(invalid);
            }
            ConfigId::FaultCheckFrequencyHz | ConfigId::ReportPublishFrequencyHz
                if value == 0 || value > MAX_TICK_FREQUENCY_HZ =>
            {
                return Err(invalid);
            }
            _ => {}
        }

        match id {
            ConfigId::StoreSentinel => {}
            ConfigId::SpoofARangeMin => self.spoof_a.min = value,
            ConfigId::SpoofARangeMax => self.spoof_a.max = value,
            ConfigId::SpoofBRangeMin => self.spoof_b.min = value,
            ConfigId::SpoofBRangeMax => self.spoof_b.max = value,
            ConfigId::OverrideThreshold => self.override_threshold = value,
            ConfigId::OverridePolicy => {
                self.override_policy = OverridePolicy::from_raw(value).ok_or(invalid)?;
            }
            ConfigId::OverrideHoldMs => self.override_hold_ms = value,
            ConfigId::SecondaryThresholdA => self.secondary_threshold_a = value,
            ConfigId::SecondaryThresholdB => self.secondary_threshold_b = value,
            ConfigId::FaultCheckFrequencyHz => self.fault_check_frequency_hz = value,
            ConfigId::ReportPublishFrequencyHz => self.report_publish_frequency_hz = value,
        }
        Ok(())
    }
}

/// Errors raised while applying or persisting configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError<E = core::convert::Infallible> {
    /// Wire identifier does not name a slot.
    UnknownId(u16),
    /// The sentinel slot cannot be written over the bus.
    ReservedId,
    /// Value is outside what the slot accepts.
    InvalidValue { id: ConfigId, value: u16 },
    /// The backing store failed.
    Store(E),
}

impl<E> ConfigError<E> {
    /// Lifts a validation error into a store-aware error.
    pub fn widen(error: ConfigError) -> Self {
        match error {
            ConfigError::UnknownId(raw) => Self::UnknownId(raw),
            ConfigError::ReservedId => Self::ReservedId,
            ConfigError::InvalidValue { id, value } => Self::InvalidValue { id, value },
            ConfigError::Store(never) => match never {},
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ConfigError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownId(raw) => write!(f, "unknown config id {raw:#06x}"),
            Self::ReservedId => f.write_str("config id is reserved"),
            Self::InvalidValue { id, value } => write!(f, "invalid value {value} for {id}"),
            Self::Store(err) => write!(f, "config store failure: {err:?}"),
        }
    }
}

/// Persistent `u16` key/value storage.
pub trait ConfigStore {
    /// Store-specific failure.
    type Error: Copy + fmt::Debug;

    /// Reads the value under `id`; erased slots read as [`ERASED_VALUE`].
    fn read(&self, id: ConfigId) -> u16;

    /// Persists `value` under `id`.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the value could not be made durable.
    fn write(&mut self, id: ConfigId, value: u16) -> Result<(), Self::Error>;

    /// Persists every `(id, value)` pair in order.
    ///
    /// Backends that rewrite a whole page per write override this to commit
    /// the batch at once.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; earlier pairs may already be durable.
    fn write_all(&mut self, values: &[(ConfigId, u16)]) -> Result<(), Self::Error> {
        for &(id, value) in values {
            self.write(id, value)?;
        }
        Ok(())
    }
}

/// How the working configuration was obtained at init.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigLoad {
    /// The sentinel was missing and every default was written.
    Seeded,
    /// Values were loaded; `fallbacks` slots held invalid data and kept defaults.
    Loaded { fallbacks: u8 },
}

/// Loads calibration from `store`, seeding defaults on first boot.
///
/// Calibration defaults go to the store as one batch and the sentinel is
/// written after it, so an interrupted seed is retried on the next boot.
///
/// # Errors
///
/// Returns [`ConfigError::Store`] when seeding fails to persist a value.
pub fn load_or_seed<S: ConfigStore>(
    store: &mut S,
    defaults: &ActuatorConfig,
) -> Result<(ActuatorConfig, ConfigLoad), ConfigError<S::Error>> {
    let seeded = store.read(ConfigId::StoreSentinel) != STORE_SENTINEL;
    if seeded {
        let values: heapless::Vec<(ConfigId, u16), CONFIG_SLOTS> = ConfigId::ALL
            .into_iter()
            .filter(|id| id.is_calibration())
            .map(|id| (id, defaults.get(id)))
            .collect();
        store.write_all(&values).map_err(ConfigError::Store)?;
        store
            .write(ConfigId::StoreSentinel, STORE_SENTINEL)
            .map_err(ConfigError::Store)?;
    }

    let mut config = *defaults;
    let mut fallbacks = 0_u8;
    for id in ConfigId::ALL.into_iter().filter(|id| id.is_calibration()) {
        if config.set(id, store.read(id)).is_err() {
            fallbacks = fallbacks.saturating_add(1);
        }
    }

    let outcome = if seeded {
        ConfigLoad::Seeded
    } else {
        ConfigLoad::Loaded { fallbacks }
    };
    Ok((config, outcome))
}
