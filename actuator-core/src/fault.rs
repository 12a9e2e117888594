//! Diagnostic trouble codes and fault-report origins.

use core::fmt;

/// Latched diagnostic trouble code bits reported on the bus.
///
/// Bits are independent: each one is set when its condition is detected and
/// stays set until that condition resolves.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultBits(u8);

impl FaultBits {
    /// The redundant sensor pair produced out-of-range values.
    pub const INVALID_SENSOR_VALUE: Self = Self(1 << 0);
    /// The driver is physically operating the pedal or wheel.
    pub const OPERATOR_OVERRIDE: Self = Self(1 << 1);

    /// No faults latched.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wraps a raw bitfield as received on the bus.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bitfield.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when every bit in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn clear(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl fmt::Display for FaultBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Module that published a fault report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultOrigin {
    Brake,
    Steering,
    Throttle,
    /// Origin identifier this build does not know about.
    Other(u32),
}

impl FaultOrigin {
    /// Decodes the wire identifier.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Brake,
            1 => Self::Steering,
            2 => Self::Throttle,
            other => Self::Other(other),
        }
    }

    /// Returns the wire identifier.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Brake => 0,
            Self::Steering => 1,
            Self::Throttle => 2,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brake => f.write_str("brake"),
            Self::Steering => f.write_str("steering"),
            Self::Throttle => f.write_str("throttle"),
            Self::Other(raw) => write!(f, "origin#{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_set_and_clear_independently() {
        let mut bits = FaultBits::empty();
        bits.set(FaultBits::INVALID_SENSOR_VALUE);
        bits.set(FaultBits::OPERATOR_OVERRIDE);
        assert_eq!(bits.bits(), 0b11);

        bits.clear(FaultBits::INVALID_SENSOR_VALUE);
        assert!(!bits.contains(FaultBits::INVALID_SENSOR_VALUE));
        assert!(bits.contains(FaultBits::OPERATOR_OVERRIDE));

        bits.clear(FaultBits::OPERATOR_OVERRIDE);
        assert!(bits.is_empty());
    }

    #[test]
    fn unknown_origin_survives_round_trip() {
        for raw in [0, 1, 2, 7, u32::MAX] {
            assert_eq!(FaultOrigin::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(FaultOrigin::from_raw(2), FaultOrigin::Throttle);
    }
}
