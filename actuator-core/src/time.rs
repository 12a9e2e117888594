//! Monotonic millisecond ticks.
//!
//! The tick counter wraps, so ordering between two ticks is meaningless on its
//! own. Elapsed time is always computed as `now - earlier` with wrapping
//! arithmetic, which stays correct across a single wraparound.

use core::fmt;

/// Wrapping millisecond timestamp.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticks(u32);

impl Ticks {
    /// Tick value at boot.
    pub const ZERO: Self = Self(0);

    /// Creates a tick from a raw millisecond count.
    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond count.
    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, correct across wraparound.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Ticks) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Returns a tick `millis` later, wrapping at `u32::MAX`.
    #[must_use]
    pub const fn wrapping_add_millis(self, millis: u32) -> Self {
        Self(self.0.wrapping_add(millis))
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_wraparound() {
        let before = Ticks::from_millis(u32::MAX - 9);
        let after = before.wrapping_add_millis(25);

        assert_eq!(after.as_millis(), 15);
        assert_eq!(after.elapsed_since(before), 25);
    }
}
