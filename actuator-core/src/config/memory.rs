use core::convert::Infallible;

use super::{CONFIG_SLOTS, ConfigId, ConfigStore};

/// Value read back from a slot that was never written.
pub const ERASED_VALUE: u16 = 0xFFFF;

/// RAM-backed store used by the emulator and host tests.
///
/// Cloning the store models a restart with the backing storage intact.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryConfigStore {
    slots: [u16; CONFIG_SLOTS],
    writes: usize,
}

impl MemoryConfigStore {
    /// Creates a store with every slot erased.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [ERASED_VALUE; CONFIG_SLOTS],
            writes: 0,
        }
    }

    /// Creates a store from a raw slot image.
    #[must_use]
    pub const fn from_slots(slots: [u16; CONFIG_SLOTS]) -> Self {
        Self { slots, writes: 0 }
    }

    /// Returns the raw slot image.
    #[must_use]
    pub const fn slots(&self) -> &[u16; CONFIG_SLOTS] {
        &self.slots
    }

    /// Number of writes performed since construction.
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryConfigStore {
    type Error = Infallible;

    fn read(&self, id: ConfigId) -> u16 {
        self.slots[id.index()]
    }

    fn write(&mut self, id: ConfigId, value: u16) -> Result<(), Self::Error> {
        self.slots[id.index()] = value;
        self.writes += 1;
        Ok(())
    }
}
