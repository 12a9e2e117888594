//! Calibration store backed by one erasable flash page.
//!
//! The whole slot table is kept in RAM and every write rewrites the page with
//! the updated image. Batched writes share one rewrite. Erased flash reads back as `0xFF` bytes, which decodes to
//! [`ERASED_VALUE`] in every slot and triggers first-boot seeding.

use core::fmt;

use actuator_core::config::{CONFIG_SLOTS, ConfigId, ConfigStore, ERASED_VALUE};

/// Bytes occupied by the slot image, little endian `u16` per slot.
pub const CONFIG_IMAGE_BYTES: usize = CONFIG_SLOTS * 2;

/// Raw page access used by [`PageConfigStore`].
pub trait PageStorage {
    type Error: Copy + fmt::Debug;

    /// Reads the stored image.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the page cannot be read.
    fn read_image(&mut self, bytes: &mut [u8; CONFIG_IMAGE_BYTES]) -> Result<(), Self::Error>;

    /// Erases the page and programs `bytes`.
    ///
    /// # Errors
    ///
    /// Returns the backend error when erasing or programming fails.
    fn rewrite_image(&mut self, bytes: &[u8; CONFIG_IMAGE_BYTES]) -> Result<(), Self::Error>;
}

#[must_use]
pub fn encode_image(slots: &[u16; CONFIG_SLOTS]) -> [u8; CONFIG_IMAGE_BYTES] {
    let mut bytes = [0; CONFIG_IMAGE_BYTES];
    for (chunk, slot) in bytes.chunks_exact_mut(2).zip(slots) {
        chunk.copy_from_slice(&slot.to_le_bytes());
    }
    bytes
}

#[must_use]
pub fn decode_image(bytes: &[u8; CONFIG_IMAGE_BYTES]) -> [u16; CONFIG_SLOTS] {
    let mut slots = [ERASED_VALUE; CONFIG_SLOTS];
    for (slot, chunk) in slots.iter_mut().zip(bytes.chunks_exact(2)) {
        *slot = u16::from_le_bytes([chunk[0], chunk[1]]);
    }
    slots
}

/// [`ConfigStore`] over a [`PageStorage`] backend.
pub struct PageConfigStore<P> {
    page: P,
    image: [u16; CONFIG_SLOTS],
}

impl<P: PageStorage> PageConfigStore<P> {
    /// Loads the image from `page`; an unreadable page is treated as erased.
    pub fn open(mut page: P) -> Self {
        let mut bytes = [0xFF; CONFIG_IMAGE_BYTES];
        let image = match page.read_image(&mut bytes) {
            Ok(()) => decode_image(&bytes),
            Err(_) => [ERASED_VALUE; CONFIG_SLOTS],
        };
        Self { page, image }
    }

    pub fn into_page(self) -> P {
        self.page
    }
}

impl<P: PageStorage> ConfigStore for PageConfigStore<P> {
    type Error = P::Error;

    fn read(&self, id: ConfigId) -> u16 {
        self.image[id.index()]
    }

    fn write(&mut self, id: ConfigId, value: u16) -> Result<(), P::Error> {
        let slot = id.index();
        if self.image[slot] == value {
            return Ok(());
        }

        let previous = self.image[slot];
        self.image[slot] = value;
        if let Err(err) = self.page.rewrite_image(&encode_image(&self.image)) {
            self.image[slot] = previous;
            return Err(err);
        }
        Ok(())
    }

    fn write_all(&mut self, values: &[(ConfigId, u16)]) -> Result<(), P::Error> {
        let previous = self.image;
        for &(id, value) in values {
            self.image[id.index()] = value;
        }
        if self.image == previous {
            return Ok(());
        }

        if let Err(err) = self.page.rewrite_image(&encode_image(&self.image)) {
            self.image = previous;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(target_os = "none")]
pub use internal::{FlashStoreError, InternalFlash};

#[cfg(target_os = "none")]
mod internal {
    use embassy_stm32::flash::{Blocking, FLASH_SIZE, Flash};

    use super::{CONFIG_IMAGE_BYTES, PageStorage};

    /// Size of one erasable page on the STM32G0B1.
    const PAGE_SIZE: u32 = 2048;

    /// Offset of the last page, relative to the start of flash.
    #[allow(clippy::cast_possible_truncation)]
    const CONFIG_PAGE_OFFSET: u32 = FLASH_SIZE as u32 - PAGE_SIZE;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
    pub enum FlashStoreError {
        Read,
        Erase,
        Program,
    }

    /// Last page of the on-chip flash.
    pub struct InternalFlash {
        flash: Flash<'static, Blocking>,
    }

    impl InternalFlash {
        pub fn new(flash: Flash<'static, Blocking>) -> Self {
            Self { flash }
        }
    }

    impl PageStorage for InternalFlash {
        type Error = FlashStoreError;

        fn read_image(&mut self, bytes: &mut [u8; CONFIG_IMAGE_BYTES]) -> Result<(), FlashStoreError> {
            self.flash
                .blocking_read(CONFIG_PAGE_OFFSET, bytes)
                .map_err(|err| {
                    defmt::error!("config: flash read failed: {:?}", defmt::Debug2Format(&err));
                    FlashStoreError::Read
                })
        }

        fn rewrite_image(&mut self, bytes: &[u8; CONFIG_IMAGE_BYTES]) -> Result<(), FlashStoreError> {
            self.flash
                .blocking_erase(CONFIG_PAGE_OFFSET, CONFIG_PAGE_OFFSET + PAGE_SIZE)
                .map_err(|err| {
                    defmt::error!("config: flash erase failed: {:?}", defmt::Debug2Format(&err));
                    FlashStoreError::Erase
                })?;
            self.flash
                .blocking_write(CONFIG_PAGE_OFFSET, bytes)
                .map_err(|err| {
                    defmt::error!("config: flash program failed: {:?}", defmt::Debug2Format(&err));
                    FlashStoreError::Program
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use actuator_core::actuator::{Actuator, Brake};
    use actuator_core::config::{ConfigLoad, STORE_SENTINEL, load_or_seed};

    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct Worn;

    struct RamPage {
        bytes: [u8; CONFIG_IMAGE_BYTES],
        rewrites: usize,
        fail_rewrites: bool,
    }

    impl RamPage {
        fn erased() -> Self {
            Self {
                bytes: [0xFF; CONFIG_IMAGE_BYTES],
                rewrites: 0,
                fail_rewrites: false,
            }
        }
    }

    impl PageStorage for RamPage {
        type Error = Worn;

        fn read_image(&mut self, bytes: &mut [u8; CONFIG_IMAGE_BYTES]) -> Result<(), Worn> {
            *bytes = self.bytes;
            Ok(())
        }

        fn rewrite_image(&mut self, bytes: &[u8; CONFIG_IMAGE_BYTES]) -> Result<(), Worn> {
            if self.fail_rewrites {
                return Err(Worn);
            }
            self.bytes = *bytes;
            self.rewrites += 1;
            Ok(())
        }
    }

    #[test]
    fn erased_page_reads_as_erased_slots() {
        let store = PageConfigStore::open(RamPage::erased());
        for id in ConfigId::ALL {
            assert_eq!(store.read(id), ERASED_VALUE);
        }
    }

    #[test]
    fn writes_survive_reopening_the_page() {
        let mut store = PageConfigStore::open(RamPage::erased());
        store
            .write(ConfigId::OverrideThreshold, 0x0123)
            .expect("ram page accepts writes");

        let reopened = PageConfigStore::open(store.into_page());

        assert_eq!(reopened.read(ConfigId::OverrideThreshold), 0x0123);
        assert_eq!(reopened.read(ConfigId::SpoofARangeMin), ERASED_VALUE);
    }

    #[test]
    fn unchanged_value_skips_the_rewrite() {
        let mut store = PageConfigStore::open(RamPage::erased());
        store.write(ConfigId::OverrideHoldMs, 100).expect("write");
        store.write(ConfigId::OverrideHoldMs, 100).expect("write");

        assert_eq!(store.into_page().rewrites, 1);
    }

    #[test]
    fn failed_rewrite_keeps_the_previous_value() {
        let mut page = RamPage::erased();
        page.fail_rewrites = true;
        let mut store = PageConfigStore::open(page);

        assert_eq!(store.write(ConfigId::SpoofBRangeMax, 3000), Err(Worn));
        assert_eq!(store.read(ConfigId::SpoofBRangeMax), ERASED_VALUE);
    }

    #[test]
    fn first_boot_seeding_batches_the_calibration() {
        let mut store = PageConfigStore::open(RamPage::erased());

        let (config, load) = load_or_seed(&mut store, &Brake::defaults()).expect("seed succeeds");

        assert_eq!(load, ConfigLoad::Seeded);
        assert_eq!(config, Brake::defaults());
        assert_eq!(store.read(ConfigId::StoreSentinel), STORE_SENTINEL);
        assert_eq!(store.into_page().rewrites, 2, "calibration batch, then sentinel");
    }

    #[test]
    fn failed_batch_restores_the_whole_image() {
        let mut store = PageConfigStore::open(RamPage::erased());
        store.write(ConfigId::OverrideHoldMs, 100).expect("write");
        store.page.fail_rewrites = true;

        let batch = [(ConfigId::OverrideHoldMs, 250), (ConfigId::OverrideThreshold, 90)];
        assert_eq!(store.write_all(&batch), Err(Worn));

        assert_eq!(store.read(ConfigId::OverrideHoldMs), 100);
        assert_eq!(store.read(ConfigId::OverrideThreshold), ERASED_VALUE);
    }

    #[test]
    fn image_layout_is_little_endian_slot_order() {
        let mut slots = [0; CONFIG_SLOTS];
        slots[0] = 0x0CC5;
        slots[11] = 0xBEEF;

        let bytes = encode_image(&slots);

        assert_eq!(&bytes[..2], &[0xC5, 0x0C]);
        assert_eq!(&bytes[22..], &[0xEF, 0xBE]);
        assert_eq!(decode_image(&bytes), slots);
    }
}
