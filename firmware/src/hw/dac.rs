//! MCP4922 dual 12-bit DAC driving the spoof signals.
//!
//! Each channel update is one 16-bit SPI word, most significant byte first:
//! bits 0-11 carry the code, bit 12 keeps the channel active, bit 13 selects
//! 1x gain, bit 14 leaves VREF unbuffered and bit 15 picks channel B.

use actuator_core::output::DAC_MAX_CODE;

const ACTIVE: u16 = 1 << 12;
const GAIN_1X: u16 = 1 << 13;
const CHANNEL_B: u16 = 1 << 15;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DacChannel {
    A,
    B,
}

/// Builds the SPI word that sets `channel` to `code`, saturating at 12 bits.
#[must_use]
pub const fn command_word(channel: DacChannel, code: u16) -> u16 {
    let code = if code > DAC_MAX_CODE { DAC_MAX_CODE } else { code };
    let select = match channel {
        DacChannel::A => 0,
        DacChannel::B => CHANNEL_B,
    };
    select | GAIN_1X | ACTIVE | code
}

#[cfg(target_os = "none")]
pub use driver::Mcp4922;

#[cfg(target_os = "none")]
mod driver {
    use actuator_core::output::OutputCodes;
    use embassy_stm32::gpio::Output;
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::spi::Spi;

    use super::{DacChannel, command_word};

    pub struct Mcp4922<'d> {
        spi: Spi<'d, Blocking>,
        cs: Output<'d>,
    }

    impl<'d> Mcp4922<'d> {
        pub fn new(spi: Spi<'d, Blocking>, mut cs: Output<'d>) -> Self {
            cs.set_high();
            Self { spi, cs }
        }

        pub fn output(&mut self, codes: OutputCodes) {
            self.write_channel(DacChannel::A, codes.a);
            self.write_channel(DacChannel::B, codes.b);
        }

        fn write_channel(&mut self, channel: DacChannel, code: u16) {
            let word = command_word(channel, code).to_be_bytes();
            self.cs.set_low();
            if self.spi.blocking_write(&word).is_err() {
                defmt::warn!("dac: SPI write failed channel={}", channel);
            }
            self.cs.set_high();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_a_word_keeps_control_bits() {
        assert_eq!(command_word(DacChannel::A, 0x0ABC), 0x3ABC);
    }

    #[test]
    fn channel_b_sets_the_select_bit() {
        assert_eq!(command_word(DacChannel::B, 0), 0xB000);
    }

    #[test]
    fn codes_above_twelve_bits_saturate() {
        assert_eq!(command_word(DacChannel::A, 0xFFFF), 0x3FFF);
    }
}
