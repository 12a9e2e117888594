#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Board peripherals behind the control core's hardware seams.
//!
//! Pin map (STM32G0B1):
//! - PA0 / PA1: sensor channels A and B (ADC1)
//! - PA5 / PA7 / PA4: MCP4922 SCK, MOSI and chip select (SPI1)
//! - PB0: spoof relay, high connects the DAC to the actuator harness
//! - PB1: brake-light relay (brake builds only)
//! - PA11 / PA12: FDCAN1 RX / TX

pub mod dac;
pub mod flash_store;

/// Right shift from the 12-bit ADC result to sensor resolution.
pub const ADC_TO_SENSOR_SHIFT: u16 = 2;

/// Scales a raw 12-bit conversion to the 10-bit sensor scale the calibration
/// ranges are expressed against.
#[must_use]
pub const fn sensor_sample(raw: u16) -> u16 {
    (raw & 0x0FFF) >> ADC_TO_SENSOR_SHIFT
}

#[cfg(target_os = "none")]
pub use board::BoardHardware;

#[cfg(target_os = "none")]
mod board {
    use actuator_core::hardware::SpoofHardware;
    use actuator_core::output::OutputCodes;
    use actuator_core::sensor::SensorReading;
    use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
    use embassy_stm32::gpio::Output;
    use embassy_stm32::peripherals::ADC1;

    use super::dac::Mcp4922;
    use super::sensor_sample;

    pub struct BoardHardware {
        adc: Adc<'static, ADC1>,
        sensor_a: AnyAdcChannel<ADC1>,
        sensor_b: AnyAdcChannel<ADC1>,
        dac: Mcp4922<'static>,
        spoof_relay: Output<'static>,
        secondary: Option<Output<'static>>,
    }

    impl BoardHardware {
        pub fn new(
            mut adc: Adc<'static, ADC1>,
            sensor_a: AnyAdcChannel<ADC1>,
            sensor_b: AnyAdcChannel<ADC1>,
            dac: Mcp4922<'static>,
            spoof_relay: Output<'static>,
            secondary: Option<Output<'static>>,
        ) -> Self {
            adc.set_sample_time(SampleTime::CYCLES39_5);
            Self {
                adc,
                sensor_a,
                sensor_b,
                dac,
                spoof_relay,
                secondary,
            }
        }
    }

    impl SpoofHardware for BoardHardware {
        fn read_sensors(&mut self) -> SensorReading {
            let a = self.adc.blocking_read(&mut self.sensor_a);
            let b = self.adc.blocking_read(&mut self.sensor_b);
            SensorReading::new(sensor_sample(a), sensor_sample(b))
        }

        fn write_spoof(&mut self, codes: OutputCodes) {
            self.dac.output(codes);
        }

        fn set_spoof_enabled(&mut self, energized: bool) {
            if energized {
                self.spoof_relay.set_high();
            } else {
                self.spoof_relay.set_low();
            }
        }

        fn set_secondary_output(&mut self, active: bool) {
            if let Some(output) = self.secondary.as_mut() {
                if active {
                    output.set_high();
                } else {
                    output.set_low();
                }
            }
        }
    }
}
