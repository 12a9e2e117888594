use actuator_core::actuator::Actuator;
use actuator_core::control::ControlCore;
use actuator_core::protocol::CanFrame;
use actuator_core::sync::Shared;
use actuator_core::time::Ticks;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::can;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use static_cell::StaticCell;

use crate::actuator::{FirmwareCore, Selected};
use crate::hw::BoardHardware;
use crate::hw::dac::Mcp4922;
use crate::hw::flash_store::{InternalFlash, PageConfigStore};

mod can_task;
mod control_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

embassy_stm32::bind_interrupts!(struct CanIrqs {
    TIM16_FDCAN_IT0 => can::IT0InterruptHandler<hal::peripherals::FDCAN1>;
    TIM17_FDCAN_IT1 => can::IT1InterruptHandler<hal::peripherals::FDCAN1>;
});

/// Outbound frames waiting for the CAN transmitter.
pub const TX_QUEUE_DEPTH: usize = 8;

pub(super) type TxQueue = Channel<CriticalSectionRawMutex, CanFrame, TX_QUEUE_DEPTH>;

const CAN_BITRATE: u32 = 500_000;
const DAC_SPI_FREQUENCY: Hertz = Hertz(1_000_000);
const WATCHDOG_TIMEOUT_US: u32 = 250_000;

pub(super) static TX_QUEUE: TxQueue = Channel::new();
static CORE: StaticCell<Shared<FirmwareCore>> = StaticCell::new();

/// Milliseconds since boot on the core's wrapping tick.
pub(super) fn now() -> Ticks {
    // Truncation is the wraparound the tick type is built for.
    #[allow(clippy::cast_possible_truncation)]
    let millis = Instant::now().as_millis() as u32;
    Ticks::from_millis(millis)
}

/// Moves every queued outbound frame to the transmitter.
pub(super) fn forward_outbound(core: &mut FirmwareCore) {
    while let Some(frame) = core.pop_outbound() {
        if !crate::outbound::enqueue(&TX_QUEUE, frame) {
            defmt::warn!("can: tx queue full, dropped id={=u16:#x}", frame.id());
        }
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(hal::Config::default());

    let mut watchdog = IndependentWatchdog::new(p.IWDG, WATCHDOG_TIMEOUT_US);
    watchdog.unleash();

    let mut spi_config = spi::Config::default();
    spi_config.frequency = DAC_SPI_FREQUENCY;
    let dac = Mcp4922::new(
        Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PA7, spi_config),
        Output::new(p.PA4, Level::High, Speed::VeryHigh),
    );
    let secondary = <Selected as Actuator>::MODULE
        .has_secondary_output()
        .then(|| Output::new(p.PB1, Level::Low, Speed::Low));
    let hardware = BoardHardware::new(
        Adc::new(p.ADC1),
        p.PA0.degrade_adc(),
        p.PA1.degrade_adc(),
        dac,
        Output::new(p.PB0, Level::Low, Speed::Low),
        secondary,
    );
    let store = PageConfigStore::open(InternalFlash::new(Flash::new_blocking(p.FLASH)));

    let core = match ControlCore::new(Selected::default(), hardware, store, now()) {
        Ok(core) => core,
        Err(err) => {
            defmt::error!("config: seeding failed: {}", err);
            panic!("config store unusable");
        }
    };
    defmt::info!(
        "control: {} actuator ready {}",
        <Selected as Actuator>::MODULE,
        core.config()
    );
    let core: &'static Shared<FirmwareCore> = CORE.init(Shared::new(core));

    let mut can_configurator = can::CanConfigurator::new(p.FDCAN1, p.PA11, p.PA12, CanIrqs);
    can_configurator.properties().set_standard_filter(
        can::filter::StandardFilterSlot::_0,
        can::filter::StandardFilter::accept_all_into_fifo0(),
    );
    can_configurator.set_bitrate(CAN_BITRATE);
    let (tx, rx, _properties) = can_configurator
        .start(can::OperatingMode::NormalOperationMode)
        .split();

    spawner
        .spawn(can_task::receive(rx, core))
        .expect("failed to spawn CAN receive task");
    spawner
        .spawn(can_task::transmit(tx, &TX_QUEUE))
        .expect("failed to spawn CAN transmit task");
    spawner
        .spawn(control_task::run(core, watchdog))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
