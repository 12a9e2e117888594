use actuator_core::scheduler::{CONTROL_PERIOD_MS, Scheduler};
use actuator_core::sync::Shared;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Duration, Ticker};

use super::{forward_outbound, now};
use crate::actuator::FirmwareCore;
use crate::status;
use crate::telemetry::{self, TelemetryRecorder};

/// Ticks between status heartbeats.
const HEARTBEAT_EVERY_TICKS: u32 = 1000 / CONTROL_PERIOD_MS;

#[embassy_executor::task]
pub async fn run(core: &'static Shared<FirmwareCore>, mut watchdog: IndependentWatchdog<'static>) -> ! {
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut telemetry = TelemetryRecorder::new();
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(CONTROL_PERIOD_MS)));
    let mut ticks = 0_u32;

    defmt::info!(
        "control: scheduler started fault_check={}ms report={}ms",
        scheduler.fault_check_period_ms(),
        scheduler.report_period_ms()
    );

    loop {
        ticker.next().await;
        watchdog.pet();

        scheduler.service(core, now());

        core.with(|core| {
            forward_outbound(core);
            while let Some(record) = core.pop_event() {
                telemetry.forward(&record);
            }
            telemetry.observe_evictions(core.events().dropped());
            status::record_state(core.state());
        });

        ticks = ticks.wrapping_add(1);
        if ticks % HEARTBEAT_EVERY_TICKS == 0 {
            telemetry::log_heartbeat(&status::snapshot());
        }
    }
}
