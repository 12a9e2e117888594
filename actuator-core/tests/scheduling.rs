mod common;

use actuator_core::actuator::Throttle;
use actuator_core::config::ConfigId;
use actuator_core::control::{FrameDisposition, FrameKind};
use actuator_core::fault::FaultBits;
use actuator_core::protocol::{ConfigWrite, ModuleKind, PedalCommand, encode_enable};
use actuator_core::scheduler::{CONTROL_PERIOD_MS, Scheduler};
use actuator_core::sensor::SensorReading;
use actuator_core::sync::Shared;

use common::{BusQueue, build, drain_outbound, ms};

const IDLE: SensorReading = SensorReading::new(100, 200);

fn report_id() -> u16 {
    ModuleKind::Throttle.ids().report
}

#[test]
fn reports_follow_the_configured_rate() {
    let core = Shared::new(build(Throttle, IDLE));
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut bus = BusQueue::default();

    let mut reports = 0;
    for step in 0..=20 {
        let now = ms(step * CONTROL_PERIOD_MS);
        scheduler.run_once(&core, &mut bus, now);
        reports += core
            .with(|core| drain_outbound(core))
            .iter()
            .filter(|frame| frame.id() == report_id())
            .count();
    }

    // 20 Hz over 200 ms, first tick included.
    assert_eq!(reports, 5);
}

#[test]
fn report_rate_change_applies_without_restart() {
    let core = Shared::new(build(Throttle, IDLE));
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut bus = BusQueue::default();
    bus.push(
        ConfigWrite {
            raw_id: ModuleKind::Throttle.config_base() + ConfigId::ReportPublishFrequencyHz.as_raw(),
            value: 10,
        }
        .encode(),
    );

    let (disposition, _) = scheduler.run_once(&core, &mut bus, ms(0));
    assert_eq!(disposition, Some(FrameDisposition::Handled(FrameKind::ConfigWrite)));
    assert_eq!(scheduler.report_period_ms(), 100);
}

#[test]
fn enabled_loop_stays_enabled_while_commands_flow() {
    let core = Shared::new(build(Throttle, IDLE));
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut bus = BusQueue::default();
    bus.push(encode_enable(ModuleKind::Throttle));

    for step in 0..100 {
        let now = ms(step * CONTROL_PERIOD_MS);
        if step % 5 == 1 {
            bus.push(PedalCommand::new(0.3).encode(ModuleKind::Throttle));
        }
        scheduler.run_once(&core, &mut bus, now);
        core.with(|core| drain_outbound(core));
    }

    assert!(core.with(|core| core.state().enabled));
}

#[test]
fn silent_bus_times_out_through_the_watchdog() {
    let core = Shared::new(build(Throttle, IDLE));
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut bus = BusQueue::default();
    bus.push(encode_enable(ModuleKind::Throttle));

    let mut disabled_at = None;
    for step in 0..40 {
        let now = ms(step * CONTROL_PERIOD_MS);
        scheduler.run_once(&core, &mut bus, now);
        if disabled_at.is_none() && !core.with(|core| core.state().enabled) {
            disabled_at = Some(now.as_millis());
        }
    }

    // Watchdog runs every 50 ms; the first check past 200 ms is at 250 ms.
    assert_eq!(disabled_at, Some(250));
}

#[test]
fn sensor_fault_latches_on_the_fault_check_cadence() {
    let core = Shared::new(build(Throttle, IDLE));
    let mut scheduler = Scheduler::new(&core.with(|core| *core.config()));
    let mut bus = BusQueue::default();
    bus.push(encode_enable(ModuleKind::Throttle));

    let mut latched_at = None;
    for step in 0..100 {
        let now = ms(step * CONTROL_PERIOD_MS);
        if step == 1 {
            core.with(|core| core.hardware_mut().reading = SensorReading::new(0, 0));
        }
        if step % 5 == 1 {
            bus.push(PedalCommand::new(0.3).encode(ModuleKind::Throttle));
        }
        scheduler.run_once(&core, &mut bus, now);
        let faulted = core.with(|core| {
            core.state()
                .fault_bits
                .contains(FaultBits::INVALID_SENSOR_VALUE)
        });
        if latched_at.is_none() && faulted {
            latched_at = Some(now.as_millis());
        }
    }

    // Checks at 5 Hz: 0 ms is valid, then 200, 400, 600 and 800 ms are not.
    assert_eq!(latched_at, Some(800));
    assert!(!core.with(|core| core.state().enabled));
}
