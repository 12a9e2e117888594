mod common;

use actuator_core::actuator::{Steering, Throttle};
use actuator_core::config::OverridePolicy;
use actuator_core::fault::{FaultBits, FaultOrigin};
use actuator_core::protocol::{FAULT_REPORT_CAN_ID, FaultReport};
use actuator_core::sensor::SensorReading;
use actuator_core::telemetry::{ControlEvent, DisableReason};

use common::{Op, build, count_events, drain_outbound, ms};

const RELEASED: SensorReading = SensorReading::new(100, 200);
const PRESSED: SensorReading = SensorReading::new(300, 300);

#[test]
fn pedal_held_past_debounce_disables_and_reports() {
    let mut core = build(Throttle, RELEASED);
    core.enable(ms(0));
    core.hardware_mut().reading = PRESSED;

    core.update(ms(10));
    core.update(ms(100));
    assert!(core.state().enabled, "hold of 90 ms is below the debounce");

    core.update(ms(110));

    let state = core.state();
    assert!(!state.enabled);
    assert!(state.operator_override);
    assert!(state.fault_bits.contains(FaultBits::OPERATOR_OVERRIDE));

    let frames = drain_outbound(&mut core);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].id(), FAULT_REPORT_CAN_ID);
    let report = FaultReport::decode(frames[0].payload()).expect("fault report decodes");
    assert_eq!(report.origin, FaultOrigin::Throttle);
    assert!(report.fault_bits.contains(FaultBits::OPERATOR_OVERRIDE));
}

#[test]
fn brief_press_is_ignored() {
    let mut core = build(Throttle, RELEASED);
    core.enable(ms(0));

    for step in 1..=40 {
        core.hardware_mut().reading = if step % 5 == 0 { RELEASED } else { PRESSED };
        core.update(ms(step * 30));
    }

    assert!(core.state().enabled);
    assert!(!core.state().operator_override);
}

#[test]
fn enable_is_refused_until_the_driver_lets_go() {
    let mut core = build(Throttle, RELEASED);
    core.enable(ms(0));
    core.hardware_mut().reading = PRESSED;
    core.update(ms(10));
    core.update(ms(120));
    assert!(core.state().operator_override);

    assert!(!core.enable(ms(130)));
    core.update(ms(140));
    assert!(core.state().operator_override, "override persists while pressed");

    core.hardware_mut().reading = RELEASED;
    core.update(ms(150));
    assert!(!core.state().operator_override);
    assert!(core.state().fault_bits.is_empty());
    assert!(!core.state().enabled, "release never re-enables control");

    assert!(core.enable(ms(160)));
    assert_eq!(
        count_events(&core, |event| *event == ControlEvent::OverrideCleared),
        1
    );
}

#[test]
fn override_is_reported_once_per_press() {
    let mut core = build(Throttle, RELEASED);
    core.enable(ms(0));
    core.hardware_mut().reading = PRESSED;

    for step in 1..=30 {
        core.update(ms(step * 10));
    }

    assert_eq!(drain_outbound(&mut core).len(), 1);
    assert_eq!(
        count_events(&core, |event| *event
            == ControlEvent::Disabled(DisableReason::OperatorOverride)),
        1
    );
}

#[test]
fn re_enabled_pedal_needs_a_full_hold() {
    let mut core = build(Throttle, RELEASED);
    core.enable(ms(0));
    core.hardware_mut().reading = PRESSED;
    core.update(ms(10));
    core.disable(DisableReason::Command, ms(20));

    core.enable(ms(10_000));
    core.update(ms(10_010));
    assert!(core.state().enabled, "stale hold timer must not count");
    assert!(!core.state().operator_override);

    core.update(ms(10_100));
    assert!(core.state().enabled);
    core.update(ms(10_110));
    assert!(!core.state().enabled);
    assert!(core.state().operator_override);
}

#[test]
fn pressing_while_disabled_is_not_sampled() {
    let mut core = build(Throttle, PRESSED);
    core.hardware_mut().ops.clear();

    for step in 0..20 {
        core.update(ms(step * 10));
    }

    assert!(!core.hardware().ops.contains(&Op::Read));
    assert!(!core.state().operator_override);
}

#[test]
fn steering_trips_on_sustained_channel_disagreement() {
    let aligned = SensorReading::new(500, 480);
    let mut core = build(Steering::new(), aligned);
    assert_eq!(core.detector().policy(), OverridePolicy::FilteredDiscrepancy);
    core.enable(ms(0));
    core.update(ms(10));

    core.hardware_mut().reading = SensorReading::new(1000, 0);
    let mut tripped_after = None;
    for sample in 1..=200_u32 {
        core.update(ms(10 + sample * 10));
        if !core.state().enabled {
            tripped_after = Some(sample);
            break;
        }
    }

    assert!(
        matches!(tripped_after, Some(samples) if samples > 40 && samples < 60),
        "filter should need about fifty samples, took {tripped_after:?}"
    );
    assert!(core.state().operator_override);
}

#[test]
fn steering_filter_restarts_after_disable() {
    let aligned = SensorReading::new(500, 480);
    let mut core = build(Steering::new(), aligned);
    core.enable(ms(0));
    core.update(ms(5));
    core.hardware_mut().reading = SensorReading::new(1000, 0);
    for step in 1..=30 {
        core.update(ms(step * 10));
    }
    assert!(core.state().enabled);

    core.disable(DisableReason::Command, ms(400));
    core.hardware_mut().reading = aligned;
    core.enable(ms(410));
    core.update(ms(420));

    match core.detector() {
        actuator_core::overrides::OverrideStrategy::FilteredDiscrepancy(filter) => {
            assert!((filter.filtered() - 20.0).abs() < f32::EPSILON);
        }
        other => panic!("unexpected strategy: {other:?}"),
    }
}
