//! Cooperative periodic task schedule for one actuator.
//!
//! The firmware calls [`Scheduler::service`] from a fixed-rate ticker and the
//! emulator calls it from its simulated clock. Each due task takes the shared
//! core lock on its own, so frame reception is never blocked for longer than
//! one task body.

use crate::actuator::Actuator;
use crate::config::{ActuatorConfig, ConfigStore};
use crate::control::{ControlCore, FrameDisposition, WATCHDOG_CHECK_PERIOD_MS};
use crate::hardware::SpoofHardware;
use crate::protocol::CanFrame;
use crate::sync::Shared;
use crate::time::Ticks;

/// Period of the override check and output refresh.
pub const CONTROL_PERIOD_MS: u32 = 10;

/// Fixed-period timer polled against a monotonic tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Periodic {
    period_ms: u32,
    last: Option<Ticks>,
}

impl Periodic {
    #[must_use]
    pub const fn every_ms(period_ms: u32) -> Self {
        Self {
            period_ms: if period_ms == 0 { 1 } else { period_ms },
            last: None,
        }
    }

    /// Timer firing `hz` times per second, rounded down to whole milliseconds.
    #[must_use]
    pub fn from_hz(hz: u16) -> Self {
        Self::every_ms(period_for_hz(hz))
    }

    #[must_use]
    pub const fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Changes the rate without restarting the current period.
    pub fn set_frequency_hz(&mut self, hz: u16) {
        self.period_ms = period_for_hz(hz).max(1);
    }

    /// Returns `true` when a period has elapsed; the first poll always fires.
    pub fn poll(&mut self, now: Ticks) -> bool {
        match self.last {
            Some(last) if now.elapsed_since(last) < self.period_ms => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

fn period_for_hz(hz: u16) -> u32 {
    if hz == 0 { 1000 } else { 1000 / u32::from(hz) }
}

/// Non-blocking source of received frames.
pub trait FrameSource {
    fn try_receive(&mut self) -> Option<CanFrame>;
}

/// Tasks that ran during one [`Scheduler::service`] call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickSummary {
    pub control: bool,
    pub fault_check: bool,
    pub watchdog: bool,
    pub report: bool,
}

impl TickSummary {
    #[must_use]
    pub const fn any(&self) -> bool {
        self.control || self.fault_check || self.watchdog || self.report
    }
}

/// Timers for the four periodic actuator tasks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Scheduler {
    control: Periodic,
    fault_check: Periodic,
    watchdog: Periodic,
    report: Periodic,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: &ActuatorConfig) -> Self {
        Self {
            control: Periodic::every_ms(CONTROL_PERIOD_MS),
            fault_check: Periodic::from_hz(config.fault_check_frequency_hz),
            watchdog: Periodic::every_ms(WATCHDOG_CHECK_PERIOD_MS),
            report: Periodic::from_hz(config.report_publish_frequency_hz),
        }
    }

    #[must_use]
    pub const fn fault_check_period_ms(&self) -> u32 {
        self.fault_check.period_ms()
    }

    #[must_use]
    pub const fn report_period_ms(&self) -> u32 {
        self.report.period_ms()
    }

    /// Runs every task that is due at `now`.
    pub fn service<A, H, S>(&mut self, core: &Shared<ControlCore<A, H, S>>, now: Ticks) -> TickSummary
    where
        A: Actuator,
        H: SpoofHardware,
        S: ConfigStore,
    {
        let (fault_hz, report_hz) = core.with(|core| {
            let config = core.config();
            (config.fault_check_frequency_hz, config.report_publish_frequency_hz)
        });
        self.fault_check.set_frequency_hz(fault_hz);
        self.report.set_frequency_hz(report_hz);

        let mut summary = TickSummary::default();
        if self.control.poll(now) {
            core.with(|core| core.update(now));
            summary.control = true;
        }
        if self.fault_check.poll(now) {
            core.with(|core| core.check_for_sensor_faults(now));
            summary.fault_check = true;
        }
        if self.watchdog.poll(now) {
            core.with(|core| core.check_for_command_timeout(now));
            summary.watchdog = true;
        }
        if self.report.poll(now) {
            core.with(|core| core.publish_report(now));
            summary.report = true;
        }
        summary
    }

    /// Handles at most one pending frame, then services the timers.
    pub fn run_once<A, H, S, F>(
        &mut self,
        core: &Shared<ControlCore<A, H, S>>,
        source: &mut F,
        now: Ticks,
    ) -> (Option<FrameDisposition>, TickSummary)
    where
        A: Actuator,
        H: SpoofHardware,
        S: ConfigStore,
        F: FrameSource,
    {
        let disposition = source
            .try_receive()
            .map(|frame| core.with(|core| core.process_frame(&frame, now)));
        (disposition, self.service(core, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u32) -> Ticks {
        Ticks::from_millis(value)
    }

    #[test]
    fn periodic_fires_first_then_on_period() {
        let mut timer = Periodic::every_ms(50);

        assert!(timer.poll(ms(3)));
        assert!(!timer.poll(ms(52)));
        assert!(timer.poll(ms(53)));
        assert!(!timer.poll(ms(60)));
    }

    #[test]
    fn frequency_maps_to_whole_millisecond_period() {
        assert_eq!(Periodic::from_hz(5).period_ms(), 200);
        assert_eq!(Periodic::from_hz(20).period_ms(), 50);
        assert_eq!(Periodic::from_hz(1000).period_ms(), 1);
        assert_eq!(Periodic::from_hz(0).period_ms(), 1000);
    }

    #[test]
    fn periodic_survives_tick_wraparound() {
        let start = Ticks::from_millis(u32::MAX - 5);
        let mut timer = Periodic::every_ms(10);

        assert!(timer.poll(start));
        assert!(!timer.poll(start.wrapping_add_millis(9)));
        assert!(timer.poll(start.wrapping_add_millis(10)));
    }

    #[test]
    fn summary_reports_any_task() {
        assert!(!TickSummary::default().any());
        assert!(
            TickSummary {
                report: true,
                ..TickSummary::default()
            }
            .any()
        );
    }
}
