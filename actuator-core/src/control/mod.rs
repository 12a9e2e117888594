//! Enable/disable safety state machine for one actuator.
//!
//! [`ControlCore`] owns everything the actuator decides with: calibration,
//! enable state, fault bits, the last command and the outbound frame queue.
//! Every path that detects a problem converges on [`ControlCore::disable`],
//! and nothing in here ever re-enables control on its own.

mod state;

use heapless::Deque;

use crate::actuator::Actuator;
use crate::config::{ActuatorConfig, ConfigError, ConfigId, ConfigLoad, ConfigStore, load_or_seed};
use crate::fault::FaultBits;
use crate::hardware::SpoofHardware;
use crate::output::{
    DISCONTINUITY_SAMPLE_COUNT, OutputCodes, SecondaryOutputPolicy, map,
    prevent_signal_discontinuity, setpoint_of,
};
use crate::overrides::OverrideStrategy;
use crate::protocol::{CanFrame, ConfigWrite, FaultReport, Inbound, Report, classify};
use crate::sensor::{SensorValidator, ValidationOutcome};
use crate::telemetry::{ControlEvent, EventLog, EventRecord};
use crate::time::Ticks;

pub use crate::telemetry::DisableReason;
pub use state::{ActuatorState, CommandSetpoint, FrameDisposition, FrameKind, IgnoreReason};

/// Longest gap between accepted commands before control is dropped.
pub const COMMAND_TIMEOUT_MS: u32 = 200;

/// Period of the command watchdog check.
pub const WATCHDOG_CHECK_PERIOD_MS: u32 = 50;

/// Outbound frames buffered between transmit opportunities.
pub const OUTBOX_CAPACITY: usize = 8;

/// Control core for actuator `A` on hardware `H`, persisting to store `S`.
pub struct ControlCore<A: Actuator, H, S> {
    actuator: A,
    hardware: H,
    store: S,
    config: ActuatorConfig,
    secondary: SecondaryOutputPolicy,
    state: ActuatorState,
    validator: SensorValidator,
    detector: OverrideStrategy,
    setpoint: Option<CommandSetpoint<A::Command>>,
    last_command_at: Ticks,
    last_output: Option<OutputCodes>,
    outbox: Deque<CanFrame, OUTBOX_CAPACITY>,
    events: EventLog,
}

impl<A, H, S> ControlCore<A, H, S>
where
    A: Actuator,
    H: SpoofHardware,
    S: ConfigStore,
{
    /// Loads calibration from `store` (seeding defaults on first boot) and
    /// returns a disabled core.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Store`] when first-boot seeding cannot persist.
    pub fn new(actuator: A, mut hardware: H, mut store: S, now: Ticks) -> Result<Self, ConfigError<S::Error>> {
        let (config, load) = load_or_seed(&mut store, &A::defaults())?;

        hardware.set_spoof_enabled(false);

        let mut core = Self {
            actuator,
            hardware,
            store,
            secondary: SecondaryOutputPolicy::for_module(A::MODULE, &config),
            detector: OverrideStrategy::from_config(&config),
            config,
            state: ActuatorState::default(),
            validator: SensorValidator::new(),
            setpoint: None,
            last_command_at: now,
            last_output: None,
            outbox: Deque::new(),
            events: EventLog::new(),
        };
        let event = match load {
            ConfigLoad::Seeded => ControlEvent::ConfigSeeded,
            ConfigLoad::Loaded { fallbacks } => ControlEvent::ConfigLoaded { fallbacks },
        };
        core.events.record(now, event);
        Ok(core)
    }

    #[must_use]
    pub const fn state(&self) -> ActuatorState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    #[must_use]
    pub const fn setpoint(&self) -> Option<&CommandSetpoint<A::Command>> {
        self.setpoint.as_ref()
    }

    /// Codes most recently driven from a command, if any since enable.
    #[must_use]
    pub const fn last_output(&self) -> Option<OutputCodes> {
        self.last_output
    }

    #[must_use]
    pub const fn actuator(&self) -> &A {
        &self.actuator
    }

    #[must_use]
    pub const fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn detector(&self) -> &OverrideStrategy {
        &self.detector
    }

    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Removes and returns the oldest unread event.
    pub fn pop_event(&mut self) -> Option<EventRecord> {
        self.events.pop()
    }

    /// Removes and returns the oldest queued outbound frame.
    pub fn pop_outbound(&mut self) -> Option<CanFrame> {
        self.outbox.pop_front()
    }

    #[must_use]
    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// Hands control of the actuator to the external controller.
    ///
    /// Does nothing while already enabled or while the driver is overriding.
    /// Returns `true` when the transition happened.
    pub fn enable(&mut self, now: Ticks) -> bool {
        if self.state.enabled {
            return false;
        }
        if self.state.operator_override {
            self.events.record(now, ControlEvent::EnableRejected);
            return false;
        }

        let baseline = prevent_signal_discontinuity(&mut self.hardware, DISCONTINUITY_SAMPLE_COUNT);
        self.hardware.set_spoof_enabled(true);
        self.state.enabled = true;

        self.last_command_at = now;
        self.setpoint = None;
        self.last_output = None;
        self.detector.on_enable();
        self.actuator.reset();
        self.actuator.seed(setpoint_of(baseline.a, self.config.spoof_a));
        self.events.record(now, ControlEvent::Enabled);
        true
    }

    /// Returns control to the driver.
    ///
    /// Idempotent: calling it while disabled touches neither hardware nor
    /// state. Returns `true` when the transition happened.
    pub fn disable(&mut self, reason: DisableReason, now: Ticks) -> bool {
        if !self.state.enabled {
            return false;
        }

        prevent_signal_discontinuity(&mut self.hardware, DISCONTINUITY_SAMPLE_COUNT);
        self.hardware.set_spoof_enabled(false);
        if self.secondary.is_present() {
            self.hardware.set_secondary_output(false);
        }
        self.state.enabled = false;

        self.detector.on_disable();
        self.actuator.reset();
        self.last_output = None;
        self.events.record(now, ControlEvent::Disabled(reason));
        true
    }

    /// Decodes and applies one received frame.
    pub fn process_frame(&mut self, frame: &CanFrame, now: Ticks) -> FrameDisposition {
        let inbound = match classify(frame, A::MODULE) {
            Ok(inbound) => inbound,
            Err(_) => return self.malformed(frame, now),
        };

        match inbound {
            Inbound::Foreign => FrameDisposition::Ignored(IgnoreReason::Foreign),
            Inbound::Unhandled => FrameDisposition::Ignored(IgnoreReason::NotAddressed),
            Inbound::Enable => {
                self.enable(now);
                FrameDisposition::Handled(FrameKind::Enable)
            }
            Inbound::Disable => {
                self.disable(DisableReason::Command, now);
                FrameDisposition::Handled(FrameKind::Disable)
            }
            Inbound::Command(payload) => match A::decode_command(payload) {
                Ok(command) => {
                    self.accept_command(command, now);
                    FrameDisposition::Handled(FrameKind::Command)
                }
                Err(_) => self.malformed(frame, now),
            },
            Inbound::FaultReport(report) => {
                self.handle_fault_report(report, now);
                FrameDisposition::Handled(FrameKind::FaultReport)
            }
            Inbound::ConfigWrite(write) => self.handle_config_write(write, now),
        }
    }

    /// Runs override detection, then drives the output if still enabled.
    pub fn update(&mut self, now: Ticks) {
        self.check_for_operator_override(now);
        if self.state.enabled {
            self.drive_output(now);
        }
    }

    /// Samples the sensors and applies the configured override strategy.
    ///
    /// Runs while enabled, and while an override is active so its release
    /// can be observed.
    pub fn check_for_operator_override(&mut self, now: Ticks) {
        if !self.state.enabled && !self.state.operator_override {
            return;
        }

        let reading = self.hardware.read_sensors();
        if self.detector.check(reading, now) {
            if !self.state.operator_override {
                self.disable(DisableReason::OperatorOverride, now);
                self.state.fault_bits.set(FaultBits::OPERATOR_OVERRIDE);
                self.state.operator_override = true;
                self.events.record(now, ControlEvent::OverrideDetected);
                self.publish_fault_report(now);
            }
        } else if self.state.operator_override {
            self.state.fault_bits.clear(FaultBits::OPERATOR_OVERRIDE);
            self.state.operator_override = false;
            self.events.record(now, ControlEvent::OverrideCleared);
        }
    }

    /// Validates the sensor pair; runs while enabled or while the sensor
    /// fault is latched.
    pub fn check_for_sensor_faults(&mut self, now: Ticks) {
        let latched = self
            .state
            .fault_bits
            .contains(FaultBits::INVALID_SENSOR_VALUE);
        if !self.state.enabled && !latched {
            return;
        }

        let reading = self.hardware.read_sensors();
        match self
            .validator
            .check(reading, self.config.spoof_a, self.config.spoof_b)
        {
            ValidationOutcome::Valid => {
                if latched {
                    self.state
                        .fault_bits
                        .clear(FaultBits::INVALID_SENSOR_VALUE);
                    self.events.record(now, ControlEvent::SensorFaultCleared);
                }
            }
            ValidationOutcome::Invalid { .. } => {}
            ValidationOutcome::Latched => {
                if !latched || self.state.enabled {
                    self.disable(DisableReason::SensorFault, now);
                    self.state.fault_bits.set(FaultBits::INVALID_SENSOR_VALUE);
                    self.events.record(now, ControlEvent::SensorFaultLatched);
                    self.publish_fault_report(now);
                }
            }
        }
    }

    /// Drops control when no command has been accepted for longer than
    /// [`COMMAND_TIMEOUT_MS`].
    pub fn check_for_command_timeout(&mut self, now: Ticks) {
        if self.state.enabled && now.elapsed_since(self.last_command_at) > COMMAND_TIMEOUT_MS {
            self.disable(DisableReason::CommandTimeout, now);
        }
    }

    /// Queues a status report.
    pub fn publish_report(&mut self, now: Ticks) {
        let report = Report {
            enabled: self.state.enabled,
            operator_override: self.state.operator_override,
            fault_bits: self.state.fault_bits,
            echo: self
                .actuator
                .command_echo(self.setpoint.as_ref().map(|setpoint| &setpoint.command)),
        };
        self.enqueue(report.encode(A::MODULE), now);
    }

    /// Queues a fault report carrying the current fault bits.
    pub fn publish_fault_report(&mut self, now: Ticks) {
        let report = FaultReport {
            origin: A::MODULE.fault_origin(),
            fault_bits: self.state.fault_bits,
        };
        self.enqueue(report.encode(), now);
    }

    /// Validates, persists and applies one calibration value.
    ///
    /// # Errors
    ///
    /// Returns the validation or store error; on error the working
    /// calibration is unchanged.
    pub fn apply_config(&mut self, id: ConfigId, value: u16, now: Ticks) -> Result<(), ConfigError<S::Error>> {
        let mut candidate = self.config;
        candidate.set(id, value).map_err(ConfigError::widen)?;
        if let Err(err) = self.store.write(id, value) {
            self.events.record(now, ControlEvent::ConfigPersistFailed { id });
            return Err(ConfigError::Store(err));
        }

        self.config = candidate;
        self.detector.reconfigure(&self.config);
        self.secondary = SecondaryOutputPolicy::for_module(A::MODULE, &self.config);
        self.events.record(now, ControlEvent::ConfigApplied { id, value });
        Ok(())
    }

    fn accept_command(&mut self, command: A::Command, now: Ticks) {
        self.setpoint = Some(CommandSetpoint {
            command,
            received_at: now,
        });
        self.last_command_at = now;
        if self.state.enabled {
            self.drive_output(now);
        }
    }

    fn drive_output(&mut self, now: Ticks) {
        let Some(setpoint) = self.setpoint else {
            return;
        };

        let target = self.actuator.setpoint(&setpoint.command, now);
        let codes = map(target, self.config.spoof_a, self.config.spoof_b);
        self.hardware.write_spoof(codes);
        if let Some(active) = self.secondary.evaluate(codes) {
            self.hardware.set_secondary_output(active);
        }
        self.last_output = Some(codes);
    }

    fn handle_fault_report(&mut self, report: FaultReport, now: Ticks) {
        self.events.record(
            now,
            ControlEvent::FaultReportReceived {
                origin: report.origin,
                fault_bits: report.fault_bits,
            },
        );
        self.disable(DisableReason::RemoteFault(report.origin), now);
    }

    fn handle_config_write(&mut self, write: ConfigWrite, now: Ticks) -> FrameDisposition {
        let base = A::MODULE.config_base();
        if write.raw_id & 0xFF00 != base {
            return FrameDisposition::Ignored(IgnoreReason::NotAddressed);
        }

        let applied = ConfigId::from_raw(write.raw_id - base)
            .ok_or(ConfigError::UnknownId(write.raw_id))
            .and_then(|id| self.apply_config(id, write.value, now));
        match applied {
            Ok(()) => FrameDisposition::Handled(FrameKind::ConfigWrite),
            Err(ConfigError::Store(_)) => FrameDisposition::Ignored(IgnoreReason::Rejected),
            Err(_) => {
                self.events.record(
                    now,
                    ControlEvent::ConfigRejected {
                        raw_id: write.raw_id,
                        value: write.value,
                    },
                );
                FrameDisposition::Ignored(IgnoreReason::Rejected)
            }
        }
    }

    fn malformed(&mut self, frame: &CanFrame, now: Ticks) -> FrameDisposition {
        self.events
            .record(now, ControlEvent::FrameMalformed { can_id: frame.id() });
        FrameDisposition::Ignored(IgnoreReason::Malformed)
    }

    fn enqueue(&mut self, frame: CanFrame, now: Ticks) {
        if let Err(frame) = self.outbox.push_back(frame) {
            if let Some(dropped) = self.outbox.pop_front() {
                self.events.record(
                    now,
                    ControlEvent::OutboxOverflow {
                        can_id: dropped.id(),
                    },
                );
            }
            let _ = self.outbox.push_back(frame);
        }
    }
}
