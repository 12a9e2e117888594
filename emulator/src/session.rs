use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use actuator_core::actuator::Actuator;
use actuator_core::config::{ActuatorConfig, ConfigId, MemoryConfigStore, OverridePolicy};
use actuator_core::control::{ControlCore, FrameDisposition};
use actuator_core::fault::{FaultBits, FaultOrigin};
use actuator_core::hardware::SpoofHardware;
use actuator_core::output::OutputCodes;
use actuator_core::protocol::command::STEERING_RATE_MAX;
use actuator_core::protocol::{
    CanFrame, ConfigWrite, FAULT_REPORT_CAN_ID, FaultReport, ModuleKind, PedalCommand, Report,
    SteeringCommand, encode_disable, encode_enable,
};
use actuator_core::scheduler::{FrameSource, Scheduler};
use actuator_core::sensor::{CalibrationRange, SENSOR_QUANTIZATION_DIVISOR, SensorReading};
use actuator_core::sync::Shared;
use actuator_core::time::Ticks;

/// Longest stretch `advance` will simulate in one command.
const MAX_ADVANCE_MS: u32 = 60_000;

/// Sensor counts above the calibrated floor used for a released pedal.
const PEDAL_REST_MARGIN: u16 = 10;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("enable", "enable                          - send the enable frame"),
    ("disable", "disable                         - send the disable frame"),
    (
        "command",
        "command <fraction> | <angle> [rate] - send a pedal or steering command",
    ),
    (
        "sensors",
        "sensors [<a> <b>]               - show or set the sensor samples",
    ),
    (
        "advance",
        "advance <ms>                    - run the control loop for simulated time",
    ),
    (
        "config",
        "config [<label> <value>]        - list or write calibration",
    ),
    (
        "fault",
        "fault <brake|steering|throttle|id> - inject a fault report",
    ),
    (
        "send",
        "send <id> [byte..]              - inject a raw frame, hex values",
    ),
    ("status", "status                          - display actuator state"),
    ("help", "help [topic]                    - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActuatorProfile {
    Brake,
    Throttle,
    Steering,
}

impl ActuatorProfile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("brake") {
            Ok(Self::Brake)
        } else if tag.eq_ignore_ascii_case("throttle") {
            Ok(Self::Throttle)
        } else if tag.eq_ignore_ascii_case("steering") {
            Ok(Self::Steering)
        } else {
            Err(format!("Unknown actuator `{tag}`"))
        }
    }
}

/// Bench stand-in for the sensor ADCs, spoof DAC and relays.
#[derive(Clone, Debug, Default)]
pub struct BenchHardware {
    reading: SensorReading,
    output: Option<OutputCodes>,
    relay: bool,
    secondary: bool,
}

impl SpoofHardware for BenchHardware {
    fn read_sensors(&mut self) -> SensorReading {
        self.reading
    }

    fn write_spoof(&mut self, codes: OutputCodes) {
        self.output = Some(codes);
    }

    fn set_spoof_enabled(&mut self, energized: bool) {
        self.relay = energized;
    }

    fn set_secondary_output(&mut self, active: bool) {
        self.secondary = active;
    }
}

#[derive(Default)]
struct BenchBus {
    pending: VecDeque<CanFrame>,
}

impl FrameSource for BenchBus {
    fn try_receive(&mut self) -> Option<CanFrame> {
        self.pending.pop_front()
    }
}

#[derive(Default)]
struct ReportTally {
    count: usize,
    last: Option<Report>,
}

pub type BenchCore<A> = ControlCore<A, BenchHardware, MemoryConfigStore>;

pub struct Session<A: Actuator> {
    core: Shared<BenchCore<A>>,
    scheduler: Scheduler,
    bus: BenchBus,
    clock_ms: u32,
    reports: ReportTally,
    transcript: Option<TranscriptLogger>,
}

impl<A: Actuator + Default> Session<A> {
    pub fn new(transcript: Option<TranscriptLogger>) -> io::Result<Self> {
        let hardware = BenchHardware {
            reading: resting_reading(&A::defaults()),
            ..BenchHardware::default()
        };
        let core = ControlCore::new(
            A::default(),
            hardware,
            MemoryConfigStore::new(),
            Ticks::from_millis(0),
        )
        .map_err(|err| io::Error::other(err.to_string()))?;
        let scheduler = Scheduler::new(core.config());

        Ok(Self {
            core: Shared::new(core),
            scheduler,
            bus: BenchBus::default(),
            clock_ms: 0,
            reports: ReportTally::default(),
            transcript,
        })
    }
}

impl<A: Actuator> Session<A> {
    /// Lines describing power-on, including the config load outcome.
    pub fn boot_messages(&mut self) -> io::Result<Vec<String>> {
        let mut lines = vec![format!(
            "{} actuator powered on, sensors {}",
            A::MODULE,
            self.core.with(|core| core.hardware().reading)
        )];
        self.drain(&mut lines);
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(logger) = self.transcript.as_mut() {
            logger.append_line(self.clock_ms, TranscriptRole::Host, trimmed)?;
        }

        let mut words = trimmed.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let result = match verb.as_str() {
            "help" => Ok(help_lines(args.first().copied())),
            "enable" => Ok(self.send(encode_enable(A::MODULE))),
            "disable" => Ok(self.send(encode_disable(A::MODULE))),
            "command" => self.handle_drive(&args),
            "sensors" => self.handle_sensors(&args),
            "advance" => self.handle_advance(&args),
            "config" => self.handle_config(&args),
            "fault" => self.handle_fault(&args),
            "send" => self.handle_send(&args),
            "status" => Ok(self.status_lines()),
            other => Err(format!("unknown command `{other}` (try `help`)")),
        };
        let lines = result.unwrap_or_else(|err| vec![format!("ERR syntax {err}")]);

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn handle_drive(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        let frame = if A::MODULE == ModuleKind::Steering {
            let angle: i16 = parse_arg(args, 0, "angle")?;
            let rate = match args.get(1) {
                Some(_) => parse_arg(args, 1, "rate")?,
                None => STEERING_RATE_MAX,
            };
            SteeringCommand::new(angle, rate).encode()
        } else {
            let fraction: f32 = parse_arg(args, 0, "fraction")?;
            PedalCommand::new(fraction).encode(A::MODULE)
        };
        Ok(self.send(frame))
    }

    fn handle_sensors(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        if !args.is_empty() {
            let reading = SensorReading::new(parse_arg(args, 0, "a")?, parse_arg(args, 1, "b")?);
            self.core
                .with(|core| core.hardware_mut().reading = reading);
        }
        let reading = self.core.with(|core| core.hardware().reading);
        Ok(vec![format!("OK sensors {reading}")])
    }

    fn handle_advance(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        let millis: u32 = parse_arg(args, 0, "ms")?;
        if millis > MAX_ADVANCE_MS {
            return Err(format!("advance is limited to {MAX_ADVANCE_MS}ms"));
        }

        self.reports = ReportTally::default();
        let mut lines = Vec::new();
        self.advance(millis, &mut lines);

        let last = self
            .reports
            .last
            .map(|report| format!(" last=[{}]", describe_report(report)))
            .unwrap_or_default();
        lines.push(format!(
            "OK advanced {millis}ms now=+{}ms reports={}{last}",
            self.clock_ms, self.reports.count
        ));
        Ok(lines)
    }

    fn handle_config(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        let Some(label) = args.first() else {
            let config = self.core.with(|core| *core.config());
            let mut lines = vec![format!("OK {} calibration", A::MODULE)];
            for id in ConfigId::ALL {
                if id != ConfigId::StoreSentinel {
                    lines.push(format!("  {} = {}", id.label(), config.get(id)));
                }
            }
            return Ok(lines);
        };

        let id = ConfigId::from_label(label).ok_or_else(|| format!("unknown config `{label}`"))?;
        let value: u16 = parse_arg(args, 1, "value")?;
        let write = ConfigWrite {
            raw_id: A::MODULE.config_base() + id.as_raw(),
            value,
        };
        let mut lines = self.send(write.encode());

        let applied = self.core.with(|core| core.config().get(id));
        if applied == value && id != ConfigId::StoreSentinel {
            lines.push(format!("OK config {}={value}", id.label()));
        } else {
            lines.push(format!("ERR config {}={value} rejected", id.label()));
        }
        Ok(lines)
    }

    fn handle_fault(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        let tag = args.first().ok_or("expected <origin>")?;
        let origin = match ActuatorProfile::from_tag(tag) {
            Ok(ActuatorProfile::Brake) => FaultOrigin::Brake,
            Ok(ActuatorProfile::Throttle) => FaultOrigin::Throttle,
            Ok(ActuatorProfile::Steering) => FaultOrigin::Steering,
            Err(_) => FaultOrigin::from_raw(parse_arg(args, 0, "origin")?),
        };
        let report = FaultReport {
            origin,
            fault_bits: FaultBits::INVALID_SENSOR_VALUE,
        };
        Ok(self.send(report.encode()))
    }

    fn handle_send(&mut self, args: &[&str]) -> Result<Vec<String>, String> {
        let id = parse_hex_u16(args.first().ok_or("expected <id>")?)?;
        let payload = args[1..]
            .iter()
            .copied()
            .map(parse_hex_u8)
            .collect::<Result<Vec<u8>, String>>()?;
        let frame = CanFrame::new(id, &payload).map_err(|err| err.to_string())?;
        Ok(self.send(frame))
    }

    fn status_lines(&self) -> Vec<String> {
        let clock_ms = self.clock_ms;
        self.core.with(|core| {
            let hardware = core.hardware();
            let mut lines = vec![format!("OK {} {}", A::MODULE, core.state())];
            lines.push(format!("  sensors {}", hardware.reading));
            let output = hardware
                .output
                .map_or_else(|| "none".to_string(), |codes| codes.to_string());
            lines.push(format!(
                "  spoof relay={} output={output}",
                on_off(hardware.relay)
            ));
            if A::MODULE.has_secondary_output() {
                lines.push(format!("  brake lights={}", on_off(hardware.secondary)));
            }
            match core.setpoint() {
                Some(setpoint) => lines.push(format!(
                    "  setpoint {:?} received=+{}ms",
                    setpoint.command,
                    setpoint.received_at.as_millis()
                )),
                None => lines.push("  setpoint none".to_string()),
            }
            lines.push(format!("  override detector {:?}", core.detector()));
            lines.push(format!("  clock=+{clock_ms}ms"));
            lines
        })
    }

    /// Queues `frame` and runs one millisecond so it is processed.
    fn send(&mut self, frame: CanFrame) -> Vec<String> {
        let mut lines = vec![format!(
            "bus: rx id={:#05x} len={}",
            frame.id(),
            frame.len()
        )];
        self.bus.pending.push_back(frame);
        self.advance(1, &mut lines);
        let state = self.core.with(|core| core.state());
        lines.push(format!("OK {} {state}", A::MODULE));
        lines
    }

    fn advance(&mut self, millis: u32, lines: &mut Vec<String>) {
        for _ in 0..millis {
            self.clock_ms = self.clock_ms.wrapping_add(1);
            let now = Ticks::from_millis(self.clock_ms);
            loop {
                let (disposition, _) = self.scheduler.run_once(&self.core, &mut self.bus, now);
                match disposition {
                    Some(FrameDisposition::Ignored(reason)) => {
                        lines.push(format!("bus: frame ignored ({reason:?})"));
                    }
                    Some(FrameDisposition::Handled(_)) => {}
                    None => break,
                }
            }
            self.drain(lines);
        }
    }

    /// Narrates queued events and inspects outbound frames.
    fn drain(&mut self, lines: &mut Vec<String>) {
        let (events, frames) = self.core.with(|core| {
            let mut events = Vec::new();
            while let Some(record) = core.pop_event() {
                events.push(record);
            }
            let mut frames = Vec::new();
            while let Some(frame) = core.pop_outbound() {
                frames.push(frame);
            }
            (events, frames)
        });

        for record in events {
            lines.push(format!(
                "event #{} +{}ms {}",
                record.id,
                record.timestamp.as_millis(),
                record.event
            ));
        }
        for frame in frames {
            self.observe_outbound(&frame, lines);
        }
    }

    fn observe_outbound(&mut self, frame: &CanFrame, lines: &mut Vec<String>) {
        if frame.id() == A::MODULE.ids().report {
            match Report::decode(frame.payload()) {
                Ok(report) => {
                    self.reports.count += 1;
                    self.reports.last = Some(report);
                }
                Err(err) => lines.push(format!("tx: undecodable report ({err})")),
            }
        } else if frame.id() == FAULT_REPORT_CAN_ID {
            match FaultReport::decode(frame.payload()) {
                Ok(report) => lines.push(format!(
                    "tx: fault report origin={} dtcs={}",
                    report.origin, report.fault_bits
                )),
                Err(err) => lines.push(format!("tx: undecodable fault report ({err})")),
            }
        } else {
            lines.push(format!("tx: id={:#05x} len={}", frame.id(), frame.len()));
        }
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        if let Some(logger) = self.transcript.as_mut() {
            for line in lines {
                logger.append_line(self.clock_ms, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

/// Sensor samples of an untouched pedal or a centred wheel.
fn resting_reading(config: &ActuatorConfig) -> SensorReading {
    let sample = |range: CalibrationRange| {
        let (low, high) = range.bounds();
        let (low, high) = (
            low / SENSOR_QUANTIZATION_DIVISOR,
            high / SENSOR_QUANTIZATION_DIVISOR,
        );
        match config.override_policy {
            OverridePolicy::ThresholdDebounce => low + PEDAL_REST_MARGIN,
            OverridePolicy::FilteredDiscrepancy => low + (high - low) / 2,
        }
    };
    SensorReading::new(sample(config.spoof_a), sample(config.spoof_b))
}

fn describe_report(report: Report) -> String {
    format!(
        "enabled={} override={} dtcs={} echo={:02x?}",
        report.enabled, report.operator_override, report.fault_bits, report.echo
    )
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn parse_arg<T: FromStr>(args: &[&str], index: usize, name: &str) -> Result<T, String> {
    let raw = args.get(index).ok_or_else(|| format!("expected <{name}>"))?;
    raw.parse()
        .map_err(|_| format!("invalid <{name}> `{raw}`"))
}

fn parse_hex_u16(raw: &str) -> Result<u16, String> {
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|_| format!("invalid hex id `{raw}`"))
}

fn parse_hex_u8(raw: &str) -> Result<u8, String> {
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid hex byte `{raw}`"))
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, clock_ms: u32, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{clock_ms:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use actuator_core::actuator::{Steering, Throttle};

    use super::*;

    fn session<A: Actuator + Default>() -> Session<A> {
        Session::new(None).expect("bench session")
    }

    fn run<A: Actuator>(session: &mut Session<A>, line: &str) -> Vec<String> {
        session.handle_command(line).expect("command handled")
    }

    fn mentions(lines: &[String], needle: &str) -> bool {
        lines.iter().any(|line| line.contains(needle))
    }

    #[test]
    fn boot_reports_seeded_calibration() {
        let mut session = session::<Throttle>();
        let lines = session.boot_messages().expect("boot");

        assert!(lines[0].starts_with("throttle actuator powered on"));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn enable_then_command_drives_throttle_output() {
        let mut session = session::<Throttle>();
        run(&mut session, "enable");
        run(&mut session, "command 0.5");

        let (enabled, output, relay) = session.core.with(|core| {
            (
                core.state().enabled,
                core.hardware().output,
                core.hardware().relay,
            )
        });
        assert!(enabled);
        assert!(relay);
        assert_eq!(output, Some(OutputCodes::new(1050, 2013)));
    }

    #[test]
    fn status_shows_spoof_output_codes() {
        let mut session = session::<Throttle>();
        assert!(mentions(&run(&mut session, "status"), "output=none"));

        run(&mut session, "enable");
        run(&mut session, "command 0.5");
        let lines = run(&mut session, "status");
        assert!(mentions(&lines, "spoof relay=on output=a=1050 b=2013"));
    }

    #[test]
    fn pedal_press_hands_control_back() {
        let mut session = session::<Throttle>();
        run(&mut session, "enable");
        run(&mut session, "command 0.2");
        run(&mut session, "sensors 300 600");
        let lines = run(&mut session, "advance 150");

        let state = session.core.with(|core| core.state());
        assert!(!state.enabled);
        assert!(state.operator_override);
        assert!(mentions(&lines, "fault report origin=throttle"));
        assert!(!session.core.with(|core| core.hardware().relay));
    }

    #[test]
    fn silent_bus_times_out() {
        let mut session = session::<Throttle>();
        run(&mut session, "enable");
        run(&mut session, "command 0.3");
        let lines = run(&mut session, "advance 250");

        assert!(mentions(&lines, "command timeout"));
        assert!(!session.core.with(|core| core.state().enabled));
    }

    #[test]
    fn config_writes_are_acknowledged_or_rejected() {
        let mut session = session::<Throttle>();

        let accepted = run(&mut session, "config report-hz 10");
        assert!(mentions(&accepted, "OK config report-hz=10"));
        assert_eq!(session.scheduler.report_period_ms(), 100);

        let rejected = run(&mut session, "config store-sentinel 1");
        assert!(mentions(&rejected, "rejected"));
    }

    #[test]
    fn steering_command_takes_angle_and_rate() {
        let mut session = session::<Steering>();
        run(&mut session, "enable");
        run(&mut session, "command 300 254");
        let lines = run(&mut session, "advance 100");

        assert!(mentions(&lines, "reports="));
        let (enabled, output) = session
            .core
            .with(|core| (core.state().enabled, core.hardware().output));
        assert!(enabled);
        assert!(output.is_some());
    }

    #[test]
    fn foreign_frames_are_reported_as_ignored() {
        let mut session = session::<Throttle>();
        let lines = run(&mut session, "send 0x123 de ad");

        assert!(mentions(&lines, "frame ignored (Foreign)"));
    }

    #[test]
    fn unknown_commands_are_syntax_errors() {
        let mut session = session::<Throttle>();

        assert_eq!(
            run(&mut session, "launch"),
            vec!["ERR syntax unknown command `launch` (try `help`)".to_string()]
        );
        assert!(mentions(&run(&mut session, "advance soon"), "invalid <ms>"));
    }
}
