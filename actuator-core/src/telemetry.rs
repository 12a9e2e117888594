//! Control events and their bounded log.
//!
//! The core never logs directly. It appends [`ControlEvent`]s to an
//! [`EventLog`] that the firmware drains into defmt and the emulator prints,
//! so both targets narrate the same decisions.

use core::fmt;

use heapless::Deque;

use crate::config::ConfigId;
use crate::fault::{FaultBits, FaultOrigin};
use crate::time::Ticks;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Number of events retained before the oldest is dropped.
pub const EVENT_LOG_CAPACITY: usize = 32;

/// Why control was returned to the driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisableReason {
    /// Disable frame received.
    Command,
    OperatorOverride,
    SensorFault,
    CommandTimeout,
    /// Another module published a fault report.
    RemoteFault(FaultOrigin),
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("disable command"),
            Self::OperatorOverride => f.write_str("operator override"),
            Self::SensorFault => f.write_str("sensor fault"),
            Self::CommandTimeout => f.write_str("command timeout"),
            Self::RemoteFault(origin) => write!(f, "fault report from {origin}"),
        }
    }
}

/// Decision or anomaly recorded by the control core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlEvent {
    Enabled,
    /// Enable frame ignored while the driver is overriding.
    EnableRejected,
    Disabled(DisableReason),
    OverrideDetected,
    OverrideCleared,
    SensorFaultLatched,
    SensorFaultCleared,
    FaultReportReceived { origin: FaultOrigin, fault_bits: FaultBits },
    ConfigSeeded,
    ConfigLoaded { fallbacks: u8 },
    ConfigApplied { id: ConfigId, value: u16 },
    ConfigRejected { raw_id: u16, value: u16 },
    ConfigPersistFailed { id: ConfigId },
    /// Protocol frame for this module that could not be decoded.
    FrameMalformed { can_id: u16 },
    /// Outbound queue was full; the oldest queued frame was dropped.
    OutboxOverflow { can_id: u16 },
}

impl ControlEvent {
    /// Returns `true` for events that warrant a warning-level log line.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::Disabled(_)
                | Self::EnableRejected
                | Self::OverrideDetected
                | Self::SensorFaultLatched
                | Self::FaultReportReceived { .. }
                | Self::ConfigRejected { .. }
                | Self::ConfigPersistFailed { .. }
                | Self::FrameMalformed { .. }
                | Self::OutboxOverflow { .. }
        )
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("control enabled"),
            Self::EnableRejected => f.write_str("enable rejected: operator override active"),
            Self::Disabled(reason) => write!(f, "control disabled: {reason}"),
            Self::OverrideDetected => f.write_str("operator override detected"),
            Self::OverrideCleared => f.write_str("operator override cleared"),
            Self::SensorFaultLatched => f.write_str("invalid sensor value latched"),
            Self::SensorFaultCleared => f.write_str("sensor values valid again"),
            Self::FaultReportReceived { origin, fault_bits } => {
                write!(f, "fault report from {origin} dtcs={fault_bits}")
            }
            Self::ConfigSeeded => f.write_str("config store seeded with defaults"),
            Self::ConfigLoaded { fallbacks } => {
                write!(f, "config loaded ({fallbacks} slots fell back to defaults)")
            }
            Self::ConfigApplied { id, value } => write!(f, "config {id}={value}"),
            Self::ConfigRejected { raw_id, value } => {
                write!(f, "config write rejected id={raw_id:#06x} value={value}")
            }
            Self::ConfigPersistFailed { id } => write!(f, "config {id} could not be persisted"),
            Self::FrameMalformed { can_id } => write!(f, "malformed frame id={can_id:#05x}"),
            Self::OutboxOverflow { can_id } => {
                write!(f, "outbox full, dropped frame id={can_id:#05x}")
            }
        }
    }
}

/// Event stored in the log.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventRecord {
    pub id: EventId,
    pub timestamp: Ticks,
    pub event: ControlEvent,
}

/// Fixed-capacity FIFO of control events.
#[derive(Debug)]
pub struct EventLog {
    records: Deque<EventRecord, EVENT_LOG_CAPACITY>,
    next_id: EventId,
    dropped: u32,
}

impl EventLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            next_id: 0,
            dropped: 0,
        }
    }

    /// Appends an event, evicting the oldest record when full.
    pub fn record(&mut self, timestamp: Ticks, event: ControlEvent) -> EventId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let record = EventRecord {
            id,
            timestamp,
            event,
        };
        if let Err(record) = self.records.push_back(record) {
            self.records.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
            let _ = self.records.push_back(record);
        }
        id
    }

    /// Removes and returns the oldest record.
    pub fn pop(&mut self) -> Option<EventRecord> {
        self.records.pop_front()
    }

    /// Iterates the retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&EventRecord> {
        self.records.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records evicted because the log was full.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut log = EventLog::new();
        for step in 0..=EVENT_LOG_CAPACITY as u32 {
            log.record(Ticks::from_millis(step), ControlEvent::Enabled);
        }

        assert_eq!(log.len(), EVENT_LOG_CAPACITY);
        assert_eq!(log.dropped(), 1);
        assert_eq!(log.pop().map(|record| record.id), Some(1));
        assert_eq!(
            log.latest().map(|record| record.id),
            Some(EVENT_LOG_CAPACITY as u32)
        );
    }

    #[test]
    fn disable_reasons_render_for_operators() {
        let event = ControlEvent::Disabled(DisableReason::RemoteFault(FaultOrigin::Brake));
        let mut buffer = heapless::String::<64>::new();
        fmt::write(&mut buffer, format_args!("{event}")).expect("fits");
        assert_eq!(buffer.as_str(), "control disabled: fault report from brake");
    }
}
