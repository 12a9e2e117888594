//! Forwards control events to defmt (target) or stdout (host).
//!
//! The control core records decisions into its bounded event log; the control
//! task drains that log through a [`TelemetryRecorder`] after every tick so each
//! transition is logged once, in order, with its tick timestamp.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use actuator_core::telemetry::{EventId, EventRecord};

use crate::status::StatusSnapshot;

/// Tracks what has already been forwarded from the core's event log.
pub struct TelemetryRecorder {
    forwarded: u32,
    last_forwarded: Option<EventId>,
    evicted_seen: u32,
}

impl TelemetryRecorder {
    pub const fn new() -> Self {
        Self {
            forwarded: 0,
            last_forwarded: None,
            evicted_seen: 0,
        }
    }

    /// Logs one drained record.
    pub fn forward(&mut self, record: &EventRecord) {
        emit_event(record);
        self.forwarded = self.forwarded.wrapping_add(1);
        self.last_forwarded = Some(record.id);
    }

    /// Reports records the core evicted before they could be drained.
    ///
    /// `evicted_total` is the log's running eviction counter; returns how many
    /// new evictions were observed.
    pub fn observe_evictions(&mut self, evicted_total: u32) -> u32 {
        let fresh = evicted_total.wrapping_sub(self.evicted_seen);
        if fresh > 0 {
            emit_evictions(fresh);
            self.evicted_seen = evicted_total;
        }
        fresh
    }

    pub const fn forwarded(&self) -> u32 {
        self.forwarded
    }

    pub const fn last_forwarded(&self) -> Option<EventId> {
        self.last_forwarded
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs the periodic status heartbeat.
pub fn log_heartbeat(snapshot: &StatusSnapshot) {
    emit_heartbeat(snapshot);
}

#[cfg(target_os = "none")]
fn emit_event(record: &EventRecord) {
    if record.event.is_warning() {
        defmt::warn!(
            "control: #{} t={}ms {}",
            record.id,
            record.timestamp.as_millis(),
            record.event
        );
    } else {
        defmt::info!(
            "control: #{} t={}ms {}",
            record.id,
            record.timestamp.as_millis(),
            record.event
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(record: &EventRecord) {
    let level = if record.event.is_warning() { "WARN" } else { "INFO" };
    println!(
        "{level} control: #{} t={} {}",
        record.id, record.timestamp, record.event
    );
}

#[cfg(target_os = "none")]
fn emit_evictions(count: u32) {
    defmt::warn!("control: {} events evicted before logging", count);
}

#[cfg(not(target_os = "none"))]
fn emit_evictions(count: u32) {
    println!("WARN control: {count} events evicted before logging");
}

#[cfg(target_os = "none")]
fn emit_heartbeat(snapshot: &StatusSnapshot) {
    defmt::info!("status: {}", snapshot);
}

#[cfg(not(target_os = "none"))]
fn emit_heartbeat(snapshot: &StatusSnapshot) {
    println!(
        "INFO status: enabled={} override={} dtcs={:#04x} rx={} tx={} dropped={} rx_errors={}",
        snapshot.enabled,
        snapshot.operator_override,
        snapshot.fault_bits,
        snapshot.frames_rx,
        snapshot.frames_tx,
        snapshot.tx_dropped,
        snapshot.rx_errors
    );
}
