#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics mirror the control state and bus counters so the
//! heartbeat can log a [`StatusSnapshot`] without taking the control lock.

use actuator_core::control::ActuatorState;
use actuator_core::fault::FaultBits;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);
static OPERATOR_OVERRIDE: AtomicBool = AtomicBool::new(false);
static FAULT_BITS: AtomicU8 = AtomicU8::new(0);
/// Frames accepted from the bus.
static FRAMES_RX: AtomicU32 = AtomicU32::new(0);
/// Frames handed to the transmitter.
static FRAMES_TX: AtomicU32 = AtomicU32::new(0);
/// Outbound frames dropped because the transmit queue was full.
static TX_DROPPED: AtomicU32 = AtomicU32::new(0);
/// Receive errors reported by the CAN peripheral.
static RX_ERRORS: AtomicU32 = AtomicU32::new(0);

/// Point-in-time copy of the mirrored status.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub operator_override: bool,
    pub fault_bits: u8,
    pub frames_rx: u32,
    pub frames_tx: u32,
    pub tx_dropped: u32,
    pub rx_errors: u32,
}

/// Mirrors the control core's externally visible state.
pub fn record_state(state: ActuatorState) {
    ENABLED.store(state.enabled, Ordering::Relaxed);
    OPERATOR_OVERRIDE.store(state.operator_override, Ordering::Relaxed);
    FAULT_BITS.store(state.fault_bits.bits(), Ordering::Relaxed);
}

/// Returns the last mirrored state.
pub fn state() -> ActuatorState {
    ActuatorState {
        enabled: ENABLED.load(Ordering::Relaxed),
        operator_override: OPERATOR_OVERRIDE.load(Ordering::Relaxed),
        fault_bits: FaultBits::from_bits(FAULT_BITS.load(Ordering::Relaxed)),
    }
}

pub fn record_rx() {
    FRAMES_RX.fetch_add(1, Ordering::Relaxed);
}

pub fn record_tx() {
    FRAMES_TX.fetch_add(1, Ordering::Relaxed);
}

pub fn record_tx_dropped() {
    TX_DROPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_rx_error() {
    RX_ERRORS.fetch_add(1, Ordering::Relaxed);
}

/// Builds a [`StatusSnapshot`] from the stored values.
pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        enabled: ENABLED.load(Ordering::Relaxed),
        operator_override: OPERATOR_OVERRIDE.load(Ordering::Relaxed),
        fault_bits: FAULT_BITS.load(Ordering::Relaxed),
        frames_rx: FRAMES_RX.load(Ordering::Relaxed),
        frames_tx: FRAMES_TX.load(Ordering::Relaxed),
        tx_dropped: TX_DROPPED.load(Ordering::Relaxed),
        rx_errors: RX_ERRORS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_atomics() {
        let recorded = ActuatorState {
            enabled: false,
            operator_override: true,
            fault_bits: FaultBits::OPERATOR_OVERRIDE,
        };

        record_state(recorded);

        assert_eq!(state(), recorded);
        let snapshot = snapshot();
        assert!(!snapshot.enabled);
        assert_eq!(snapshot.fault_bits, FaultBits::OPERATOR_OVERRIDE.bits());
    }

    #[test]
    fn counters_only_increase() {
        let before = snapshot();
        record_rx();
        record_tx();
        record_tx_dropped();
        record_rx_error();
        let after = snapshot();

        assert!(after.frames_rx > before.frames_rx);
        assert!(after.frames_tx > before.frames_tx);
        assert!(after.tx_dropped > before.tx_dropped);
        assert!(after.rx_errors > before.rx_errors);
    }
}
