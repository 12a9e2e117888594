#![no_std]

// Portable control logic shared by the actuator firmware and the bench emulator.
//
// Nothing in here touches hardware directly: sensors, the spoof DAC, relays and
// persistent storage are reached through the traits in `hardware` and `config`,
// so every safety decision can be exercised on the host.

pub mod actuator;
pub mod config;
pub mod control;
pub mod fault;
pub mod hardware;
pub mod output;
pub mod overrides;
pub mod protocol;
pub mod scheduler;
pub mod sensor;
pub mod sync;
pub mod telemetry;
pub mod time;
