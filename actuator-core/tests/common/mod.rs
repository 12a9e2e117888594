#![allow(dead_code)]

use actuator_core::actuator::Actuator;
use actuator_core::config::{ConfigId, ConfigStore, MemoryConfigStore};
use actuator_core::control::ControlCore;
use actuator_core::hardware::SpoofHardware;
use actuator_core::output::OutputCodes;
use actuator_core::protocol::CanFrame;
use actuator_core::scheduler::FrameSource;
use actuator_core::sensor::SensorReading;
use actuator_core::telemetry::ControlEvent;
use actuator_core::time::Ticks;
use heapless::{Deque, Vec as HeaplessVec};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    Write(OutputCodes),
    Relay(bool),
    Secondary(bool),
}

/// Board double that replays a settable reading and records every call.
pub struct BenchHardware {
    pub reading: SensorReading,
    pub ops: HeaplessVec<Op, 512>,
    pub relay: bool,
    pub secondary: bool,
}

impl BenchHardware {
    pub fn new(reading: SensorReading) -> Self {
        Self {
            reading,
            ops: HeaplessVec::new(),
            relay: false,
            secondary: false,
        }
    }

    pub fn relay_changes(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Relay(_)))
            .count()
    }

    fn log(&mut self, op: Op) {
        let _ = self.ops.push(op);
    }
}

impl SpoofHardware for BenchHardware {
    fn read_sensors(&mut self) -> SensorReading {
        self.log(Op::Read);
        self.reading
    }

    fn write_spoof(&mut self, codes: OutputCodes) {
        self.log(Op::Write(codes));
    }

    fn set_spoof_enabled(&mut self, energized: bool) {
        self.relay = energized;
        self.log(Op::Relay(energized));
    }

    fn set_secondary_output(&mut self, active: bool) {
        self.secondary = active;
        self.log(Op::Secondary(active));
    }
}

/// Store that refuses every write once `fail` is set.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryConfigStore,
    pub fail: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WriteRefused;

impl ConfigStore for FlakyStore {
    type Error = WriteRefused;

    fn read(&self, id: ConfigId) -> u16 {
        self.inner.read(id)
    }

    fn write(&mut self, id: ConfigId, value: u16) -> Result<(), WriteRefused> {
        if self.fail {
            return Err(WriteRefused);
        }
        self.inner
            .write(id, value)
            .map_err(|never| match never {})
    }
}

/// Queue of frames standing in for the CAN receive FIFO.
#[derive(Default)]
pub struct BusQueue {
    pub frames: Deque<CanFrame, 16>,
}

impl BusQueue {
    pub fn push(&mut self, frame: CanFrame) {
        self.frames
            .push_back(frame)
            .expect("bus queue has room");
    }
}

impl FrameSource for BusQueue {
    fn try_receive(&mut self) -> Option<CanFrame> {
        self.frames.pop_front()
    }
}

pub fn ms(value: u32) -> Ticks {
    Ticks::from_millis(value)
}

pub fn build<A: Actuator>(actuator: A, reading: SensorReading) -> ControlCore<A, BenchHardware, MemoryConfigStore> {
    ControlCore::new(actuator, BenchHardware::new(reading), MemoryConfigStore::new(), ms(0))
        .expect("memory store never fails")
}

pub fn drain_outbound<A, S>(core: &mut ControlCore<A, BenchHardware, S>) -> HeaplessVec<CanFrame, 16>
where
    A: Actuator,
    S: ConfigStore,
{
    let mut frames = HeaplessVec::new();
    while let Some(frame) = core.pop_outbound() {
        frames.push(frame).expect("outbox fits");
    }
    frames
}

pub fn count_events<A, S>(core: &ControlCore<A, BenchHardware, S>, predicate: impl Fn(&ControlEvent) -> bool) -> usize
where
    A: Actuator,
    S: ConfigStore,
{
    core.events()
        .iter()
        .filter(|record| predicate(&record.event))
        .count()
}
