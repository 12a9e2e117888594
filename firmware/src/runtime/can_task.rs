use actuator_core::control::FrameDisposition;
use actuator_core::protocol::CanFrame;
use actuator_core::sync::Shared;
use embassy_stm32::can::frame::Frame;
use embassy_stm32::can::{CanRx, CanTx};
use embassy_time::{Duration, Timer};
use embedded_can::{Id, StandardId};

use super::{TxQueue, forward_outbound, now};
use crate::actuator::FirmwareCore;
use crate::outbound::enqueue;
use crate::status;

#[embassy_executor::task]
pub async fn receive(mut rx: CanRx<'static>, core: &'static Shared<FirmwareCore>) -> ! {
    defmt::info!("can: receive task started");
    loop {
        let envelope = match rx.read().await {
            Ok(envelope) => envelope,
            Err(err) => {
                status::record_rx_error();
                defmt::warn!("can: receive error {:?}", defmt::Debug2Format(&err));
                Timer::after(Duration::from_millis(1)).await;
                continue;
            }
        };

        let Some(frame) = to_core_frame(&envelope.frame) else {
            continue;
        };
        status::record_rx();

        let disposition = core.with(|core| {
            let disposition = core.process_frame(&frame, now());
            forward_outbound(core);
            disposition
        });
        if let FrameDisposition::Ignored(reason) = disposition {
            defmt::trace!("can: ignored id={=u16:#x} {}", frame.id(), reason);
        }
    }
}

#[embassy_executor::task]
pub async fn transmit(mut tx: CanTx<'static>, queue: &'static TxQueue) -> ! {
    loop {
        let frame = queue.receive().await;
        match to_bus_frame(&frame) {
            Some(bus_frame) => {
                let displaced = tx.write(&bus_frame).await;
                status::record_tx();
                // A full mailbox evicts its lowest-priority pending frame.
                if let Some(frame) = displaced.as_ref().and_then(to_core_frame)
                    && !enqueue(queue, frame)
                {
                    defmt::warn!("can: displaced frame dropped id={=u16:#x}", frame.id());
                }
            }
            None => defmt::warn!("can: unencodable frame id={=u16:#x}", frame.id()),
        }
    }
}

/// Converts a received frame; extended identifiers are not part of the protocol.
fn to_core_frame(frame: &Frame) -> Option<CanFrame> {
    match frame.header().id() {
        Id::Standard(id) => CanFrame::new(id.as_raw(), frame.data()).ok(),
        Id::Extended(_) => None,
    }
}

fn to_bus_frame(frame: &CanFrame) -> Option<Frame> {
    let id = StandardId::new(frame.id())?;
    Frame::new_data(Id::Standard(id), frame.payload()).ok()
}
