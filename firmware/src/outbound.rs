#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Hand-off of outbound frames to the CAN transmit queue.

use actuator_core::protocol::CanFrame;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::status;

/// Queues `frame` for transmission, counting it as dropped when the queue is full.
///
/// Returns `true` when the frame was queued.
pub fn enqueue<M: RawMutex, const N: usize>(queue: &Channel<M, CanFrame, N>, frame: CanFrame) -> bool {
    if queue.try_send(frame).is_ok() {
        return true;
    }
    status::record_tx_dropped();
    false
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    fn frame(id: u16) -> CanFrame {
        CanFrame::new(id, &[0x05, 0xCC]).expect("valid frame")
    }

    #[test]
    fn full_queue_counts_the_drop() {
        let queue: Channel<NoopRawMutex, CanFrame, 1> = Channel::new();
        let before = status::snapshot().tx_dropped;

        assert!(enqueue(&queue, frame(0x073)));
        assert!(!enqueue(&queue, frame(0x074)));

        assert!(status::snapshot().tx_dropped > before);
        assert_eq!(queue.try_receive().ok().map(|queued| queued.id()), Some(0x073));
    }

    #[test]
    fn displaced_frame_goes_back_in_line() {
        let queue: Channel<NoopRawMutex, CanFrame, 2> = Channel::new();
        assert!(enqueue(&queue, frame(0x073)));
        let displaced = queue.try_receive().expect("queued");

        assert!(enqueue(&queue, frame(0x0A0)));
        assert!(enqueue(&queue, displaced));

        assert_eq!(queue.try_receive().ok().map(|queued| queued.id()), Some(0x0A0));
        assert_eq!(queue.try_receive().ok().map(|queued| queued.id()), Some(0x073));
    }
}
