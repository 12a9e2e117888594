//! Panics log the message and reset the MCU.
//!
//! Reset returns every GPIO to its input state, which drops the spoof relay
//! and hands the actuator back to the driver before the firmware boots again
//! in the disabled state.

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    defmt::error!("panic: {}", defmt::Display2Format(info));
    cortex_m::peripheral::SCB::sys_reset();
}
