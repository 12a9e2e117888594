//! Hardware seams the control core drives.

use crate::output::OutputCodes;
use crate::sensor::SensorReading;

/// Sensor inputs and spoof outputs of one actuator board.
///
/// Implementations own the ADC pair, the dual-channel DAC, the relay that
/// switches the actuator's sensor lines between the real sensor and the DAC,
/// and an optional secondary output such as the brake-light relay.
pub trait SpoofHardware {
    /// Samples both sensor channels in one acquisition.
    fn read_sensors(&mut self) -> SensorReading;

    /// Writes both spoof channels.
    fn write_spoof(&mut self, codes: OutputCodes);

    /// Energizes (`true`) or releases the spoof relay.
    fn set_spoof_enabled(&mut self, energized: bool);

    /// Drives the secondary output; boards without one ignore the call.
    fn set_secondary_output(&mut self, _active: bool) {}
}
