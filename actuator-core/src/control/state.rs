use core::fmt;

use crate::fault::FaultBits;
use crate::time::Ticks;

/// Externally visible safety state of one actuator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorState {
    /// Spoof outputs are connected and driven from commands.
    pub enabled: bool,
    /// The driver is physically operating the control.
    pub operator_override: bool,
    pub fault_bits: FaultBits,
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.enabled { "ENABLED" } else { "DISABLED" };
        write!(
            f,
            "{mode} override={} dtcs={}",
            self.operator_override, self.fault_bits
        )
    }
}

/// Most recently accepted command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CommandSetpoint<C> {
    pub command: C,
    pub received_at: Ticks,
}

/// Frame family that was acted on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    Enable,
    Disable,
    Command,
    FaultReport,
    ConfigWrite,
}

/// Why a frame was not acted on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IgnoreReason {
    /// No magic prefix.
    Foreign,
    /// Protocol frame for another module.
    NotAddressed,
    /// Prefix present but the payload did not decode.
    Malformed,
    /// Config write failed validation or could not be persisted.
    Rejected,
}

/// Result of [`super::ControlCore::process_frame`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameDisposition {
    Handled(FrameKind),
    Ignored(IgnoreReason),
}

impl FrameDisposition {
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Handled(_))
    }
}
