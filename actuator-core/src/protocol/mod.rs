//! Fixed 8-byte CAN frame family spoken by every actuator module.
//!
//! Each payload starts with a two-byte magic prefix. Frames that lack it belong
//! to some other system sharing the bus and are classified as [`Inbound::Foreign`]
//! rather than reported as errors. Everything after the prefix is little endian.

pub mod command;
pub mod report;

use core::fmt;

use crate::fault::FaultOrigin;

pub use command::{PedalCommand, SteeringCommand};
pub use report::{ConfigWrite, FaultReport, Report};

/// Sync prefix carried in the first two payload bytes.
pub const MAGIC: [u8; 2] = [0x05, 0xCC];

/// Maximum classic CAN payload length.
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Highest 11-bit standard identifier.
pub const MAX_STANDARD_ID: u16 = 0x7FF;

/// Identifier shared by fault reports from every module.
pub const FAULT_REPORT_CAN_ID: u16 = 0xAF;

/// Identifier for configuration writes addressed to any module.
pub const CONFIG_WRITE_CAN_ID: u16 = 0xF0;

/// Errors raised while constructing a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Identifier does not fit in 11 bits.
    InvalidId(u16),
    /// Payload exceeds eight bytes.
    PayloadTooLong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "identifier {id:#x} exceeds 11 bits"),
            Self::PayloadTooLong(len) => write!(f, "payload of {len} bytes exceeds {MAX_PAYLOAD_LEN}"),
        }
    }
}

/// Errors raised while decoding a payload that did carry the magic prefix.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload is shorter than the message layout requires.
    Truncated { expected: u8, actual: u8 },
    /// A floating point field was NaN or infinite.
    NonFinite,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { expected, actual } => {
                write!(f, "payload truncated: expected {expected} bytes, got {actual}")
            }
            Self::NonFinite => f.write_str("non-finite floating point field"),
        }
    }
}

/// Single standard-id CAN frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    id: u16,
    len: u8,
    data: [u8; MAX_PAYLOAD_LEN],
}

impl CanFrame {
    /// Builds a frame from an identifier and up to eight payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the identifier is not a standard id or the
    /// payload is longer than eight bytes.
    pub fn new(id: u16, payload: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_STANDARD_ID {
            return Err(FrameError::InvalidId(id));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);
        #[allow(clippy::cast_possible_truncation)]
        let len = payload.len() as u8;
        Ok(Self { id, len, data })
    }

    /// Builds a full-length frame; callers own the identifier range.
    pub(crate) const fn full(id: u16, data: [u8; MAX_PAYLOAD_LEN]) -> Self {
        Self {
            id,
            len: MAX_PAYLOAD_LEN as u8,
            data,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the valid payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Returns `true` when the payload starts with [`MAGIC`].
    #[must_use]
    pub fn has_magic(&self) -> bool {
        self.payload().starts_with(&MAGIC)
    }
}

/// CAN identifiers owned by one actuator module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleIds {
    pub enable: u16,
    pub disable: u16,
    pub command: u16,
    pub report: u16,
}

/// Actuator module variants sharing the bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleKind {
    Brake,
    Steering,
    Throttle,
}

impl ModuleKind {
    /// Identifiers the module listens on and reports with.
    #[must_use]
    pub const fn ids(self) -> ModuleIds {
        let base = match self {
            Self::Brake => 0x70,
            Self::Steering => 0x80,
            Self::Throttle => 0x90,
        };
        ModuleIds {
            enable: base,
            disable: base + 1,
            command: base + 2,
            report: base + 3,
        }
    }

    /// Origin identifier stamped on this module's fault reports.
    #[must_use]
    pub const fn fault_origin(self) -> FaultOrigin {
        match self {
            Self::Brake => FaultOrigin::Brake,
            Self::Steering => FaultOrigin::Steering,
            Self::Throttle => FaultOrigin::Throttle,
        }
    }

    /// Base added to [`crate::config::ConfigId`] values on the wire.
    #[must_use]
    pub const fn config_base(self) -> u16 {
        match self {
            Self::Brake => 0x0100,
            Self::Steering => 0x0200,
            Self::Throttle => 0x0300,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Brake => "brake",
            Self::Steering => "steering",
            Self::Throttle => "throttle",
        }
    }

    /// Returns `true` for modules that drive a secondary output (brake lights).
    #[must_use]
    pub const fn has_secondary_output(self) -> bool {
        matches!(self, Self::Brake)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification of a received frame from one module's point of view.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Inbound<'a> {
    Enable,
    Disable,
    /// Module-specific command; the slice is the whole payload, prefix included.
    Command(&'a [u8]),
    FaultReport(FaultReport),
    ConfigWrite(ConfigWrite),
    /// Frame without the magic prefix.
    Foreign,
    /// Protocol frame addressed to somebody else.
    Unhandled,
}

/// Validates the magic prefix and dispatches by identifier.
///
/// # Errors
///
/// Returns [`DecodeError`] when a frame addressed to this module carries the
/// prefix but its fixed-layout payload is too short to decode.
pub fn classify(frame: &CanFrame, module: ModuleKind) -> Result<Inbound<'_>, DecodeError> {
    if !frame.has_magic() {
        return Ok(Inbound::Foreign);
    }

    let ids = module.ids();
    let inbound = match frame.id() {
        id if id == ids.enable => Inbound::Enable,
        id if id == ids.disable => Inbound::Disable,
        id if id == ids.command => Inbound::Command(frame.payload()),
        FAULT_REPORT_CAN_ID => Inbound::FaultReport(FaultReport::decode(frame.payload())?),
        CONFIG_WRITE_CAN_ID => Inbound::ConfigWrite(ConfigWrite::decode(frame.payload())?),
        _ => Inbound::Unhandled,
    };
    Ok(inbound)
}

/// Builds an enable request for `module`.
#[must_use]
pub const fn encode_enable(module: ModuleKind) -> CanFrame {
    CanFrame::full(module.ids().enable, prefixed())
}

/// Builds a disable request for `module`.
#[must_use]
pub const fn encode_disable(module: ModuleKind) -> CanFrame {
    CanFrame::full(module.ids().disable, prefixed())
}

/// Returns a zeroed payload that already carries the magic prefix.
pub(crate) const fn prefixed() -> [u8; MAX_PAYLOAD_LEN] {
    let mut data = [0; MAX_PAYLOAD_LEN];
    data[0] = MAGIC[0];
    data[1] = MAGIC[1];
    data
}

/// Ensures `payload` holds at least `expected` bytes.
pub(crate) fn require_len(payload: &[u8], expected: u8) -> Result<(), DecodeError> {
    if payload.len() < usize::from(expected) {
        #[allow(clippy::cast_possible_truncation)]
        let actual = payload.len() as u8;
        return Err(DecodeError::Truncated { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_without_prefix_are_foreign() {
        let frame = CanFrame::new(0x92, &[0x00, 0x00, 0x10]).expect("valid frame");
        assert_eq!(classify(&frame, ModuleKind::Throttle), Ok(Inbound::Foreign));

        let short = CanFrame::new(0x90, &[MAGIC[0]]).expect("valid frame");
        assert_eq!(classify(&short, ModuleKind::Throttle), Ok(Inbound::Foreign));
    }

    #[test]
    fn enable_is_routed_only_to_its_module() {
        let frame = encode_enable(ModuleKind::Brake);
        assert_eq!(classify(&frame, ModuleKind::Brake), Ok(Inbound::Enable));
        assert_eq!(classify(&frame, ModuleKind::Throttle), Ok(Inbound::Unhandled));
    }

    #[test]
    fn enable_accepts_bare_prefix() {
        let frame = CanFrame::new(0x80, &MAGIC).expect("valid frame");
        assert_eq!(classify(&frame, ModuleKind::Steering), Ok(Inbound::Enable));
    }

    #[test]
    fn truncated_fault_report_is_a_decode_error() {
        let frame = CanFrame::new(FAULT_REPORT_CAN_ID, &[MAGIC[0], MAGIC[1], 1]).expect("valid frame");
        assert_eq!(
            classify(&frame, ModuleKind::Throttle),
            Err(DecodeError::Truncated {
                expected: 7,
                actual: 3
            })
        );
    }

    #[test]
    fn rejects_extended_ids_and_long_payloads() {
        assert_eq!(CanFrame::new(0x800, &[]), Err(FrameError::InvalidId(0x800)));
        assert_eq!(
            CanFrame::new(0x10, &[0; 9]),
            Err(FrameError::PayloadTooLong(9))
        );
    }
}
