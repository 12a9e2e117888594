//! Status reports, fault reports and configuration writes.

use crate::fault::{FaultBits, FaultOrigin};

use super::{
    CONFIG_WRITE_CAN_ID, CanFrame, DecodeError, FAULT_REPORT_CAN_ID, ModuleKind, prefixed,
    require_len,
};

/// Periodic status report published by each module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    pub enabled: bool,
    pub operator_override: bool,
    pub fault_bits: FaultBits,
    /// Module-specific echo of the active command.
    pub echo: [u8; 3],
}

impl Report {
    /// Byte length of a decoded report.
    pub const LEN: u8 = 8;

    /// Encodes the report on the module's report identifier.
    #[must_use]
    pub fn encode(&self, module: ModuleKind) -> CanFrame {
        let mut data = prefixed();
        data[2] = u8::from(self.enabled);
        data[3] = u8::from(self.operator_override);
        data[4] = self.fault_bits.bits();
        data[5..8].copy_from_slice(&self.echo);
        CanFrame::full(module.ids().report, data)
    }

    /// Decodes a report payload, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] for payloads shorter than eight bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, Self::LEN)?;
        let mut echo = [0; 3];
        echo.copy_from_slice(&payload[5..8]);
        Ok(Self {
            enabled: payload[2] != 0,
            operator_override: payload[3] != 0,
            fault_bits: FaultBits::from_bits(payload[4]),
            echo,
        })
    }
}

/// Fault report carrying the publishing module and its full fault bitfield.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultReport {
    pub origin: FaultOrigin,
    pub fault_bits: FaultBits,
}

impl FaultReport {
    /// Minimum payload length: prefix, `u32` origin and the fault byte.
    pub const LEN: u8 = 7;

    #[must_use]
    pub fn encode(&self) -> CanFrame {
        let mut data = prefixed();
        data[2..6].copy_from_slice(&self.origin.to_raw().to_le_bytes());
        data[6] = self.fault_bits.bits();
        CanFrame::full(FAULT_REPORT_CAN_ID, data)
    }

    /// Decodes a fault report payload, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when the payload is too short.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, Self::LEN)?;
        let origin = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        Ok(Self {
            origin: FaultOrigin::from_raw(origin),
            fault_bits: FaultBits::from_bits(payload[6]),
        })
    }
}

/// Configuration write addressed by a module-qualified identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigWrite {
    /// Wire identifier: module base plus [`crate::config::ConfigId`].
    pub raw_id: u16,
    pub value: u16,
}

impl ConfigWrite {
    /// Minimum payload length: prefix, `u16` id and `u16` value.
    pub const LEN: u8 = 6;

    #[must_use]
    pub fn encode(&self) -> CanFrame {
        let mut data = prefixed();
        data[2..4].copy_from_slice(&self.raw_id.to_le_bytes());
        data[4..6].copy_from_slice(&self.value.to_le_bytes());
        CanFrame::full(CONFIG_WRITE_CAN_ID, data)
    }

    /// Decodes a config write payload, prefix included.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when the payload is too short.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, Self::LEN)?;
        Ok(Self {
            raw_id: u16::from_le_bytes([payload[2], payload[3]]),
            value: u16::from_le_bytes([payload[4], payload[5]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAGIC;

    #[test]
    fn report_layout_matches_wire_format() {
        let report = Report {
            enabled: true,
            operator_override: false,
            fault_bits: FaultBits::OPERATOR_OVERRIDE,
            echo: [0xE8, 0x03, 0x00],
        };

        let frame = report.encode(ModuleKind::Throttle);
        assert_eq!(frame.id(), 0x93);
        assert_eq!(
            frame.payload(),
            &[MAGIC[0], MAGIC[1], 1, 0, 0b10, 0xE8, 0x03, 0x00]
        );
        assert_eq!(Report::decode(frame.payload()), Ok(report));
    }

    #[test]
    fn fault_report_carries_origin_little_endian() {
        let report = FaultReport {
            origin: FaultOrigin::Throttle,
            fault_bits: FaultBits::INVALID_SENSOR_VALUE,
        };

        let frame = report.encode();
        assert_eq!(frame.id(), FAULT_REPORT_CAN_ID);
        assert_eq!(frame.len(), 8);
        assert_eq!(&frame.payload()[2..7], &[2, 0, 0, 0, 1]);
    }

    #[test]
    fn config_write_decodes_id_and_value() {
        let payload = [MAGIC[0], MAGIC[1], 0x05, 0x03, 0xB4, 0x00];
        let write = ConfigWrite::decode(&payload).expect("decodes");
        assert_eq!(write.raw_id, 0x0305);
        assert_eq!(write.value, 180);
    }
}
