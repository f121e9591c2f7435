//! Raw CAN frame representation.

pub mod codec;

use crate::hal::CanOpenError;
use core::fmt;

/// Highest 11-bit (base format) CAN identifier.
pub const MAX_BASE_ID: u32 = 0x7FF;
/// Highest 29-bit (extended format) CAN identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// A classic CAN 2.0 frame: up to 8 data bytes.
///
/// Data bytes beyond `len()` are always zero, so frames compare equal
/// whenever their wire representations would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    rtr: bool,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Creates a base format (11-bit identifier) data frame.
    pub fn new(id: u32, data: &[u8]) -> Result<Self, CanOpenError> {
        if id > MAX_BASE_ID {
            return Err(CanOpenError::InvalidCobId(id));
        }
        Self::build(id, false, data)
    }

    /// Creates an extended format (29-bit identifier) data frame.
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, CanOpenError> {
        if id > MAX_EXTENDED_ID {
            return Err(CanOpenError::InvalidCobId(id));
        }
        Self::build(id, true, data)
    }

    /// Creates a base format remote transmission request for `len` bytes.
    pub fn remote(id: u32, len: usize) -> Result<Self, CanOpenError> {
        if id > MAX_BASE_ID {
            return Err(CanOpenError::InvalidCobId(id));
        }
        if len > 8 {
            return Err(CanOpenError::InvalidDataLength(len));
        }
        Ok(CanFrame {
            id,
            extended: false,
            rtr: true,
            dlc: len as u8,
            data: [0u8; 8],
        })
    }

    fn build(id: u32, extended: bool, data: &[u8]) -> Result<Self, CanOpenError> {
        if data.len() > 8 {
            return Err(CanOpenError::InvalidDataLength(data.len()));
        }
        let mut payload = [0u8; 8];
        payload[..data.len()].copy_from_slice(data);
        Ok(CanFrame {
            id,
            extended,
            rtr: false,
            dlc: data.len() as u8,
            data: payload,
        })
    }

    /// Creates an 8-byte SDO frame. SDO COB-IDs are derived from validated
    /// node ids and are always within the base format range.
    pub(crate) fn sdo(cob_id: u32, payload: [u8; 8]) -> Self {
        CanFrame {
            id: cob_id,
            extended: false,
            rtr: false,
            dlc: 8,
            data: payload,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn is_rtr(&self) -> bool {
        self.rtr
    }

    pub fn len(&self) -> usize {
        usize::from(self.dlc)
    }

    pub fn is_empty(&self) -> bool {
        self.dlc == 0
    }

    /// The data bytes, truncated to the frame's length.
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc)]
    }

    /// The full 8-byte payload buffer regardless of length. SDO frames
    /// always carry 8 bytes, so the protocol layer decodes from this.
    pub(crate) fn payload(&self) -> &[u8; 8] {
        &self.data
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X} [{}]", self.id, self.dlc)?;
        if self.rtr {
            // A remote frame requests data; dlc is a length hint only.
            return write!(f, " // RTR");
        }
        for (i, byte) in self.data().iter().enumerate() {
            if i == 0 {
                write!(f, " {byte:02X}")?;
            } else {
                write!(f, ".{byte:02X}")?;
            }
        }
        Ok(())
    }
}
