//! Serialization of [`CanFrame`] to and from the 16-byte SocketCAN wire
//! layout (`struct can_frame`), used by platform crates and trace tooling.

use crate::frame::{CanFrame, MAX_BASE_ID, MAX_EXTENDED_ID};
use crate::hal::CanOpenError;

/// Size of a serialized classic CAN frame.
pub const FRAME_WIRE_SIZE: usize = 16;

/// Extended frame format flag in the serialized identifier word.
const EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request flag in the serialized identifier word.
const RTR_FLAG: u32 = 0x4000_0000;
/// Identifier bits of the serialized identifier word.
const ID_MASK: u32 = 0x1FFF_FFFF;

/// A trait for structures that can be serialized to and deserialized from
/// a byte buffer.
pub trait Codec: Sized {
    /// Serializes the structure into the provided buffer, returning the
    /// number of bytes written.
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, CanOpenError>;

    /// Deserializes a structure from the provided buffer.
    fn deserialize(buffer: &[u8]) -> Result<Self, CanOpenError>;
}

impl Codec for CanFrame {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, CanOpenError> {
        if buffer.len() < FRAME_WIRE_SIZE {
            return Err(CanOpenError::BufferTooShort);
        }
        let mut id = self.id();
        if self.is_extended() {
            id |= EFF_FLAG;
        }
        if self.is_rtr() {
            id |= RTR_FLAG;
        }
        buffer[..4].copy_from_slice(&id.to_le_bytes());
        buffer[4] = self.len() as u8;
        buffer[5..8].fill(0);
        buffer[8..8 + self.len()].copy_from_slice(self.data());
        buffer[8 + self.len()..FRAME_WIRE_SIZE].fill(0);
        Ok(FRAME_WIRE_SIZE)
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, CanOpenError> {
        if buffer.len() < FRAME_WIRE_SIZE {
            return Err(CanOpenError::BufferTooShort);
        }
        let word = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        let id = word & ID_MASK;
        let extended = word & EFF_FLAG != 0;
        let rtr = word & RTR_FLAG != 0;
        let max_id = if extended { MAX_EXTENDED_ID } else { MAX_BASE_ID };
        if id > max_id {
            return Err(CanOpenError::InvalidCobId(id));
        }
        let len = usize::from(buffer[4]);
        if len > 8 {
            return Err(CanOpenError::InvalidDataLength(len));
        }
        log::trace!("Decoding CAN frame with COB-ID {id:#X} and {len} data bytes");
        let frame = if rtr {
            CanFrame::remote(id, len)?
        } else if extended {
            CanFrame::new_extended(id, &buffer[8..8 + len])?
        } else {
            CanFrame::new(id, &buffer[8..8 + len])?
        };
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_frame_roundtrip() {
        let frame = CanFrame::new(0x581, &[0x43, 0x00, 0x20, 0x01, 0xDE, 0xAD]).unwrap();
        let mut buffer = [0u8; FRAME_WIRE_SIZE];
        assert_eq!(frame.serialize(&mut buffer), Ok(FRAME_WIRE_SIZE));
        assert_eq!(&buffer[..4], &[0x81, 0x05, 0x00, 0x00]);
        assert_eq!(buffer[4], 6);
        assert_eq!(CanFrame::deserialize(&buffer), Ok(frame));
    }

    #[test]
    fn extended_frame_roundtrip() {
        let frame = CanFrame::new_extended(0x1234_5678, &[1, 2]).unwrap();
        let mut buffer = [0u8; FRAME_WIRE_SIZE];
        frame.serialize(&mut buffer).unwrap();
        assert_eq!(buffer[3] & 0x80, 0x80);
        assert_eq!(CanFrame::deserialize(&buffer), Ok(frame));
    }

    #[test]
    fn remote_frame_roundtrip() {
        let frame = CanFrame::remote(0x185, 4).unwrap();
        let mut buffer = [0u8; FRAME_WIRE_SIZE];
        frame.serialize(&mut buffer).unwrap();
        assert_eq!(buffer[3] & 0x40, 0x40);
        let decoded = CanFrame::deserialize(&buffer).unwrap();
        assert!(decoded.is_rtr());
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn rejects_short_buffer() {
        let frame = CanFrame::new(0x100, &[]).unwrap();
        let mut buffer = [0u8; 8];
        assert_eq!(frame.serialize(&mut buffer), Err(CanOpenError::BufferTooShort));
        assert_eq!(
            CanFrame::deserialize(&buffer),
            Err(CanOpenError::BufferTooShort)
        );
    }

    #[test]
    fn rejects_base_id_above_eleven_bits() {
        let mut buffer = [0u8; FRAME_WIRE_SIZE];
        buffer[..4].copy_from_slice(&0x800u32.to_le_bytes());
        assert_eq!(
            CanFrame::deserialize(&buffer),
            Err(CanOpenError::InvalidCobId(0x800))
        );
    }
}
