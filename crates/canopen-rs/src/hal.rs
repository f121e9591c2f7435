//! Hardware abstraction layer for CAN bus access.
//!
//! The protocol engines in this crate never touch an actual bus driver.
//! They are generic over [`CanInterface`], which a platform crate (SocketCAN,
//! an embedded CAN peripheral, a virtual bus for tests) implements.

use crate::frame::CanFrame;
use crate::types::NodeIdError;
use core::fmt;

/// Errors that can occur within the transport and codec layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanOpenError {
    /// A provided buffer was too small for the serialized representation.
    BufferTooShort,
    /// The underlying bus driver reported a transmit or receive failure.
    IoError,
    /// The underlying bus is gone and no further frames can be exchanged.
    Disconnected,
    /// A CAN identifier outside the addressable range for its frame format.
    InvalidCobId(u32),
    /// A CAN data length outside 0-8.
    InvalidDataLength(usize),
    /// A node id outside the valid range (1-127).
    InvalidNodeId(u8),
    /// An SDO command byte whose specifier does not name a known service.
    InvalidCommandSpecifier(u8),
    /// A block segment carrying sequence number zero.
    InvalidSequenceNumber(u8),
}

impl fmt::Display for CanOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanOpenError::BufferTooShort => write!(f, "Buffer too short"),
            CanOpenError::IoError => write!(f, "Bus I/O error"),
            CanOpenError::Disconnected => write!(f, "Bus disconnected"),
            CanOpenError::InvalidCobId(id) => write!(f, "Invalid COB-ID: {id:#X}"),
            CanOpenError::InvalidDataLength(len) => {
                write!(f, "Invalid CAN data length: {len}")
            }
            CanOpenError::InvalidNodeId(id) => write!(f, "Invalid node id: {id}"),
            CanOpenError::InvalidCommandSpecifier(byte) => {
                write!(f, "Invalid SDO command specifier in byte {byte:#04X}")
            }
            CanOpenError::InvalidSequenceNumber(seq) => {
                write!(f, "Invalid block sequence number: {seq}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CanOpenError {}

impl From<NodeIdError> for CanOpenError {
    fn from(error: NodeIdError) -> Self {
        match error {
            NodeIdError::InvalidRange(value) => CanOpenError::InvalidNodeId(value),
        }
    }
}

/// Abstraction over a CAN bus endpoint.
///
/// Implementations queue received frames internally; [`wait`] blocks until at
/// least one frame is available (or the timeout elapses), after which
/// [`receive_frame`] must return it without blocking.
///
/// [`wait`]: CanInterface::wait
/// [`receive_frame`]: CanInterface::receive_frame
pub trait CanInterface {
    /// Transmits a single frame.
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanOpenError>;

    /// Takes the next pending frame off the receive queue.
    ///
    /// Returns [`CanOpenError::IoError`] when no frame is pending.
    fn receive_frame(&mut self) -> Result<CanFrame, CanOpenError>;

    /// Blocks until a frame is pending or `timeout_ms` milliseconds elapse.
    ///
    /// Returns `true` when a frame is ready.
    fn wait(&mut self, timeout_ms: u32) -> bool;
}
