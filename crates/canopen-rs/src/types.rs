use core::fmt;
use core::str::FromStr;

// --- Protocol Constants (CiA 301, Section 7.3.3) ---

/// Base CAN-ID for SDO requests (client -> server): `0x600 + node id`.
pub const SDO_REQUEST_BASE: u32 = 0x600;

/// Base CAN-ID for SDO replies (server -> client): `0x580 + node id`.
pub const SDO_REPLY_BASE: u32 = 0x580;

/// Highest valid CANopen node id.
pub const MAX_NODE_ID: u8 = 0x7F;

/// Represents a CANopen node id, wrapping a `u8` to ensure type safety.
///
/// Valid node ids are in the range 1-127. The newtype prevents accidental
/// use of an out-of-range `u8` where a node id is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u8);

/// Error type for invalid node id creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdError {
    /// Node id is outside the valid range (1-127).
    InvalidRange(u8),
}

impl NodeId {
    /// Creates a validated node id.
    pub fn new(value: u8) -> Result<Self, NodeIdError> {
        if value == 0 || value > MAX_NODE_ID {
            return Err(NodeIdError::InvalidRange(value));
        }
        Ok(NodeId(value))
    }

    /// Provides read-only access to the underlying value.
    pub fn get(&self) -> u8 {
        self.0
    }

    /// CAN-ID this node listens on for SDO requests.
    pub fn request_cob_id(&self) -> u32 {
        SDO_REQUEST_BASE + u32::from(self.0)
    }

    /// CAN-ID this node sends SDO replies on.
    pub fn reply_cob_id(&self) -> u32 {
        SDO_REPLY_BASE + u32::from(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIdError::InvalidRange(value) => {
                write!(f, "Invalid node id value: {value}. Valid range is 1-127.")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeIdError {}

/// Addresses one entry of a device's object dictionary: a 16-bit index
/// plus an 8-bit sub-index.
///
/// The canonical text form is `"IIII:SS"` (4 + 2 hex digits), e.g.
/// `1017:00` for the heartbeat producer time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector {
    pub index: u16,
    pub sub_index: u8,
}

impl Selector {
    pub fn new(index: u16, sub_index: u8) -> Self {
        Selector { index, sub_index }
    }

    /// Reads a selector from payload bytes 1-3 of an SDO initiate or abort
    /// frame (little-endian index followed by the sub-index).
    pub fn from_payload(data: &[u8; 8]) -> Self {
        Selector {
            index: u16::from_le_bytes([data[1], data[2]]),
            sub_index: data[3],
        }
    }

    /// Writes the selector into payload bytes 1-3 of an SDO frame.
    pub fn write_payload(&self, data: &mut [u8; 8]) {
        let [lo, hi] = self.index.to_le_bytes();
        data[1] = lo;
        data[2] = hi;
        data[3] = self.sub_index;
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:02X}", self.index, self.sub_index)
    }
}

/// Error type for selector text parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorParseError;

impl fmt::Display for SelectorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector text form must be \"IIII:SS\" (hexadecimal)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SelectorParseError {}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, sub_index) = s.split_once(':').ok_or(SelectorParseError)?;
        if index.len() != 4 || sub_index.len() != 2 {
            return Err(SelectorParseError);
        }
        Ok(Selector {
            index: u16::from_str_radix(index, 16).map_err(|_| SelectorParseError)?,
            sub_index: u8::from_str_radix(sub_index, 16).map_err(|_| SelectorParseError)?,
        })
    }
}

/// The three SDO transfer modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Single frame, up to 4 data bytes embedded in the initiate message.
    Expedited,
    /// One 7-byte segment per request/reply round-trip, alternating toggle bits.
    Segmented,
    /// Up to 127 back-to-back segments per acknowledgement, optionally
    /// CRC-validated.
    Block,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Expedited => write!(f, "expedited"),
            TransferMode::Segmented => write!(f, "segmented"),
            TransferMode::Block => write!(f, "block"),
        }
    }
}
