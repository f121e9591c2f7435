//! SDO abort protocol: reason codes and the abort frame itself.

use core::fmt;

/// Reason codes carried by SDO abort frames (CiA 301, Section 7.2.4.3.17).
///
/// Codes not listed in the standard survive round-trips through the
/// [`Unknown`](AbortCode::Unknown) variant instead of being rejected; an
/// unfamiliar reason must still terminate the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCode {
    /// Toggle bit not alternated.
    ToggleBitInvalid,
    /// SDO protocol timed out.
    Timeout,
    /// Client/server command specifier not valid or unknown.
    SpecifierInvalid,
    /// Invalid block size (block mode only).
    BlockSizeInvalid,
    /// Invalid sequence number (block mode only).
    SequenceNumberInvalid,
    /// CRC error (block mode only).
    CrcError,
    /// Out of memory.
    OutOfMemory,
    /// Unsupported access to an object.
    UnsupportedAccess,
    /// Attempt to read a write only object.
    WriteOnlyAccess,
    /// Attempt to write a read only object.
    ReadOnlyAccess,
    /// Object does not exist in the object dictionary.
    SelectorInvalid,
    /// Object cannot be mapped to the PDO.
    CannotMapToPdo,
    /// Mapped objects would exceed the PDO length.
    PdoLengthExceeded,
    /// General parameter incompatibility.
    ParameterIncompatible,
    /// General internal incompatibility in the device.
    InternalIncompatibility,
    /// Access failed due to a hardware error.
    HardwareError,
    /// Data type does not match, length of service parameter does not match.
    LengthMismatch,
    /// Length of service parameter too high.
    LengthTooHigh,
    /// Length of service parameter too low.
    LengthTooLow,
    /// Sub-index does not exist.
    SubIndexInvalid,
    /// Invalid value for parameter.
    ValueInvalid,
    /// Value of parameter written too high.
    ValueTooHigh,
    /// Value of parameter written too low.
    ValueTooLow,
    /// Maximum value is less than minimum value.
    MaxLessThanMin,
    /// Resource not available: SDO connection.
    ResourceUnavailable,
    /// General error.
    GeneralError,
    /// Data cannot be transferred or stored to the application.
    StorageError,
    /// Data cannot be transferred or stored because of local control.
    LocalControl,
    /// Data cannot be transferred or stored in the present device state.
    DeviceState,
    /// Object dictionary dynamic generation failed or no dictionary present.
    DictionaryError,
    /// No data available.
    DataUnavailable,
    /// A reason code outside the standard table.
    Unknown(u32),
}

impl AbortCode {
    /// The 32-bit reason as it appears on the wire.
    pub fn code(&self) -> u32 {
        match self {
            AbortCode::ToggleBitInvalid => 0x0503_0000,
            AbortCode::Timeout => 0x0504_0000,
            AbortCode::SpecifierInvalid => 0x0504_0001,
            AbortCode::BlockSizeInvalid => 0x0504_0002,
            AbortCode::SequenceNumberInvalid => 0x0504_0003,
            AbortCode::CrcError => 0x0504_0004,
            AbortCode::OutOfMemory => 0x0504_0005,
            AbortCode::UnsupportedAccess => 0x0601_0000,
            AbortCode::WriteOnlyAccess => 0x0601_0001,
            AbortCode::ReadOnlyAccess => 0x0601_0002,
            AbortCode::SelectorInvalid => 0x0602_0000,
            AbortCode::CannotMapToPdo => 0x0604_0041,
            AbortCode::PdoLengthExceeded => 0x0604_0042,
            AbortCode::ParameterIncompatible => 0x0604_0043,
            AbortCode::InternalIncompatibility => 0x0604_0047,
            AbortCode::HardwareError => 0x0606_0000,
            AbortCode::LengthMismatch => 0x0607_0010,
            AbortCode::LengthTooHigh => 0x0607_0012,
            AbortCode::LengthTooLow => 0x0607_0013,
            AbortCode::SubIndexInvalid => 0x0609_0011,
            AbortCode::ValueInvalid => 0x0609_0030,
            AbortCode::ValueTooHigh => 0x0609_0031,
            AbortCode::ValueTooLow => 0x0609_0032,
            AbortCode::MaxLessThanMin => 0x0609_0036,
            AbortCode::ResourceUnavailable => 0x060A_0023,
            AbortCode::GeneralError => 0x0800_0000,
            AbortCode::StorageError => 0x0800_0020,
            AbortCode::LocalControl => 0x0800_0021,
            AbortCode::DeviceState => 0x0800_0022,
            AbortCode::DictionaryError => 0x0800_0023,
            AbortCode::DataUnavailable => 0x0800_0024,
            AbortCode::Unknown(code) => *code,
        }
    }

    /// Maps a wire reason back onto the table.
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0503_0000 => AbortCode::ToggleBitInvalid,
            0x0504_0000 => AbortCode::Timeout,
            0x0504_0001 => AbortCode::SpecifierInvalid,
            0x0504_0002 => AbortCode::BlockSizeInvalid,
            0x0504_0003 => AbortCode::SequenceNumberInvalid,
            0x0504_0004 => AbortCode::CrcError,
            0x0504_0005 => AbortCode::OutOfMemory,
            0x0601_0000 => AbortCode::UnsupportedAccess,
            0x0601_0001 => AbortCode::WriteOnlyAccess,
            0x0601_0002 => AbortCode::ReadOnlyAccess,
            0x0602_0000 => AbortCode::SelectorInvalid,
            0x0604_0041 => AbortCode::CannotMapToPdo,
            0x0604_0042 => AbortCode::PdoLengthExceeded,
            0x0604_0043 => AbortCode::ParameterIncompatible,
            0x0604_0047 => AbortCode::InternalIncompatibility,
            0x0606_0000 => AbortCode::HardwareError,
            0x0607_0010 => AbortCode::LengthMismatch,
            0x0607_0012 => AbortCode::LengthTooHigh,
            0x0607_0013 => AbortCode::LengthTooLow,
            0x0609_0011 => AbortCode::SubIndexInvalid,
            0x0609_0030 => AbortCode::ValueInvalid,
            0x0609_0031 => AbortCode::ValueTooHigh,
            0x0609_0032 => AbortCode::ValueTooLow,
            0x0609_0036 => AbortCode::MaxLessThanMin,
            0x060A_0023 => AbortCode::ResourceUnavailable,
            0x0800_0000 => AbortCode::GeneralError,
            0x0800_0020 => AbortCode::StorageError,
            0x0800_0021 => AbortCode::LocalControl,
            0x0800_0022 => AbortCode::DeviceState,
            0x0800_0023 => AbortCode::DictionaryError,
            0x0800_0024 => AbortCode::DataUnavailable,
            other => AbortCode::Unknown(other),
        }
    }
}

impl fmt::Display for AbortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortCode::ToggleBitInvalid => "Toggle bit not alternated",
            AbortCode::Timeout => "SDO protocol timed out",
            AbortCode::SpecifierInvalid => "Command specifier not valid or unknown",
            AbortCode::BlockSizeInvalid => "Invalid block size",
            AbortCode::SequenceNumberInvalid => "Invalid sequence number",
            AbortCode::CrcError => "CRC error",
            AbortCode::OutOfMemory => "Out of memory",
            AbortCode::UnsupportedAccess => "Unsupported access to an object",
            AbortCode::WriteOnlyAccess => "Attempt to read a write only object",
            AbortCode::ReadOnlyAccess => "Attempt to write a read only object",
            AbortCode::SelectorInvalid => "Object does not exist in the object dictionary",
            AbortCode::CannotMapToPdo => "Object cannot be mapped to the PDO",
            AbortCode::PdoLengthExceeded => "Mapped objects would exceed the PDO length",
            AbortCode::ParameterIncompatible => "General parameter incompatibility",
            AbortCode::InternalIncompatibility => "General internal incompatibility",
            AbortCode::HardwareError => "Access failed due to a hardware error",
            AbortCode::LengthMismatch => "Length of service parameter does not match",
            AbortCode::LengthTooHigh => "Length of service parameter too high",
            AbortCode::LengthTooLow => "Length of service parameter too low",
            AbortCode::SubIndexInvalid => "Sub-index does not exist",
            AbortCode::ValueInvalid => "Invalid value for parameter",
            AbortCode::ValueTooHigh => "Value of parameter written too high",
            AbortCode::ValueTooLow => "Value of parameter written too low",
            AbortCode::MaxLessThanMin => "Maximum value is less than minimum value",
            AbortCode::ResourceUnavailable => "Resource not available",
            AbortCode::GeneralError => "General error",
            AbortCode::StorageError => "Data cannot be transferred or stored",
            AbortCode::LocalControl => "Data transfer blocked by local control",
            AbortCode::DeviceState => "Data transfer blocked by device state",
            AbortCode::DictionaryError => "Object dictionary not present or generation failed",
            AbortCode::DataUnavailable => "No data available",
            AbortCode::Unknown(code) => return write!(f, "Unknown abort code {code:#010X}"),
        };
        write!(f, "{text} ({:#010X})", self.code())
    }
}
