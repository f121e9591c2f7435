//! Service Data Object (SDO) transfer engine.
//!
//! Implements the CiA 301 SDO services over classic CAN: expedited and
//! segmented transfers plus block transfers with CRC validation. The
//! [`SdoClient`] drives transfers against a remote node; the [`SdoServer`]
//! answers them out of an [`ObjectStore`](crate::od::ObjectStore).

pub mod abort;
pub mod client;
pub mod command;
pub mod server;

pub use abort::AbortCode;
pub use client::{SdoClient, TransferError};
pub use command::{BlockSegment, InitiateData, SdoReply, SdoRequest};
pub use server::SdoServer;

// --- Command byte layout (CiA 301, Section 7.2.4) ---

// Client command specifiers, already shifted into bits 7-5.
pub(crate) const CCS_DOWNLOAD_SEGMENT: u8 = 0 << 5;
pub(crate) const CCS_INITIATE_DOWNLOAD: u8 = 1 << 5;
pub(crate) const CCS_INITIATE_UPLOAD: u8 = 2 << 5;
pub(crate) const CCS_UPLOAD_SEGMENT: u8 = 3 << 5;
pub(crate) const CCS_ABORT: u8 = 4 << 5;
pub(crate) const CCS_BLOCK_UPLOAD: u8 = 5 << 5;
pub(crate) const CCS_BLOCK_DOWNLOAD: u8 = 6 << 5;

// Server command specifiers, already shifted into bits 7-5.
pub(crate) const SCS_UPLOAD_SEGMENT: u8 = 0 << 5;
pub(crate) const SCS_DOWNLOAD_SEGMENT: u8 = 1 << 5;
pub(crate) const SCS_INITIATE_UPLOAD: u8 = 2 << 5;
pub(crate) const SCS_INITIATE_DOWNLOAD: u8 = 3 << 5;
pub(crate) const SCS_ABORT: u8 = 4 << 5;
pub(crate) const SCS_BLOCK_DOWNLOAD: u8 = 5 << 5;
pub(crate) const SCS_BLOCK_UPLOAD: u8 = 6 << 5;

pub(crate) const SPECIFIER_MASK: u8 = 0xE0;

// Initiate flags.
pub(crate) const EXPEDITED: u8 = 0x02;
pub(crate) const SIZE_SPECIFIED: u8 = 0x01;

// Segment flags.
pub(crate) const TOGGLE: u8 = 0x10;
pub(crate) const LAST_SEGMENT: u8 = 0x01;

// Block transfer flags and sub-commands (bits 1-0 of the command byte).
pub(crate) const CRC_SUPPORTED: u8 = 0x04;
pub(crate) const LAST_BLOCK: u8 = 0x80;
pub(crate) const SEQNO_MASK: u8 = 0x7F;
pub(crate) const SUBCOMMAND_MASK: u8 = 0x03;
pub(crate) const SC_INITIATE: u8 = 0;
pub(crate) const SC_END: u8 = 1;
pub(crate) const SC_ACK: u8 = 2;
pub(crate) const SC_START: u8 = 3;

/// Payload bytes carried per segment.
pub(crate) const SEGMENT_PAYLOAD: usize = 7;

/// Highest segment count per block.
pub const MAX_BLOCK_SIZE: u8 = 127;

/// Tuning knobs shared by [`SdoClient`] and [`SdoServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// How long to wait for the peer at each blocking point, in
    /// milliseconds, before the transfer is aborted.
    pub timeout_ms: u32,
    /// Segments per block offered when negotiating block transfers (1-127).
    pub block_size: u8,
    /// Payload size in bytes above which downloads switch from segmented
    /// to block mode. Also sent as the protocol switch threshold on block
    /// uploads, letting the server fall back for small objects.
    pub block_threshold: usize,
    /// Consecutive block rounds without any acknowledged progress before
    /// the transfer is given up.
    pub max_block_retries: u8,
    /// Largest object accepted by the server, in bytes.
    pub max_transfer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            timeout_ms: 500,
            block_size: MAX_BLOCK_SIZE,
            block_threshold: 64,
            max_block_retries: 3,
            max_transfer_size: 0x1_0000,
        }
    }
}

/// Segments needed to carry `len` bytes at 7 bytes per segment. A zero
/// length object still occupies one (empty) segment.
pub(crate) fn segment_count(len: usize) -> usize {
    len.div_ceil(SEGMENT_PAYLOAD).max(1)
}
