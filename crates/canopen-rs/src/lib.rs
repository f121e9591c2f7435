#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for dynamic allocation (e.g., Vec<u8> transfer buffers)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod crc;

// --- Data Link Layer ---
pub mod frame;

// --- Higher Layers ---
pub mod od;
pub mod sdo;

// --- Top-level Exports ---
pub use types::{NodeId, Selector, TransferMode};
pub use hal::{CanInterface, CanOpenError};
pub use crc::{Crc16, crc16};
pub use frame::CanFrame;
pub use frame::codec::Codec;
pub use od::{AccessType, MemoryStore, ObjectStore};
pub use sdo::{AbortCode, SdoClient, SdoReply, SdoRequest, SdoServer, TransferConfig, TransferError};
