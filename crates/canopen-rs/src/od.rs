//! Object dictionary storage backing the SDO server.

use crate::sdo::AbortCode;
use crate::types::Selector;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Access rights of an object dictionary entry as seen from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessType {
    pub fn is_readable(&self) -> bool {
        matches!(self, AccessType::ReadOnly | AccessType::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, AccessType::WriteOnly | AccessType::ReadWrite)
    }
}

/// Storage interface the SDO server reads uploads from and commits
/// downloads to.
///
/// Errors are reported as [`AbortCode`]s so a failed access maps directly
/// onto the abort frame sent back to the client.
pub trait ObjectStore {
    /// Looks up the access rights of an entry.
    ///
    /// Returns [`AbortCode::SelectorInvalid`] when no such entry exists.
    fn access(&self, selector: Selector) -> Result<AccessType, AbortCode>;

    /// Reads the current value of an entry.
    fn read(&self, selector: Selector) -> Result<Vec<u8>, AbortCode>;

    /// Replaces the value of an entry.
    fn write(&mut self, selector: Selector, data: &[u8]) -> Result<(), AbortCode>;
}

#[derive(Debug, Clone)]
struct Entry {
    access: AccessType,
    data: Vec<u8>,
}

/// A heap-backed [`ObjectStore`] keyed by selector.
///
/// Entries must be inserted up front; the server will not create entries
/// on write. Suitable for tests and for devices whose dictionary lives in
/// RAM.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Selector, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry with the given access rights and initial
    /// value.
    pub fn insert(&mut self, selector: Selector, access: AccessType, data: &[u8]) {
        self.entries.insert(
            selector,
            Entry {
                access,
                data: data.to_vec(),
            },
        );
    }

    /// Reads an entry regardless of its bus-side access rights.
    pub fn get(&self, selector: Selector) -> Option<&[u8]> {
        self.entries.get(&selector).map(|entry| entry.data.as_slice())
    }
}

impl ObjectStore for MemoryStore {
    fn access(&self, selector: Selector) -> Result<AccessType, AbortCode> {
        self.entries
            .get(&selector)
            .map(|entry| entry.access)
            .ok_or(AbortCode::SelectorInvalid)
    }

    fn read(&self, selector: Selector) -> Result<Vec<u8>, AbortCode> {
        let entry = self.entries.get(&selector).ok_or(AbortCode::SelectorInvalid)?;
        if !entry.access.is_readable() {
            return Err(AbortCode::WriteOnlyAccess);
        }
        Ok(entry.data.clone())
    }

    fn write(&mut self, selector: Selector, data: &[u8]) -> Result<(), AbortCode> {
        let entry = self
            .entries
            .get_mut(&selector)
            .ok_or(AbortCode::SelectorInvalid)?;
        if !entry.access.is_writable() {
            return Err(AbortCode::ReadOnlyAccess);
        }
        entry.data = data.to_vec();
        Ok(())
    }
}
