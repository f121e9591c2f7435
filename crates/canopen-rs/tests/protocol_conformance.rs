//! Byte-exact conformance checks: the server is driven with raw CAN frames
//! and its replies are compared against the wire layout of CiA 301.

use canopen_rs::{
    AccessType, CanFrame, CanInterface, CanOpenError, MemoryStore, NodeId, SdoServer, Selector,
};
use std::collections::VecDeque;

struct ScriptedBus {
    incoming: VecDeque<CanFrame>,
    outgoing: Vec<CanFrame>,
}

impl ScriptedBus {
    fn new(frames: &[[u8; 8]], cob_id: u32) -> Self {
        ScriptedBus {
            incoming: frames
                .iter()
                .map(|payload| CanFrame::new(cob_id, payload).unwrap())
                .collect(),
            outgoing: Vec::new(),
        }
    }
}

impl CanInterface for ScriptedBus {
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanOpenError> {
        self.outgoing.push(*frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<CanFrame, CanOpenError> {
        self.incoming.pop_front().ok_or(CanOpenError::IoError)
    }

    fn wait(&mut self, _timeout_ms: u32) -> bool {
        !self.incoming.is_empty()
    }
}

fn run_server(frames: &[[u8; 8]], store: &mut MemoryStore) -> Vec<CanFrame> {
    env_logger::try_init().ok(); // Ignore error if already initialized
    let node = NodeId::new(0x0A).unwrap();
    let mut bus = ScriptedBus::new(frames, node.request_cob_id());
    let mut server = SdoServer::new(&mut bus, node, store);
    while server.serve_one().unwrap() {}
    bus.outgoing
}

fn demo_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert(Selector::new(0x2000, 0x00), AccessType::ReadWrite, &[0; 4]);
    store.insert(
        Selector::new(0x1008, 0x00),
        AccessType::ReadOnly,
        &0x1234_5678u32.to_le_bytes(),
    );
    store
}

#[test]
fn expedited_write_confirmation_bytes() {
    let mut store = demo_store();
    // Write the 32-bit value 0xDEADBEEF to 2000:00.
    let sent = run_server(
        &[[0x23, 0x00, 0x20, 0x00, 0xEF, 0xBE, 0xAD, 0xDE]],
        &mut store,
    );
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id(), 0x58A);
    assert_eq!(sent[0].data(), &[0x60, 0x00, 0x20, 0x00, 0, 0, 0, 0]);
    assert_eq!(
        store.get(Selector::new(0x2000, 0x00)),
        Some(&[0xEF, 0xBE, 0xAD, 0xDE][..])
    );
}

#[test]
fn expedited_read_reply_bytes() {
    let mut store = demo_store();
    let sent = run_server(&[[0x40, 0x08, 0x10, 0x00, 0, 0, 0, 0]], &mut store);
    // scs 2, expedited, size set, n = 0: all four bytes valid.
    assert_eq!(sent[0].data(), &[0x43, 0x08, 0x10, 0x00, 0x78, 0x56, 0x34, 0x12]);
}

#[test]
fn read_of_missing_object_aborts_with_0602_0000() {
    let mut store = demo_store();
    let sent = run_server(&[[0x40, 0xFF, 0x5F, 0x03, 0, 0, 0, 0]], &mut store);
    assert_eq!(sent[0].data(), &[0x80, 0xFF, 0x5F, 0x03, 0x00, 0x00, 0x02, 0x06]);
}

#[test]
fn segmented_write_exchange_bytes() {
    let mut store = demo_store();
    let sent = run_server(
        &[
            // Initiate: 9 bytes to 2000:00.
            [0x21, 0x00, 0x20, 0x00, 0x09, 0x00, 0x00, 0x00],
            // Segment 1: toggle 0, 7 bytes.
            [0x00, b'a', b'b', b'c', b'd', b'e', b'f', b'g'],
            // Segment 2: toggle 1, 2 bytes, last.
            [0x1B, b'h', b'i', 0, 0, 0, 0, 0],
        ],
        &mut store,
    );
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].data()[0], 0x60);
    assert_eq!(sent[1].data(), &[0x20, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(sent[2].data(), &[0x30, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(store.get(Selector::new(0x2000, 0x00)), Some(&b"abcdefghi"[..]));
}

#[test]
fn unknown_specifier_aborts_with_0504_0001() {
    let mut store = demo_store();
    let sent = run_server(&[[0xE0, 0, 0, 0, 0, 0, 0, 0]], &mut store);
    assert_eq!(sent[0].data(), &[0x80, 0x00, 0x00, 0x00, 0x01, 0x00, 0x04, 0x05]);
}
