//! End-to-end SDO transfers between a client and a server thread connected
//! through the virtual bus.

use canopen_rs::{
    AbortCode, AccessType, CanInterface, MemoryStore, NodeId, SdoClient, SdoRequest, SdoServer,
    Selector, TransferConfig, TransferError,
};
use canopen_rs_vcan::VirtualBus;
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn node() -> NodeId {
    NodeId::new(0x11).unwrap()
}

fn selector() -> Selector {
    Selector::new(0x2000, 0x00)
}

/// Runs a server over a dedicated endpoint until the bus stays quiet for a
/// full timeout, then hands back the value stored under the test selector.
fn spawn_server(bus: &VirtualBus, store: MemoryStore) -> thread::JoinHandle<Option<Vec<u8>>> {
    let mut endpoint = bus.endpoint();
    thread::spawn(move || {
        let mut store = store;
        let mut server = SdoServer::new(&mut endpoint, node(), &mut store);
        while let Ok(true) = server.serve_one() {}
        store.get(selector()).map(|data| data.to_vec())
    })
}

fn store_with(access: AccessType, data: &[u8]) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert(selector(), access, data);
    store
}

#[test]
fn expedited_download() {
    init_logging();
    let bus = VirtualBus::new();
    let server = spawn_server(&bus, store_with(AccessType::ReadWrite, &[0, 0, 0]));
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    client.download(selector(), &[0xCA, 0xFE, 0x42]).unwrap();
    assert_eq!(server.join().unwrap(), Some(vec![0xCA, 0xFE, 0x42]));
}

#[test]
fn segmented_roundtrip() {
    init_logging();
    let bus = VirtualBus::new();
    // 50 bytes: above expedited, below the block threshold.
    let data: Vec<u8> = (0..50).collect();
    let server = spawn_server(&bus, store_with(AccessType::ReadWrite, &[]));
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    client.download(selector(), &data).unwrap();
    assert_eq!(client.upload(selector()).unwrap(), data);
    assert_eq!(server.join().unwrap(), Some(data));
}

#[test]
fn block_roundtrip_with_crc() {
    init_logging();
    let bus = VirtualBus::new();
    let data: Vec<u8> = (0u32..500).map(|i| (i % 251) as u8).collect();
    let server = spawn_server(&bus, store_with(AccessType::ReadWrite, &[]));
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    client.download(selector(), &data).unwrap();
    assert_eq!(client.upload(selector()).unwrap(), data);
    assert_eq!(server.join().unwrap(), Some(data));
}

#[test]
fn empty_object_roundtrip() {
    init_logging();
    let bus = VirtualBus::new();
    let server = spawn_server(&bus, store_with(AccessType::ReadWrite, &[1, 2, 3]));
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    client.download(selector(), &[]).unwrap();
    assert_eq!(client.upload(selector()).unwrap(), Vec::<u8>::new());
    assert_eq!(server.join().unwrap(), Some(Vec::new()));
}

#[test]
fn write_to_read_only_object_is_refused() {
    init_logging();
    let bus = VirtualBus::new();
    let server = spawn_server(&bus, store_with(AccessType::ReadOnly, &[9]));
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    assert_eq!(
        client.download(selector(), &[1]),
        Err(TransferError::RemoteAbort(AbortCode::ReadOnlyAccess))
    );
    // The stored value is untouched.
    assert_eq!(server.join().unwrap(), Some(vec![9]));
}

#[test]
fn unknown_object_is_refused() {
    init_logging();
    let bus = VirtualBus::new();
    let server = spawn_server(&bus, MemoryStore::new());
    let mut endpoint = bus.endpoint();
    let mut client = SdoClient::new(&mut endpoint, node());
    assert_eq!(
        client.upload(selector()),
        Err(TransferError::RemoteAbort(AbortCode::SelectorInvalid))
    );
    assert_eq!(server.join().unwrap(), None);
}

#[test]
fn second_transfer_while_busy_is_refused() {
    init_logging();
    let bus = VirtualBus::new();
    let server = spawn_server(&bus, store_with(AccessType::ReadWrite, &[]));
    let mut endpoint = bus.endpoint();

    // Open a segmented download by hand, then try a second initiate.
    let open = SdoRequest::InitiateDownload {
        selector: selector(),
        data: canopen_rs::sdo::InitiateData::SizeIndicated(20),
    };
    endpoint.send_frame(&open.frame(node())).unwrap();
    assert!(endpoint.wait(1000));
    endpoint.receive_frame().unwrap(); // initiate confirmation

    let second = SdoRequest::InitiateUpload {
        selector: selector(),
    };
    endpoint.send_frame(&second.frame(node())).unwrap();
    assert!(endpoint.wait(1000));
    let reply = endpoint.receive_frame().unwrap();
    assert_eq!(reply.data()[0], 0x80);
    assert_eq!(
        &reply.data()[4..8],
        &AbortCode::ResourceUnavailable.code().to_le_bytes()
    );
    drop(endpoint);
    server.join().unwrap();
}

#[test]
fn client_timeout_sends_abort() {
    init_logging();
    let bus = VirtualBus::new();
    let mut monitor = bus.endpoint();
    let mut endpoint = bus.endpoint();
    let config = TransferConfig {
        timeout_ms: 50,
        ..TransferConfig::default()
    };
    // Nobody answers on this bus.
    let mut client = SdoClient::with_config(&mut endpoint, node(), config);
    assert_eq!(
        client.download(selector(), &[1, 2]),
        Err(TransferError::Timeout)
    );
    // The monitor sees the initiate followed by the abort.
    assert!(monitor.wait(1000));
    let initiate = monitor.receive_frame().unwrap();
    assert_eq!(initiate.id(), 0x611);
    assert!(monitor.wait(1000));
    let abort = monitor.receive_frame().unwrap();
    assert_eq!(abort.data()[0], 0x80);
    assert_eq!(
        &abort.data()[4..8],
        &AbortCode::Timeout.code().to_le_bytes()
    );
}
