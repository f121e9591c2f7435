//! An in-process virtual CAN bus.
//!
//! [`VirtualBus`] fans every transmitted frame out to all other endpoints,
//! like a real bus without arbitration or bit timing. Endpoints implement
//! [`CanInterface`], so clients, servers and monitors built on `canopen-rs`
//! can talk to each other across threads without hardware.
//!
//! ```
//! use canopen_rs_vcan::VirtualBus;
//! use canopen_rs::{CanFrame, CanInterface};
//!
//! let bus = VirtualBus::new();
//! let mut a = bus.endpoint();
//! let mut b = bus.endpoint();
//! a.send_frame(&CanFrame::new(0x123, &[1, 2, 3]).unwrap()).unwrap();
//! assert!(b.wait(10));
//! assert_eq!(b.receive_frame().unwrap().data(), &[1, 2, 3]);
//! ```

use canopen_rs::{CanFrame, CanInterface, CanOpenError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A shared medium connecting any number of [`VirtualCan`] endpoints.
///
/// Cloning the bus handle is cheap; all clones attach endpoints to the same
/// medium.
#[derive(Clone, Default)]
pub struct VirtualBus {
    taps: Arc<Mutex<Vec<Sender<CanFrame>>>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new endpoint to the bus.
    pub fn endpoint(&self) -> VirtualCan {
        let (tx, rx) = unbounded();
        let index = match self.taps.lock() {
            Ok(mut taps) => {
                taps.push(tx);
                taps.len() - 1
            }
            // A poisoned bus keeps working for the surviving threads.
            Err(poisoned) => {
                let mut taps = poisoned.into_inner();
                taps.push(tx);
                taps.len() - 1
            }
        };
        VirtualCan {
            index,
            taps: Arc::clone(&self.taps),
            rx,
            pending: None,
        }
    }
}

/// One endpoint on a [`VirtualBus`].
///
/// Send and wait/receive may be used from different endpoints concurrently;
/// a single endpoint belongs to one thread at a time.
pub struct VirtualCan {
    index: usize,
    taps: Arc<Mutex<Vec<Sender<CanFrame>>>>,
    rx: Receiver<CanFrame>,
    pending: Option<CanFrame>,
}

impl CanInterface for VirtualCan {
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanOpenError> {
        let taps = match self.taps.lock() {
            Ok(taps) => taps,
            Err(poisoned) => poisoned.into_inner(),
        };
        log::trace!("vcan endpoint {}: TX {frame}", self.index);
        for (index, tap) in taps.iter().enumerate() {
            if index == self.index {
                continue;
            }
            // Endpoints whose receiver is gone are simply not listening.
            let _ = tap.send(*frame);
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<CanFrame, CanOpenError> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        match self.rx.try_recv() {
            Ok(frame) => Ok(frame),
            Err(TryRecvError::Empty) => Err(CanOpenError::IoError),
            Err(TryRecvError::Disconnected) => Err(CanOpenError::Disconnected),
        }
    }

    fn wait(&mut self, timeout_ms: u32) -> bool {
        if self.pending.is_some() {
            return true;
        }
        match self.rx.recv_timeout(Duration::from_millis(u64::from(timeout_ms))) {
            Ok(frame) => {
                self.pending = Some(frame);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // Report readiness so the caller sees the disconnect error.
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u32, data: &[u8]) -> CanFrame {
        CanFrame::new(id, data).unwrap()
    }

    #[test]
    fn frames_reach_all_other_endpoints() {
        let bus = VirtualBus::new();
        let mut a = bus.endpoint();
        let mut b = bus.endpoint();
        let mut c = bus.endpoint();
        a.send_frame(&frame(0x100, &[7])).unwrap();
        for endpoint in [&mut b, &mut c] {
            assert!(endpoint.wait(100));
            assert_eq!(endpoint.receive_frame().unwrap(), frame(0x100, &[7]));
        }
    }

    #[test]
    fn sender_does_not_hear_itself() {
        let bus = VirtualBus::new();
        let mut a = bus.endpoint();
        let _b = bus.endpoint();
        a.send_frame(&frame(0x100, &[])).unwrap();
        assert!(!a.wait(10));
        assert_eq!(a.receive_frame(), Err(CanOpenError::IoError));
    }

    #[test]
    fn wait_preserves_frame_order() {
        let bus = VirtualBus::new();
        let mut a = bus.endpoint();
        let mut b = bus.endpoint();
        a.send_frame(&frame(0x100, &[1])).unwrap();
        a.send_frame(&frame(0x101, &[2])).unwrap();
        assert!(b.wait(100));
        assert_eq!(b.receive_frame().unwrap().id(), 0x100);
        assert_eq!(b.receive_frame().unwrap().id(), 0x101);
    }
}
