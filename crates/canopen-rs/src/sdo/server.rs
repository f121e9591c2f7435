//! Server side of the SDO protocol.

use super::{segment_count, TransferConfig, MAX_BLOCK_SIZE, SEGMENT_PAYLOAD};
use crate::crc::crc16;
use crate::frame::CanFrame;
use crate::hal::{CanInterface, CanOpenError};
use crate::od::ObjectStore;
use crate::sdo::abort::AbortCode;
use crate::sdo::command::{BlockSegment, InitiateData, SdoReply, SdoRequest};
use crate::types::{NodeId, Selector};
use alloc::vec::Vec;

/// An open segmented transfer. Block transfers run to completion inside a
/// single [`SdoServer::serve_one`] call and never park state here.
enum Session {
    Download {
        selector: Selector,
        buffer: Vec<u8>,
        toggle: bool,
        size: Option<u32>,
    },
    Upload {
        selector: Selector,
        data: Vec<u8>,
        offset: usize,
        toggle: bool,
    },
}

impl Session {
    fn selector(&self) -> Selector {
        match self {
            Session::Download { selector, .. } | Session::Upload { selector, .. } => *selector,
        }
    }
}

/// Answers SDO requests for one node out of an [`ObjectStore`].
///
/// One transfer is served at a time; an initiate arriving while a segmented
/// transfer is open is rejected with [`AbortCode::ResourceUnavailable`].
pub struct SdoServer<'a, C: CanInterface, S: ObjectStore> {
    bus: &'a mut C,
    node: NodeId,
    store: &'a mut S,
    config: TransferConfig,
    session: Option<Session>,
}

impl<'a, C: CanInterface, S: ObjectStore> SdoServer<'a, C, S> {
    pub fn new(bus: &'a mut C, node: NodeId, store: &'a mut S) -> Self {
        Self::with_config(bus, node, store, TransferConfig::default())
    }

    pub fn with_config(
        bus: &'a mut C,
        node: NodeId,
        store: &'a mut S,
        config: TransferConfig,
    ) -> Self {
        SdoServer {
            bus,
            node,
            store,
            config,
            session: None,
        }
    }

    /// Serves until the bus fails, returning the fatal error.
    pub fn run(&mut self) -> CanOpenError {
        loop {
            if let Err(error) = self.serve_one() {
                log::error!("SDO server on node {} stopping: {error}", self.node);
                return error;
            }
        }
    }

    /// Waits up to the configured timeout for one request and handles it.
    ///
    /// Block transfers are carried through to their end before this returns.
    /// Yields `Ok(true)` when a request addressed to this node was handled,
    /// `Ok(false)` on timeouts and foreign traffic. A timeout while a
    /// segmented transfer is open aborts that transfer.
    pub fn serve_one(&mut self) -> Result<bool, CanOpenError> {
        if !self.bus.wait(self.config.timeout_ms) {
            if let Some(session) = self.session.take() {
                log::warn!("Peer went silent, dropping transfer of {}", session.selector());
                self.abort(session.selector(), AbortCode::Timeout)?;
            }
            return Ok(false);
        }
        let frame = match self.bus.receive_frame() {
            Ok(frame) => frame,
            Err(CanOpenError::IoError) => return Ok(false),
            Err(error) => return Err(error),
        };
        if frame.id() != self.node.request_cob_id() || frame.is_rtr() || frame.len() != 8 {
            return Ok(false);
        }
        let request = match SdoRequest::decode(frame.payload()) {
            Ok(request) => request,
            Err(error) => {
                log::warn!("Rejecting malformed SDO request: {error}");
                self.session = None;
                self.abort(Selector::from_payload(frame.payload()), AbortCode::SpecifierInvalid)?;
                return Ok(true);
            }
        };
        self.handle(request)?;
        Ok(true)
    }

    fn handle(&mut self, request: SdoRequest) -> Result<(), CanOpenError> {
        match request {
            SdoRequest::InitiateDownload { selector, data } => {
                if self.reject_if_busy(selector)? {
                    return Ok(());
                }
                self.initiate_download(selector, data)
            }
            SdoRequest::DownloadSegment {
                toggle,
                data,
                len,
                last,
            } => self.download_segment(toggle, &data[..usize::from(len)], last),
            SdoRequest::InitiateUpload { selector } => {
                if self.reject_if_busy(selector)? {
                    return Ok(());
                }
                match self.store.read(selector) {
                    Ok(data) => self.start_upload(selector, data),
                    Err(code) => self.abort(selector, code),
                }
            }
            SdoRequest::UploadSegment { toggle } => self.upload_segment(toggle),
            SdoRequest::Abort { selector, code } => {
                log::info!("Client aborted transfer of {selector}: {code}");
                self.session = None;
                Ok(())
            }
            SdoRequest::BlockDownloadInitiate {
                selector,
                size,
                crc_support,
            } => {
                if self.reject_if_busy(selector)? {
                    return Ok(());
                }
                self.block_download(selector, size, crc_support)
            }
            SdoRequest::BlockUploadInitiate {
                selector,
                block_size,
                switch_threshold,
                crc_support,
            } => {
                if self.reject_if_busy(selector)? {
                    return Ok(());
                }
                self.block_upload(selector, block_size, switch_threshold, crc_support)
            }
            // Block sub-commands are consumed inside the block transfer
            // loops; arriving here they are out of place.
            SdoRequest::BlockDownloadEnd { .. }
            | SdoRequest::BlockUploadStart
            | SdoRequest::BlockUploadAck { .. }
            | SdoRequest::BlockUploadEnd => {
                self.abort(Selector::new(0, 0), AbortCode::SpecifierInvalid)
            }
        }
    }

    // --- Expedited and segmented downloads ---

    fn initiate_download(
        &mut self,
        selector: Selector,
        data: InitiateData,
    ) -> Result<(), CanOpenError> {
        if let Err(code) = self.check_writable(selector) {
            return self.abort(selector, code);
        }
        match data {
            InitiateData::Expedited { .. } => {
                let payload = data.bytes().unwrap_or_default();
                match self.store.write(selector, payload) {
                    Ok(()) => self.reply(SdoReply::InitiateDownload { selector }),
                    Err(code) => self.abort(selector, code),
                }
            }
            InitiateData::SizeIndicated(size) => {
                if size as usize > self.config.max_transfer_size {
                    return self.abort(selector, AbortCode::OutOfMemory);
                }
                self.session = Some(Session::Download {
                    selector,
                    buffer: Vec::with_capacity(size as usize),
                    toggle: false,
                    size: Some(size),
                });
                self.reply(SdoReply::InitiateDownload { selector })
            }
            InitiateData::Unspecified => {
                self.session = Some(Session::Download {
                    selector,
                    buffer: Vec::new(),
                    toggle: false,
                    size: None,
                });
                self.reply(SdoReply::InitiateDownload { selector })
            }
        }
    }

    fn download_segment(
        &mut self,
        toggle: bool,
        chunk: &[u8],
        last: bool,
    ) -> Result<(), CanOpenError> {
        let Some(Session::Download {
            selector,
            mut buffer,
            toggle: expected,
            size,
        }) = self.session.take()
        else {
            return self.abort(Selector::new(0, 0), AbortCode::SpecifierInvalid);
        };
        if toggle != expected {
            return self.abort(selector, AbortCode::ToggleBitInvalid);
        }
        buffer.extend_from_slice(chunk);
        if buffer.len() > self.config.max_transfer_size {
            return self.abort(selector, AbortCode::OutOfMemory);
        }
        if let Some(size) = size {
            if buffer.len() > size as usize {
                return self.abort(selector, AbortCode::LengthTooHigh);
            }
            if last && buffer.len() < size as usize {
                return self.abort(selector, AbortCode::LengthTooLow);
            }
        }
        if last {
            match self.store.write(selector, &buffer) {
                Ok(()) => self.reply(SdoReply::DownloadSegment { toggle }),
                Err(code) => self.abort(selector, code),
            }
        } else {
            self.session = Some(Session::Download {
                selector,
                buffer,
                toggle: !expected,
                size,
            });
            self.reply(SdoReply::DownloadSegment { toggle })
        }
    }

    // --- Expedited and segmented uploads ---

    /// Starts a plain upload: expedited when the object fits into the
    /// initiate reply, otherwise a segmented session.
    fn start_upload(&mut self, selector: Selector, data: Vec<u8>) -> Result<(), CanOpenError> {
        if (1..=4).contains(&data.len()) {
            let reply = SdoReply::InitiateUpload {
                selector,
                data: InitiateData::Expedited {
                    data: {
                        let mut bytes = [0u8; 4];
                        bytes[..data.len()].copy_from_slice(&data);
                        bytes
                    },
                    len: data.len() as u8,
                },
            };
            self.reply(reply)
        } else {
            let size = data.len() as u32;
            self.session = Some(Session::Upload {
                selector,
                data,
                offset: 0,
                toggle: false,
            });
            self.reply(SdoReply::InitiateUpload {
                selector,
                data: InitiateData::SizeIndicated(size),
            })
        }
    }

    fn upload_segment(&mut self, toggle: bool) -> Result<(), CanOpenError> {
        let Some(Session::Upload {
            selector,
            data,
            offset,
            toggle: expected,
        }) = self.session.take()
        else {
            return self.abort(Selector::new(0, 0), AbortCode::SpecifierInvalid);
        };
        if toggle != expected {
            return self.abort(selector, AbortCode::ToggleBitInvalid);
        }
        let end = (offset + SEGMENT_PAYLOAD).min(data.len());
        let chunk = &data[offset..end];
        let last = end == data.len();
        let mut payload = [0u8; 7];
        payload[..chunk.len()].copy_from_slice(chunk);
        let reply = SdoReply::UploadSegment {
            toggle,
            data: payload,
            len: chunk.len() as u8,
            last,
        };
        if !last {
            self.session = Some(Session::Upload {
                selector,
                data,
                offset: end,
                toggle: !expected,
            });
        }
        self.reply(reply)
    }

    // --- Block download ---

    fn block_download(
        &mut self,
        selector: Selector,
        size: Option<u32>,
        client_crc: bool,
    ) -> Result<(), CanOpenError> {
        if let Err(code) = self.check_writable(selector) {
            return self.abort(selector, code);
        }
        if let Some(size) = size {
            if size as usize > self.config.max_transfer_size {
                return self.abort(selector, AbortCode::OutOfMemory);
            }
        }
        // No point in offering more segments per block than the object has.
        let mut block_size = match size {
            Some(size) => {
                let needed = segment_count(size as usize).min(usize::from(MAX_BLOCK_SIZE));
                self.config.block_size.min(needed as u8).max(1)
            }
            None => self.config.block_size,
        };
        let crc_in_use = client_crc;
        self.reply(SdoReply::BlockDownloadInitiate {
            selector,
            block_size,
            crc_support: true,
        })?;

        let mut buffer = Vec::with_capacity(size.unwrap_or(0) as usize);
        let mut stalled_rounds = 0u8;
        let mut finished = false;
        while !finished {
            let mut expected = 1u8;
            loop {
                let segment = match self.next_block_segment(selector)? {
                    Some(segment) => segment,
                    None => return Ok(()),
                };
                if segment.seq == expected {
                    buffer.extend_from_slice(&segment.data);
                    expected += 1;
                    if segment.last {
                        finished = true;
                    }
                } else {
                    log::debug!(
                        "Dropping out-of-sequence block segment {} (expected {expected})",
                        segment.seq
                    );
                }
                if segment.last || segment.seq >= block_size {
                    break;
                }
            }
            let acked = expected - 1;
            finished = finished && acked > 0;
            if acked == 0 {
                stalled_rounds += 1;
                if stalled_rounds >= self.config.max_block_retries {
                    log::warn!("Block download of {selector} made no progress, giving up");
                    return self.abort(selector, AbortCode::GeneralError);
                }
            } else {
                stalled_rounds = 0;
            }
            if buffer.len() > self.config.max_transfer_size {
                return self.abort(selector, AbortCode::OutOfMemory);
            }
            // Shrink the next block to what is still outstanding. The new
            // size takes effect after the ack announcing it.
            let next_size = match size {
                Some(size) => {
                    let received = buffer.len() / SEGMENT_PAYLOAD;
                    let remaining = segment_count(size as usize).saturating_sub(received);
                    block_size.min(remaining.max(1) as u8)
                }
                None => block_size,
            };
            self.reply(SdoReply::BlockDownloadAck {
                acked,
                block_size: next_size,
            })?;
            block_size = next_size;
        }

        match self.next_request(selector)? {
            Some(SdoRequest::BlockDownloadEnd { unused, crc }) => {
                buffer.truncate(buffer.len().saturating_sub(usize::from(unused)));
                if crc_in_use && crc16(&buffer) != crc {
                    return self.abort(selector, AbortCode::CrcError);
                }
                if let Some(size) = size {
                    if buffer.len() != size as usize {
                        return self.abort(selector, AbortCode::LengthMismatch);
                    }
                }
                match self.store.write(selector, &buffer) {
                    Ok(()) => self.reply(SdoReply::BlockDownloadEnd),
                    Err(code) => self.abort(selector, code),
                }
            }
            Some(_) => self.abort(selector, AbortCode::SpecifierInvalid),
            None => Ok(()),
        }
    }

    // --- Block upload ---

    fn block_upload(
        &mut self,
        selector: Selector,
        client_block_size: u8,
        switch_threshold: u8,
        client_crc: bool,
    ) -> Result<(), CanOpenError> {
        let data = match self.store.read(selector) {
            Ok(data) => data,
            Err(code) => return self.abort(selector, code),
        };
        // Small objects are not worth the block handshake; fall back to a
        // plain upload when the client allows it.
        if switch_threshold > 0 && data.len() <= usize::from(switch_threshold) {
            return self.start_upload(selector, data);
        }
        if client_block_size == 0 || client_block_size > MAX_BLOCK_SIZE {
            return self.abort(selector, AbortCode::BlockSizeInvalid);
        }
        let crc_in_use = client_crc;
        self.reply(SdoReply::BlockUploadInitiate {
            selector,
            size: Some(data.len() as u32),
            crc_support: true,
        })?;
        match self.next_request(selector)? {
            Some(SdoRequest::BlockUploadStart) => {}
            Some(_) => return self.abort(selector, AbortCode::SpecifierInvalid),
            None => return Ok(()),
        }

        let mut block_size = client_block_size;
        let total = segment_count(data.len());
        let mut sent = 0;
        let mut stalled_rounds = 0u8;
        while sent < total {
            let round = usize::from(block_size).min(total - sent);
            for i in 0..round {
                let position = sent + i;
                let start = position * SEGMENT_PAYLOAD;
                let end = (start + SEGMENT_PAYLOAD).min(data.len());
                let mut payload = [0u8; 7];
                payload[..end - start].copy_from_slice(&data[start..end]);
                let segment = BlockSegment {
                    seq: (i + 1) as u8,
                    last: position + 1 == total,
                    data: payload,
                };
                self.bus
                    .send_frame(&CanFrame::sdo(self.node.reply_cob_id(), segment.encode()))?;
            }
            match self.next_request(selector)? {
                Some(SdoRequest::BlockUploadAck {
                    acked,
                    block_size: next,
                }) => {
                    if usize::from(acked) > round {
                        return self.abort(selector, AbortCode::SequenceNumberInvalid);
                    }
                    if next == 0 || next > MAX_BLOCK_SIZE {
                        return self.abort(selector, AbortCode::BlockSizeInvalid);
                    }
                    if acked == 0 {
                        stalled_rounds += 1;
                        if stalled_rounds >= self.config.max_block_retries {
                            log::warn!("Block upload of {selector} made no progress, giving up");
                            return self.abort(selector, AbortCode::GeneralError);
                        }
                    } else {
                        stalled_rounds = 0;
                    }
                    sent += usize::from(acked);
                    block_size = next;
                }
                Some(_) => return self.abort(selector, AbortCode::SpecifierInvalid),
                None => return Ok(()),
            }
        }

        let unused = (SEGMENT_PAYLOAD - 1) - (data.len() + SEGMENT_PAYLOAD - 1) % SEGMENT_PAYLOAD;
        let crc = if crc_in_use { crc16(&data) } else { 0 };
        self.reply(SdoReply::BlockUploadEnd {
            unused: unused as u8,
            crc,
        })?;
        match self.next_request(selector)? {
            Some(SdoRequest::BlockUploadEnd) => Ok(()),
            Some(_) => self.abort(selector, AbortCode::SpecifierInvalid),
            None => Ok(()),
        }
    }

    // --- Frame plumbing ---

    /// `Ok(true)` when a segmented transfer is open and the initiate was
    /// rejected.
    fn reject_if_busy(&mut self, selector: Selector) -> Result<bool, CanOpenError> {
        if self.session.is_some() {
            log::warn!("Rejecting transfer of {selector}, another transfer is open");
            self.abort(selector, AbortCode::ResourceUnavailable)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn check_writable(&self, selector: Selector) -> Result<(), AbortCode> {
        let access = self.store.access(selector)?;
        if !access.is_writable() {
            return Err(AbortCode::ReadOnlyAccess);
        }
        Ok(())
    }

    /// Waits for the client's next request during a block transfer.
    ///
    /// `Ok(None)` means the transfer is over: the client aborted, or it went
    /// silent and an abort was sent.
    fn next_request(&mut self, selector: Selector) -> Result<Option<SdoRequest>, CanOpenError> {
        loop {
            let Some(frame) = self.next_frame(selector)? else {
                return Ok(None);
            };
            match SdoRequest::decode(frame.payload()) {
                Ok(SdoRequest::Abort { code, .. }) => {
                    log::info!("Client aborted transfer of {selector}: {code}");
                    return Ok(None);
                }
                Ok(request) => return Ok(Some(request)),
                Err(error) => {
                    log::warn!("Skipping malformed SDO request: {error}");
                }
            }
        }
    }

    /// Waits for the next block data segment.
    ///
    /// `Ok(None)` means the transfer is over, as with [`Self::next_request`].
    fn next_block_segment(
        &mut self,
        selector: Selector,
    ) -> Result<Option<BlockSegment>, CanOpenError> {
        let Some(frame) = self.next_frame(selector)? else {
            return Ok(None);
        };
        match BlockSegment::decode(frame.payload()) {
            Ok(segment) => Ok(Some(segment)),
            Err(_) => {
                if let Ok(SdoRequest::Abort { code, .. }) = SdoRequest::decode(frame.payload()) {
                    log::info!("Client aborted block transfer of {selector}: {code}");
                    return Ok(None);
                }
                self.abort(selector, AbortCode::SequenceNumberInvalid)?;
                Ok(None)
            }
        }
    }

    fn next_frame(&mut self, selector: Selector) -> Result<Option<CanFrame>, CanOpenError> {
        loop {
            if !self.bus.wait(self.config.timeout_ms) {
                log::warn!("Peer went silent, dropping transfer of {selector}");
                self.abort(selector, AbortCode::Timeout)?;
                return Ok(None);
            }
            let frame = match self.bus.receive_frame() {
                Ok(frame) => frame,
                Err(CanOpenError::IoError) => continue,
                Err(error) => return Err(error),
            };
            if frame.id() != self.node.request_cob_id() || frame.is_rtr() || frame.len() != 8 {
                continue;
            }
            return Ok(Some(frame));
        }
    }

    fn reply(&mut self, reply: SdoReply) -> Result<(), CanOpenError> {
        self.bus.send_frame(&reply.frame(self.node))
    }

    fn abort(&mut self, selector: Selector, code: AbortCode) -> Result<(), CanOpenError> {
        log::debug!("Aborting transfer of {selector}: {code}");
        self.reply(SdoReply::Abort { selector, code })
    }
}
