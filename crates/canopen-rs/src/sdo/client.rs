//! Client side of the SDO protocol.

use super::{segment_count, TransferConfig, SEGMENT_PAYLOAD, SEQNO_MASK};
use crate::crc::{crc16, Crc16};
use crate::frame::CanFrame;
use crate::hal::{CanInterface, CanOpenError};
use crate::sdo::abort::AbortCode;
use crate::sdo::command::{BlockSegment, InitiateData, SdoReply, SdoRequest};
use crate::types::{NodeId, Selector, TransferMode};
use alloc::vec::Vec;
use core::fmt;

/// How a client-driven transfer can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// The server did not answer within the configured timeout. An abort
    /// frame has been sent.
    Timeout,
    /// The server aborted the transfer with the given reason.
    RemoteAbort(AbortCode),
    /// This side aborted the transfer with the given reason, usually after
    /// a protocol violation by the peer.
    LocalAbort(AbortCode),
    /// The bus driver failed; no further exchange is possible.
    BusLost,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Timeout => write!(f, "SDO transfer timed out"),
            TransferError::RemoteAbort(code) => write!(f, "Transfer aborted by server: {code}"),
            TransferError::LocalAbort(code) => write!(f, "Transfer aborted locally: {code}"),
            TransferError::BusLost => write!(f, "CAN bus unavailable"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransferError {}

/// Drives SDO transfers against one remote node.
///
/// The client borrows the bus for its lifetime; every call runs a complete
/// transfer to the end, an abort, or a timeout before returning.
pub struct SdoClient<'a, C: CanInterface> {
    bus: &'a mut C,
    server: NodeId,
    config: TransferConfig,
}

impl<'a, C: CanInterface> SdoClient<'a, C> {
    pub fn new(bus: &'a mut C, server: NodeId) -> Self {
        Self::with_config(bus, server, TransferConfig::default())
    }

    pub fn with_config(bus: &'a mut C, server: NodeId, config: TransferConfig) -> Self {
        SdoClient {
            bus,
            server,
            config,
        }
    }

    /// Writes `data` to the selected object on the server.
    ///
    /// The transfer mode is chosen from the payload size: 1-4 bytes go
    /// expedited, anything above the block threshold goes block mode, the
    /// rest (including empty payloads) segmented.
    pub fn download(&mut self, selector: Selector, data: &[u8]) -> Result<(), TransferError> {
        let mode = if (1..=4).contains(&data.len()) {
            TransferMode::Expedited
        } else if data.len() > self.config.block_threshold {
            TransferMode::Block
        } else {
            TransferMode::Segmented
        };
        log::debug!(
            "Downloading {} bytes to {selector} on node {} ({mode})",
            data.len(),
            self.server
        );
        match mode {
            TransferMode::Expedited => self.expedited_download(selector, data),
            TransferMode::Block => self.block_download(selector, data),
            TransferMode::Segmented => self.segmented_download(selector, data),
        }
    }

    /// Reads the selected object from the server.
    ///
    /// Block mode is always offered; the protocol switch threshold lets the
    /// server answer small objects with a plain (expedited or segmented)
    /// upload instead.
    pub fn upload(&mut self, selector: Selector) -> Result<Vec<u8>, TransferError> {
        log::debug!("Uploading {selector} from node {}", self.server);
        let threshold = self.config.block_threshold.min(usize::from(u8::MAX)) as u8;
        self.send(&SdoRequest::BlockUploadInitiate {
            selector,
            block_size: self.config.block_size,
            switch_threshold: threshold,
            crc_support: true,
        })?;
        match self.next_reply(selector)? {
            SdoReply::BlockUploadInitiate {
                selector: echoed,
                size,
                crc_support,
            } => {
                self.check_selector(selector, echoed)?;
                self.block_upload_receive(selector, size, crc_support)
            }
            SdoReply::InitiateUpload {
                selector: echoed,
                data,
            } => {
                self.check_selector(selector, echoed)?;
                match data {
                    InitiateData::Expedited { .. } => {
                        // bytes() is always Some for the expedited variant.
                        Ok(data.bytes().unwrap_or_default().to_vec())
                    }
                    InitiateData::SizeIndicated(size) => {
                        self.segmented_receive(selector, Some(size as usize))
                    }
                    InitiateData::Unspecified => self.segmented_receive(selector, None),
                }
            }
            _ => self.protocol_violation(selector),
        }
    }

    // --- Download paths ---

    fn expedited_download(&mut self, selector: Selector, data: &[u8]) -> Result<(), TransferError> {
        let request = SdoRequest::expedited_download(selector, data)
            .map_err(|_| TransferError::LocalAbort(AbortCode::GeneralError))?;
        self.send(&request)?;
        match self.next_reply(selector)? {
            SdoReply::InitiateDownload { selector: echoed } => {
                self.check_selector(selector, echoed)
            }
            _ => self.protocol_violation(selector),
        }
    }

    fn segmented_download(&mut self, selector: Selector, data: &[u8]) -> Result<(), TransferError> {
        self.send(&SdoRequest::InitiateDownload {
            selector,
            data: InitiateData::SizeIndicated(data.len() as u32),
        })?;
        match self.next_reply(selector)? {
            SdoReply::InitiateDownload { selector: echoed } => {
                self.check_selector(selector, echoed)?;
            }
            _ => return self.protocol_violation(selector),
        }
        let mut toggle = false;
        let mut offset = 0;
        loop {
            let end = (offset + SEGMENT_PAYLOAD).min(data.len());
            let chunk = &data[offset..end];
            let last = end == data.len();
            let mut payload = [0u8; 7];
            payload[..chunk.len()].copy_from_slice(chunk);
            self.send(&SdoRequest::DownloadSegment {
                toggle,
                data: payload,
                len: chunk.len() as u8,
                last,
            })?;
            match self.next_reply(selector)? {
                SdoReply::DownloadSegment { toggle: echoed } if echoed == toggle => {}
                SdoReply::DownloadSegment { .. } => {
                    return self.local_abort(selector, AbortCode::ToggleBitInvalid);
                }
                _ => return self.protocol_violation(selector),
            }
            if last {
                return Ok(());
            }
            toggle = !toggle;
            offset = end;
        }
    }

    fn block_download(&mut self, selector: Selector, data: &[u8]) -> Result<(), TransferError> {
        self.send(&SdoRequest::BlockDownloadInitiate {
            selector,
            size: Some(data.len() as u32),
            crc_support: true,
        })?;
        let (mut block_size, crc_in_use) = match self.next_reply(selector)? {
            SdoReply::BlockDownloadInitiate {
                selector: echoed,
                block_size,
                crc_support,
            } => {
                self.check_selector(selector, echoed)?;
                if block_size == 0 || block_size > SEQNO_MASK {
                    return self.local_abort(selector, AbortCode::BlockSizeInvalid);
                }
                (block_size, crc_support)
            }
            _ => return self.protocol_violation(selector),
        };

        let total = segment_count(data.len());
        let mut sent = 0;
        let mut stalled_rounds = 0u8;
        while sent < total {
            // Sequence numbers restart at 1 for every round; unacknowledged
            // segments are renumbered and sent again.
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
                self.send_raw(CanFrame::sdo(self.server.request_cob_id(), segment.encode()))?;
            }
            match self.next_reply(selector)? {
                SdoReply::BlockDownloadAck {
                    acked,
                    block_size: next,
                } => {
                    if usize::from(acked) > round {
                        return self.local_abort(selector, AbortCode::SequenceNumberInvalid);
                    }
                    if next == 0 || next > SEQNO_MASK {
                        return self.local_abort(selector, AbortCode::BlockSizeInvalid);
                    }
                    if acked == 0 {
                        stalled_rounds += 1;
                        if stalled_rounds >= self.config.max_block_retries {
                            log::warn!("Block download to {selector} made no progress, giving up");
                            return self.local_abort(selector, AbortCode::GeneralError);
                        }
                    } else {
                        stalled_rounds = 0;
                    }
                    sent += usize::from(acked);
                    block_size = next;
                }
                _ => return self.protocol_violation(selector),
            }
        }

        let unused = (SEGMENT_PAYLOAD - 1) - (data.len() + SEGMENT_PAYLOAD - 1) % SEGMENT_PAYLOAD;
        let crc = if crc_in_use { crc16(data) } else { 0 };
        self.send(&SdoRequest::BlockDownloadEnd {
            unused: unused as u8,
            crc,
        })?;
        match self.next_reply(selector)? {
            SdoReply::BlockDownloadEnd => Ok(()),
            _ => self.protocol_violation(selector),
        }
    }

    // --- Upload paths ---

    fn segmented_receive(
        &mut self,
        selector: Selector,
        size: Option<usize>,
    ) -> Result<Vec<u8>, TransferError> {
        let mut buffer = Vec::with_capacity(size.unwrap_or(0));
        let mut toggle = false;
        loop {
            self.send(&SdoRequest::UploadSegment { toggle })?;
            match self.next_reply(selector)? {
                SdoReply::UploadSegment {
                    toggle: echoed,
                    data,
                    len,
                    last,
                } => {
                    if echoed != toggle {
                        return self.local_abort(selector, AbortCode::ToggleBitInvalid);
                    }
                    buffer.extend_from_slice(&data[..usize::from(len)]);
                    if last {
                        break;
                    }
                    toggle = !toggle;
                }
                _ => return self.protocol_violation(selector),
            }
        }
        if let Some(expected) = size {
            if buffer.len() != expected {
                return self.local_abort(selector, AbortCode::LengthMismatch);
            }
        }
        Ok(buffer)
    }

    fn block_upload_receive(
        &mut self,
        selector: Selector,
        size: Option<u32>,
        crc_in_use: bool,
    ) -> Result<Vec<u8>, TransferError> {
        let mut buffer = Vec::with_capacity(size.unwrap_or(0) as usize);
        let block_size = self.config.block_size;
        self.send(&SdoRequest::BlockUploadStart)?;
        let mut stalled_rounds = 0u8;
        let mut finished = false;
        while !finished {
            let mut expected = 1u8;
            loop {
                let segment = self.next_block_segment(selector)?;
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
                // The sender stops after the last flag or a full block;
                // either way the round is over and gets acknowledged.
                if segment.last || segment.seq >= block_size {
                    break;
                }
            }
            let acked = expected - 1;
            if acked == 0 {
                stalled_rounds += 1;
                if stalled_rounds >= self.config.max_block_retries {
                    log::warn!("Block upload of {selector} made no progress, giving up");
                    return self.local_abort(selector, AbortCode::GeneralError);
                }
            } else {
                stalled_rounds = 0;
            }
            // A last segment only finishes the transfer when everything
            // before it arrived; otherwise the ack asks for a resend.
            finished = finished && acked > 0;
            self.send(&SdoRequest::BlockUploadAck { acked, block_size })?;
        }

        match self.next_reply(selector)? {
            SdoReply::BlockUploadEnd { unused, crc } => {
                buffer.truncate(buffer.len().saturating_sub(usize::from(unused)));
                if crc_in_use {
                    let mut check = Crc16::new();
                    check.feed(&buffer);
                    if check.finish() != crc {
                        return self.local_abort(selector, AbortCode::CrcError);
                    }
                }
                if let Some(expected) = size {
                    if buffer.len() != expected as usize {
                        return self.local_abort(selector, AbortCode::LengthMismatch);
                    }
                }
                self.send(&SdoRequest::BlockUploadEnd)?;
                Ok(buffer)
            }
            _ => self.protocol_violation(selector),
        }
    }

    // --- Frame plumbing ---

    fn send(&mut self, request: &SdoRequest) -> Result<(), TransferError> {
        self.send_raw(request.frame(self.server))
    }

    fn send_raw(&mut self, frame: CanFrame) -> Result<(), TransferError> {
        self.bus
            .send_frame(&frame)
            .map_err(|_| TransferError::BusLost)
    }

    /// Waits for the next well-formed reply from the server. Frames from
    /// other nodes and undecodable frames are skipped; a timeout aborts the
    /// transfer.
    fn next_reply(&mut self, selector: Selector) -> Result<SdoReply, TransferError> {
        loop {
            let frame = self.next_frame(selector)?;
            match SdoReply::decode(frame.payload()) {
                Ok(SdoReply::Abort { code, .. }) => {
                    log::info!("Server {} aborted transfer of {selector}: {code}", self.server);
                    return Err(TransferError::RemoteAbort(code));
                }
                Ok(reply) => return Ok(reply),
                Err(error) => {
                    log::warn!("Skipping malformed SDO reply: {error}");
                }
            }
        }
    }

    /// Waits for the next block data segment. Aborts from the server are
    /// recognized by their specifier, which block segments cannot carry
    /// because their sequence number is never zero.
    fn next_block_segment(&mut self, selector: Selector) -> Result<BlockSegment, TransferError> {
        let frame = self.next_frame(selector)?;
        match BlockSegment::decode(frame.payload()) {
            Ok(segment) => Ok(segment),
            Err(_) => {
                if let Ok(SdoReply::Abort { code, .. }) = SdoReply::decode(frame.payload()) {
                    log::info!("Server {} aborted block transfer: {code}", self.server);
                    return Err(TransferError::RemoteAbort(code));
                }
                self.local_abort(selector, AbortCode::SequenceNumberInvalid)
            }
        }
    }

    fn next_frame(&mut self, selector: Selector) -> Result<CanFrame, TransferError> {
        loop {
            if !self.bus.wait(self.config.timeout_ms) {
                log::warn!("Timed out waiting for node {}", self.server);
                self.abort(selector, AbortCode::Timeout);
                return Err(TransferError::Timeout);
            }
            let frame = match self.bus.receive_frame() {
                Ok(frame) => frame,
                Err(CanOpenError::IoError) => continue,
                Err(_) => return Err(TransferError::BusLost),
            };
            if frame.id() != self.server.reply_cob_id() || frame.is_rtr() || frame.len() != 8 {
                continue;
            }
            return Ok(frame);
        }
    }

    fn check_selector(&mut self, expected: Selector, echoed: Selector) -> Result<(), TransferError> {
        if expected == echoed {
            return Ok(());
        }
        log::warn!("Server answered for {echoed} instead of {expected}");
        self.local_abort(expected, AbortCode::GeneralError)
    }

    fn protocol_violation<T>(&mut self, selector: Selector) -> Result<T, TransferError> {
        self.local_abort(selector, AbortCode::SpecifierInvalid)
    }

    fn local_abort<T>(&mut self, selector: Selector, code: AbortCode) -> Result<T, TransferError> {
        self.abort(selector, code);
        Err(TransferError::LocalAbort(code))
    }

    /// Best-effort abort; a failing bus cannot be helped at this point.
    fn abort(&mut self, selector: Selector, code: AbortCode) {
        let request = SdoRequest::Abort { selector, code };
        if self.bus.send_frame(&request.frame(self.server)).is_err() {
            log::warn!("Could not send abort for {selector}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec;

    struct MockBus {
        replies: VecDeque<CanFrame>,
        sent: Vec<CanFrame>,
    }

    impl MockBus {
        fn new(replies: impl IntoIterator<Item = CanFrame>) -> Self {
            MockBus {
                replies: replies.into_iter().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl CanInterface for MockBus {
        fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanOpenError> {
            self.sent.push(*frame);
            Ok(())
        }

        fn receive_frame(&mut self) -> Result<CanFrame, CanOpenError> {
            self.replies.pop_front().ok_or(CanOpenError::IoError)
        }

        fn wait(&mut self, _timeout_ms: u32) -> bool {
            !self.replies.is_empty()
        }
    }

    fn node() -> NodeId {
        NodeId::new(0x03).unwrap()
    }

    fn selector() -> Selector {
        Selector::new(0x2000, 0x00)
    }

    #[test]
    fn expedited_download_round_trip() {
        let mut bus = MockBus::new([SdoReply::InitiateDownload {
            selector: selector(),
        }
        .frame(node())]);
        let mut client = SdoClient::new(&mut bus, node());
        client.download(selector(), &[0xAA, 0xBB]).unwrap();
        assert_eq!(bus.sent.len(), 1);
        assert_eq!(bus.sent[0].id(), 0x603);
        assert_eq!(bus.sent[0].data()[0], 0x2B);
    }

    #[test]
    fn upload_falls_back_to_expedited_reply() {
        let mut bus = MockBus::new([SdoReply::InitiateUpload {
            selector: selector(),
            data: InitiateData::expedited(&[0xDE, 0xAD]).unwrap(),
        }
        .frame(node())]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(client.upload(selector()).unwrap(), vec![0xDE, 0xAD]);
        // The request always offers block mode first.
        assert_eq!(bus.sent[0].data()[0] & 0xE0, 0xA0);
    }

    #[test]
    fn segmented_upload_collects_segments() {
        let mut bus = MockBus::new([
            SdoReply::InitiateUpload {
                selector: selector(),
                data: InitiateData::SizeIndicated(10),
            }
            .frame(node()),
            SdoReply::UploadSegment {
                toggle: false,
                data: [1, 2, 3, 4, 5, 6, 7],
                len: 7,
                last: false,
            }
            .frame(node()),
            SdoReply::UploadSegment {
                toggle: true,
                data: [8, 9, 10, 0, 0, 0, 0],
                len: 3,
                last: true,
            }
            .frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.upload(selector()).unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
        );
    }

    #[test]
    fn toggle_mismatch_aborts_locally() {
        let mut bus = MockBus::new([
            SdoReply::InitiateUpload {
                selector: selector(),
                data: InitiateData::Unspecified,
            }
            .frame(node()),
            SdoReply::UploadSegment {
                toggle: true, // first segment must echo toggle 0
                data: [0; 7],
                len: 7,
                last: false,
            }
            .frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.upload(selector()),
            Err(TransferError::LocalAbort(AbortCode::ToggleBitInvalid))
        );
        let abort = bus.sent.last().unwrap();
        assert_eq!(abort.data()[0], 0x80);
        assert_eq!(
            &abort.data()[4..8],
            &AbortCode::ToggleBitInvalid.code().to_le_bytes()
        );
    }

    #[test]
    fn remote_abort_is_reported() {
        let mut bus = MockBus::new([SdoReply::Abort {
            selector: selector(),
            code: AbortCode::SelectorInvalid,
        }
        .frame(node())]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.download(selector(), &[1]),
            Err(TransferError::RemoteAbort(AbortCode::SelectorInvalid))
        );
    }

    #[test]
    fn timeout_sends_abort_frame() {
        let mut bus = MockBus::new([]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.download(selector(), &[1, 2, 3]),
            Err(TransferError::Timeout)
        );
        let abort = bus.sent.last().unwrap();
        assert_eq!(abort.data()[0], 0x80);
        assert_eq!(&abort.data()[4..8], &AbortCode::Timeout.code().to_le_bytes());
    }

    #[test]
    fn frames_from_other_nodes_are_ignored() {
        let stray = CanFrame::new(0x581, &[0x60, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let mut bus = MockBus::new([
            stray,
            SdoReply::InitiateDownload {
                selector: selector(),
            }
            .frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        client.download(selector(), &[1]).unwrap();
    }

    #[test]
    fn block_download_resends_unacknowledged_segments() {
        let data: Vec<u8> = (0..100).collect(); // 15 segments
        let mut bus = MockBus::new([
            SdoReply::BlockDownloadInitiate {
                selector: selector(),
                block_size: 127,
                crc_support: true,
            }
            .frame(node()),
            SdoReply::BlockDownloadAck {
                acked: 10,
                block_size: 127,
            }
            .frame(node()),
            SdoReply::BlockDownloadAck {
                acked: 5,
                block_size: 127,
            }
            .frame(node()),
            SdoReply::BlockDownloadEnd.frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        client.download(selector(), &data).unwrap();
        // initiate + 15 segments + 5 resent segments + end = 22 frames.
        assert_eq!(bus.sent.len(), 22);
        // The first resent segment restarts numbering at 1 and carries the
        // data of the eleventh segment.
        let resent = &bus.sent[16];
        assert_eq!(resent.data()[0], 1);
        assert_eq!(&resent.data()[1..8], &data[70..77]);
        // The end frame carries the padding count and the checksum.
        let end = bus.sent.last().unwrap();
        assert_eq!(end.data()[0], 0xC0 | 1 | (5 << 2));
        assert_eq!(&end.data()[1..3], &crc16(&data).to_le_bytes());
    }

    #[test]
    fn block_download_gives_up_after_stalled_rounds() {
        let data = vec![0u8; 70]; // 10 segments
        let zero_ack = SdoReply::BlockDownloadAck {
            acked: 0,
            block_size: 127,
        }
        .frame(node());
        let mut bus = MockBus::new([
            SdoReply::BlockDownloadInitiate {
                selector: selector(),
                block_size: 127,
                crc_support: false,
            }
            .frame(node()),
            zero_ack,
            zero_ack,
            zero_ack,
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.download(selector(), &data),
            Err(TransferError::LocalAbort(AbortCode::GeneralError))
        );
    }

    #[test]
    fn block_upload_receives_and_verifies_crc() {
        let data: Vec<u8> = (0..10).collect();
        let mut seg1 = [0u8; 7];
        seg1.copy_from_slice(&data[..7]);
        let mut seg2 = [0u8; 7];
        seg2[..3].copy_from_slice(&data[7..]);
        let mut bus = MockBus::new([
            SdoReply::BlockUploadInitiate {
                selector: selector(),
                size: Some(10),
                crc_support: true,
            }
            .frame(node()),
            CanFrame::sdo(
                node().reply_cob_id(),
                BlockSegment {
                    seq: 1,
                    last: false,
                    data: seg1,
                }
                .encode(),
            ),
            CanFrame::sdo(
                node().reply_cob_id(),
                BlockSegment {
                    seq: 2,
                    last: true,
                    data: seg2,
                }
                .encode(),
            ),
            SdoReply::BlockUploadEnd {
                unused: 4,
                crc: crc16(&data),
            }
            .frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(client.upload(selector()).unwrap(), data);
        // initiate, start, ack, end confirmation.
        assert_eq!(bus.sent.len(), 4);
        assert_eq!(bus.sent[2].data()[0], 0xA2);
        assert_eq!(bus.sent[2].data()[1], 2); // both segments acknowledged
    }

    #[test]
    fn block_upload_crc_mismatch_aborts() {
        let mut seg = [0u8; 7];
        seg[..4].copy_from_slice(&[1, 2, 3, 4]);
        let mut bus = MockBus::new([
            SdoReply::BlockUploadInitiate {
                selector: selector(),
                size: Some(4),
                crc_support: true,
            }
            .frame(node()),
            CanFrame::sdo(
                node().reply_cob_id(),
                BlockSegment {
                    seq: 1,
                    last: true,
                    data: seg,
                }
                .encode(),
            ),
            SdoReply::BlockUploadEnd {
                unused: 3,
                crc: 0xBEEF,
            }
            .frame(node()),
        ]);
        let mut client = SdoClient::new(&mut bus, node());
        assert_eq!(
            client.upload(selector()),
            Err(TransferError::LocalAbort(AbortCode::CrcError))
        );
    }
}
