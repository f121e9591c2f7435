//! Encoding and decoding of the 8-byte SDO command payloads.
//!
//! Requests and replies are closed unions with one variant per command
//! specifier, so the state machines match on protocol messages instead of
//! raw bytes. Block data segments carry no specifier at all and live in
//! their own type, [`BlockSegment`].

use super::{
    CCS_ABORT, CCS_BLOCK_DOWNLOAD, CCS_BLOCK_UPLOAD, CCS_DOWNLOAD_SEGMENT, CCS_INITIATE_DOWNLOAD,
    CCS_INITIATE_UPLOAD, CCS_UPLOAD_SEGMENT, CRC_SUPPORTED, EXPEDITED, LAST_BLOCK, LAST_SEGMENT,
    SC_ACK, SC_END, SC_INITIATE, SC_START, SCS_ABORT, SCS_BLOCK_DOWNLOAD, SCS_BLOCK_UPLOAD,
    SCS_DOWNLOAD_SEGMENT, SCS_INITIATE_DOWNLOAD, SCS_INITIATE_UPLOAD, SCS_UPLOAD_SEGMENT,
    SEGMENT_PAYLOAD, SEQNO_MASK, SIZE_SPECIFIED, SPECIFIER_MASK, SUBCOMMAND_MASK, TOGGLE,
};
use crate::frame::CanFrame;
use crate::hal::CanOpenError;
use crate::sdo::abort::AbortCode;
use crate::types::{NodeId, Selector};

/// Size information carried by an initiate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiateData {
    /// The whole object travels in bytes 4-7 of the initiate message
    /// itself; `len` is 1-4.
    Expedited { data: [u8; 4], len: u8 },
    /// A multi-segment transfer follows; the total byte count is announced
    /// up front.
    SizeIndicated(u32),
    /// A multi-segment transfer follows with no announced size; it runs
    /// until a segment carries the last flag.
    Unspecified,
}

impl InitiateData {
    /// Builds the expedited variant. Only payloads of 1-4 bytes fit.
    pub fn expedited(payload: &[u8]) -> Result<Self, CanOpenError> {
        if payload.is_empty() || payload.len() > 4 {
            return Err(CanOpenError::InvalidDataLength(payload.len()));
        }
        let mut data = [0u8; 4];
        data[..payload.len()].copy_from_slice(payload);
        Ok(InitiateData::Expedited {
            data,
            len: payload.len() as u8,
        })
    }

    /// The expedited payload, when present.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            InitiateData::Expedited { data, len } => Some(&data[..usize::from(*len)]),
            _ => None,
        }
    }

    fn encode(&self, payload: &mut [u8; 8]) {
        match self {
            InitiateData::Expedited { data, len } => {
                let unused = 4 - len;
                payload[0] |= EXPEDITED | SIZE_SPECIFIED | (unused << 2);
                payload[4..8].copy_from_slice(data);
            }
            InitiateData::SizeIndicated(size) => {
                payload[0] |= SIZE_SPECIFIED;
                payload[4..8].copy_from_slice(&size.to_le_bytes());
            }
            InitiateData::Unspecified => {}
        }
    }

    fn decode(payload: &[u8; 8]) -> Self {
        let expedited = payload[0] & EXPEDITED != 0;
        let sized = payload[0] & SIZE_SPECIFIED != 0;
        if expedited {
            // Without the size bit all four bytes are assumed valid.
            let len = if sized { 4 - ((payload[0] >> 2) & 0x03) } else { 4 };
            let mut data = [0u8; 4];
            data.copy_from_slice(&payload[4..8]);
            InitiateData::Expedited { data, len }
        } else if sized {
            InitiateData::SizeIndicated(u32::from_le_bytes([
                payload[4], payload[5], payload[6], payload[7],
            ]))
        } else {
            InitiateData::Unspecified
        }
    }
}

/// An SDO message sent by the client, addressed to `0x600 + node id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdoRequest {
    /// Starts a write. Expedited data rides along; otherwise segments follow.
    InitiateDownload {
        selector: Selector,
        data: InitiateData,
    },
    /// One 7-byte slice of a segmented download.
    DownloadSegment {
        toggle: bool,
        data: [u8; 7],
        len: u8,
        last: bool,
    },
    /// Starts a read.
    InitiateUpload { selector: Selector },
    /// Requests the next slice of a segmented upload.
    UploadSegment { toggle: bool },
    /// Terminates the transfer with a reason code.
    Abort { selector: Selector, code: AbortCode },
    /// Starts a block write, optionally announcing the total size.
    BlockDownloadInitiate {
        selector: Selector,
        size: Option<u32>,
        crc_support: bool,
    },
    /// Closes a block write: count of padding bytes in the final segment
    /// plus the checksum over the whole object.
    BlockDownloadEnd { unused: u8, crc: u16 },
    /// Starts a block read. `switch_threshold` lets the server answer with
    /// a plain upload instead when the object is no longer than that.
    BlockUploadInitiate {
        selector: Selector,
        block_size: u8,
        switch_threshold: u8,
        crc_support: bool,
    },
    /// Tells the server to begin streaming segments.
    BlockUploadStart,
    /// Acknowledges `acked` in-sequence segments and names the size of the
    /// next block.
    BlockUploadAck { acked: u8, block_size: u8 },
    /// Confirms the server's block-end message, finishing the upload.
    BlockUploadEnd,
}

impl SdoRequest {
    /// Convenience constructor for expedited writes of 1-4 bytes.
    pub fn expedited_download(selector: Selector, data: &[u8]) -> Result<Self, CanOpenError> {
        Ok(SdoRequest::InitiateDownload {
            selector,
            data: InitiateData::expedited(data)?,
        })
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut payload = [0u8; 8];
        match self {
            SdoRequest::InitiateDownload { selector, data } => {
                payload[0] = CCS_INITIATE_DOWNLOAD;
                selector.write_payload(&mut payload);
                data.encode(&mut payload);
            }
            SdoRequest::DownloadSegment {
                toggle,
                data,
                len,
                last,
            } => {
                let unused = SEGMENT_PAYLOAD as u8 - len;
                payload[0] = CCS_DOWNLOAD_SEGMENT | (unused << 1);
                if *toggle {
                    payload[0] |= TOGGLE;
                }
                if *last {
                    payload[0] |= LAST_SEGMENT;
                }
                payload[1..8].copy_from_slice(data);
            }
            SdoRequest::InitiateUpload { selector } => {
                payload[0] = CCS_INITIATE_UPLOAD;
                selector.write_payload(&mut payload);
            }
            SdoRequest::UploadSegment { toggle } => {
                payload[0] = CCS_UPLOAD_SEGMENT;
                if *toggle {
                    payload[0] |= TOGGLE;
                }
            }
            SdoRequest::Abort { selector, code } => {
                payload[0] = CCS_ABORT;
                selector.write_payload(&mut payload);
                payload[4..8].copy_from_slice(&code.code().to_le_bytes());
            }
            SdoRequest::BlockDownloadInitiate {
                selector,
                size,
                crc_support,
            } => {
                payload[0] = CCS_BLOCK_DOWNLOAD | SC_INITIATE;
                if *crc_support {
                    payload[0] |= CRC_SUPPORTED;
                }
                selector.write_payload(&mut payload);
                if let Some(size) = size {
                    payload[0] |= SIZE_SPECIFIED << 1;
                    payload[4..8].copy_from_slice(&size.to_le_bytes());
                }
            }
            SdoRequest::BlockDownloadEnd { unused, crc } => {
                payload[0] = CCS_BLOCK_DOWNLOAD | SC_END | (unused << 2);
                payload[1..3].copy_from_slice(&crc.to_le_bytes());
            }
            SdoRequest::BlockUploadInitiate {
                selector,
                block_size,
                switch_threshold,
                crc_support,
            } => {
                payload[0] = CCS_BLOCK_UPLOAD | SC_INITIATE;
                if *crc_support {
                    payload[0] |= CRC_SUPPORTED;
                }
                selector.write_payload(&mut payload);
                payload[4] = *block_size;
                payload[5] = *switch_threshold;
            }
            SdoRequest::BlockUploadStart => {
                payload[0] = CCS_BLOCK_UPLOAD | SC_START;
            }
            SdoRequest::BlockUploadAck { acked, block_size } => {
                payload[0] = CCS_BLOCK_UPLOAD | SC_ACK;
                payload[1] = *acked;
                payload[2] = *block_size;
            }
            SdoRequest::BlockUploadEnd => {
                payload[0] = CCS_BLOCK_UPLOAD | SC_END;
            }
        }
        payload
    }

    pub fn decode(payload: &[u8; 8]) -> Result<Self, CanOpenError> {
        let command = payload[0];
        match command & SPECIFIER_MASK {
            CCS_DOWNLOAD_SEGMENT => {
                let unused = (command >> 1) & 0x07;
                let mut data = [0u8; 7];
                data.copy_from_slice(&payload[1..8]);
                Ok(SdoRequest::DownloadSegment {
                    toggle: command & TOGGLE != 0,
                    data,
                    len: SEGMENT_PAYLOAD as u8 - unused,
                    last: command & LAST_SEGMENT != 0,
                })
            }
            CCS_INITIATE_DOWNLOAD => Ok(SdoRequest::InitiateDownload {
                selector: Selector::from_payload(payload),
                data: InitiateData::decode(payload),
            }),
            CCS_INITIATE_UPLOAD => Ok(SdoRequest::InitiateUpload {
                selector: Selector::from_payload(payload),
            }),
            CCS_UPLOAD_SEGMENT => Ok(SdoRequest::UploadSegment {
                toggle: command & TOGGLE != 0,
            }),
            CCS_ABORT => Ok(SdoRequest::Abort {
                selector: Selector::from_payload(payload),
                code: AbortCode::from_code(u32::from_le_bytes([
                    payload[4], payload[5], payload[6], payload[7],
                ])),
            }),
            CCS_BLOCK_UPLOAD => match command & SUBCOMMAND_MASK {
                SC_INITIATE => Ok(SdoRequest::BlockUploadInitiate {
                    selector: Selector::from_payload(payload),
                    block_size: payload[4],
                    switch_threshold: payload[5],
                    crc_support: command & CRC_SUPPORTED != 0,
                }),
                SC_END => Ok(SdoRequest::BlockUploadEnd),
                SC_ACK => Ok(SdoRequest::BlockUploadAck {
                    acked: payload[1],
                    block_size: payload[2],
                }),
                _ => Ok(SdoRequest::BlockUploadStart),
            },
            // Bit 1 of a block download initiate is the size flag, so only
            // bit 0 distinguishes the sub-commands here.
            CCS_BLOCK_DOWNLOAD => match command & 0x01 {
                SC_INITIATE => {
                    let size = if command & (SIZE_SPECIFIED << 1) != 0 {
                        Some(u32::from_le_bytes([
                            payload[4], payload[5], payload[6], payload[7],
                        ]))
                    } else {
                        None
                    };
                    Ok(SdoRequest::BlockDownloadInitiate {
                        selector: Selector::from_payload(payload),
                        size,
                        crc_support: command & CRC_SUPPORTED != 0,
                    })
                }
                _ => Ok(SdoRequest::BlockDownloadEnd {
                    unused: (command >> 2) & 0x07,
                    crc: u16::from_le_bytes([payload[1], payload[2]]),
                }),
            },
            _ => Err(CanOpenError::InvalidCommandSpecifier(command)),
        }
    }

    /// Wraps the request into a frame addressed to `node`.
    pub fn frame(&self, node: NodeId) -> CanFrame {
        CanFrame::sdo(node.request_cob_id(), self.encode())
    }
}

/// An SDO message sent by the server, on `0x580 + node id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdoReply {
    /// Confirms a download initiate.
    InitiateDownload { selector: Selector },
    /// Confirms one downloaded segment, echoing its toggle bit.
    DownloadSegment { toggle: bool },
    /// Answers an upload initiate, either with the whole object (expedited)
    /// or announcing the segmented transfer.
    InitiateUpload {
        selector: Selector,
        data: InitiateData,
    },
    /// One 7-byte slice of a segmented upload.
    UploadSegment {
        toggle: bool,
        data: [u8; 7],
        len: u8,
        last: bool,
    },
    /// Terminates the transfer with a reason code.
    Abort { selector: Selector, code: AbortCode },
    /// Accepts a block download and names the segments per block.
    BlockDownloadInitiate {
        selector: Selector,
        block_size: u8,
        crc_support: bool,
    },
    /// Acknowledges `acked` in-sequence segments and names the size of the
    /// next block.
    BlockDownloadAck { acked: u8, block_size: u8 },
    /// Confirms the client's block-end message, finishing the download.
    BlockDownloadEnd,
    /// Accepts a block upload, optionally announcing the total size.
    BlockUploadInitiate {
        selector: Selector,
        size: Option<u32>,
        crc_support: bool,
    },
    /// Closes a block upload: padding byte count plus checksum.
    BlockUploadEnd { unused: u8, crc: u16 },
}

impl SdoReply {
    pub fn encode(&self) -> [u8; 8] {
        let mut payload = [0u8; 8];
        match self {
            SdoReply::InitiateDownload { selector } => {
                payload[0] = SCS_INITIATE_DOWNLOAD;
                selector.write_payload(&mut payload);
            }
            SdoReply::DownloadSegment { toggle } => {
                payload[0] = SCS_DOWNLOAD_SEGMENT;
                if *toggle {
                    payload[0] |= TOGGLE;
                }
            }
            SdoReply::InitiateUpload { selector, data } => {
                payload[0] = SCS_INITIATE_UPLOAD;
                selector.write_payload(&mut payload);
                data.encode(&mut payload);
            }
            SdoReply::UploadSegment {
                toggle,
                data,
                len,
                last,
            } => {
                let unused = SEGMENT_PAYLOAD as u8 - len;
                payload[0] = SCS_UPLOAD_SEGMENT | (unused << 1);
                if *toggle {
                    payload[0] |= TOGGLE;
                }
                if *last {
                    payload[0] |= LAST_SEGMENT;
                }
                payload[1..8].copy_from_slice(data);
            }
            SdoReply::Abort { selector, code } => {
                payload[0] = SCS_ABORT;
                selector.write_payload(&mut payload);
                payload[4..8].copy_from_slice(&code.code().to_le_bytes());
            }
            SdoReply::BlockDownloadInitiate {
                selector,
                block_size,
                crc_support,
            } => {
                payload[0] = SCS_BLOCK_DOWNLOAD | SC_INITIATE;
                if *crc_support {
                    payload[0] |= CRC_SUPPORTED;
                }
                selector.write_payload(&mut payload);
                payload[4] = *block_size;
            }
            SdoReply::BlockDownloadAck { acked, block_size } => {
                payload[0] = SCS_BLOCK_DOWNLOAD | SC_ACK;
                payload[1] = *acked;
                payload[2] = *block_size;
            }
            SdoReply::BlockDownloadEnd => {
                payload[0] = SCS_BLOCK_DOWNLOAD | SC_END;
            }
            SdoReply::BlockUploadInitiate {
                selector,
                size,
                crc_support,
            } => {
                payload[0] = SCS_BLOCK_UPLOAD | SC_INITIATE;
                if *crc_support {
                    payload[0] |= CRC_SUPPORTED;
                }
                selector.write_payload(&mut payload);
                if let Some(size) = size {
                    payload[0] |= SIZE_SPECIFIED << 1;
                    payload[4..8].copy_from_slice(&size.to_le_bytes());
                }
            }
            SdoReply::BlockUploadEnd { unused, crc } => {
                payload[0] = SCS_BLOCK_UPLOAD | SC_END | (unused << 2);
                payload[1..3].copy_from_slice(&crc.to_le_bytes());
            }
        }
        payload
    }

    pub fn decode(payload: &[u8; 8]) -> Result<Self, CanOpenError> {
        let command = payload[0];
        match command & SPECIFIER_MASK {
            SCS_UPLOAD_SEGMENT => {
                let unused = (command >> 1) & 0x07;
                let mut data = [0u8; 7];
                data.copy_from_slice(&payload[1..8]);
                Ok(SdoReply::UploadSegment {
                    toggle: command & TOGGLE != 0,
                    data,
                    len: SEGMENT_PAYLOAD as u8 - unused,
                    last: command & LAST_SEGMENT != 0,
                })
            }
            SCS_DOWNLOAD_SEGMENT => Ok(SdoReply::DownloadSegment {
                toggle: command & TOGGLE != 0,
            }),
            SCS_INITIATE_UPLOAD => Ok(SdoReply::InitiateUpload {
                selector: Selector::from_payload(payload),
                data: InitiateData::decode(payload),
            }),
            SCS_INITIATE_DOWNLOAD => Ok(SdoReply::InitiateDownload {
                selector: Selector::from_payload(payload),
            }),
            SCS_ABORT => Ok(SdoReply::Abort {
                selector: Selector::from_payload(payload),
                code: AbortCode::from_code(u32::from_le_bytes([
                    payload[4], payload[5], payload[6], payload[7],
                ])),
            }),
            SCS_BLOCK_DOWNLOAD => match command & SUBCOMMAND_MASK {
                SC_INITIATE => Ok(SdoReply::BlockDownloadInitiate {
                    selector: Selector::from_payload(payload),
                    block_size: payload[4],
                    crc_support: command & CRC_SUPPORTED != 0,
                }),
                SC_ACK => Ok(SdoReply::BlockDownloadAck {
                    acked: payload[1],
                    block_size: payload[2],
                }),
                SC_END => Ok(SdoReply::BlockDownloadEnd),
                _ => Err(CanOpenError::InvalidCommandSpecifier(command)),
            },
            // Bit 1 of a block upload initiate reply is the size flag, so
            // only bit 0 distinguishes the sub-commands here.
            SCS_BLOCK_UPLOAD => match command & 0x01 {
                SC_INITIATE => {
                    let size = if command & (SIZE_SPECIFIED << 1) != 0 {
                        Some(u32::from_le_bytes([
                            payload[4], payload[5], payload[6], payload[7],
                        ]))
                    } else {
                        None
                    };
                    Ok(SdoReply::BlockUploadInitiate {
                        selector: Selector::from_payload(payload),
                        size,
                        crc_support: command & CRC_SUPPORTED != 0,
                    })
                }
                _ => Ok(SdoReply::BlockUploadEnd {
                    unused: (command >> 2) & 0x07,
                    crc: u16::from_le_bytes([payload[1], payload[2]]),
                }),
            },
            _ => Err(CanOpenError::InvalidCommandSpecifier(command)),
        }
    }

    /// Wraps the reply into a frame sent on behalf of `node`.
    pub fn frame(&self, node: NodeId) -> CanFrame {
        CanFrame::sdo(node.reply_cob_id(), self.encode())
    }
}

/// One data frame of a block transfer. It occupies the whole command byte
/// with a sequence number (1-127) and a last flag instead of a specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSegment {
    pub seq: u8,
    pub last: bool,
    pub data: [u8; 7],
}

impl BlockSegment {
    pub fn encode(&self) -> [u8; 8] {
        let mut payload = [0u8; 8];
        payload[0] = self.seq & SEQNO_MASK;
        if self.last {
            payload[0] |= LAST_BLOCK;
        }
        payload[1..8].copy_from_slice(&self.data);
        payload
    }

    /// Decodes a block data frame. Sequence number zero is never valid; it
    /// would collide with the abort specifier in the stateful decode.
    pub fn decode(payload: &[u8; 8]) -> Result<Self, CanOpenError> {
        let seq = payload[0] & SEQNO_MASK;
        if seq == 0 {
            return Err(CanOpenError::InvalidSequenceNumber(0));
        }
        let mut data = [0u8; 7];
        data.copy_from_slice(&payload[1..8]);
        Ok(BlockSegment {
            seq,
            last: payload[0] & LAST_BLOCK != 0,
            data,
        })
    }
}
