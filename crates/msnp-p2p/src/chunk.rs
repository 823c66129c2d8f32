//! TLP chunk codec
//!
//! A chunk is one fragment of a larger peer-to-peer payload, framed by a
//! version-specific binary header. Version 1 uses a fixed 48-byte
//! little-endian header; version 2 uses a variable-length big-endian header
//! with TLV extensions and a nested data header. The 32-bit application id
//! is carried *outside* the chunk encoding, as a big-endian trailer appended
//! by the transport, so `encode` never emits it and `decode` leaves it zero
//! for the transport to fill in.

use serde::{Deserialize, Serialize};

use crate::errors::ChunkError;

// ----------------------------------------------------------------------------
// Version
// ----------------------------------------------------------------------------

/// Wire-addressing scheme a chunk is framed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlpVersion {
    /// Fixed 48-byte header, account-only addressing
    V1,
    /// TLV-extensible header, machine-guid-qualified addressing
    V2,
}

// ----------------------------------------------------------------------------
// Version 1 Header
// ----------------------------------------------------------------------------

/// Fixed-size version 1 chunk header (48 bytes, little-endian)
///
/// Layout: session_id(4) blob_id(4) offset(8) blob_size(8) chunk_size(4)
/// flags(4) ack_id(4) ack_unique_id(4) ack_size(8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlpV1Header {
    /// Transfer session this chunk belongs to
    pub session_id: u32,
    /// Identifier of the blob being transferred
    pub blob_id: u32,
    /// Offset of this chunk's payload within the blob
    pub offset: u64,
    /// Total size of the blob
    pub blob_size: u64,
    /// Payload length of this chunk
    pub chunk_size: u32,
    /// Chunk flags
    pub flags: u32,
    /// Blob id being acknowledged
    pub ack_id: u32,
    /// Unique id of the acknowledged blob
    pub ack_unique_id: u32,
    /// Size of the acknowledged blob
    pub ack_size: u64,
}

impl TlpV1Header {
    /// Encoded header length in bytes
    pub const LEN: usize = 48;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.session_id.to_le_bytes());
        out.extend_from_slice(&self.blob_id.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.blob_size.to_le_bytes());
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.ack_id.to_le_bytes());
        out.extend_from_slice(&self.ack_unique_id.to_le_bytes());
        out.extend_from_slice(&self.ack_size.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, ChunkError> {
        if bytes.len() < Self::LEN {
            return Err(ChunkError::Truncated {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            session_id: read_u32_le(&bytes[0..4]),
            blob_id: read_u32_le(&bytes[4..8]),
            offset: read_u64_le(&bytes[8..16]),
            blob_size: read_u64_le(&bytes[16..24]),
            chunk_size: read_u32_le(&bytes[24..28]),
            flags: read_u32_le(&bytes[28..32]),
            ack_id: read_u32_le(&bytes[32..36]),
            ack_unique_id: read_u32_le(&bytes[36..40]),
            ack_size: read_u64_le(&bytes[40..48]),
        })
    }
}

// ----------------------------------------------------------------------------
// Version 2 Header
// ----------------------------------------------------------------------------

/// One TLV extension field of a version 2 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlv {
    /// Field type; zero is reserved for padding
    pub kind: u8,
    /// Field value, at most 255 bytes
    pub value: Vec<u8>,
}

/// Nested data header of a version 2 chunk carrying payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlpV2DataHeader {
    /// Transfer/flag combination byte
    pub tf_combination: u8,
    /// Package (datagram) number
    pub package_number: u16,
    /// Transfer session this chunk belongs to
    pub session_id: u32,
    /// Data-header TLV extensions
    pub tlvs: Vec<Tlv>,
}

impl TlpV2DataHeader {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), ChunkError> {
        let mut tlv_bytes = Vec::new();
        encode_tlvs(&self.tlvs, &mut tlv_bytes)?;
        let unpadded = 8 + tlv_bytes.len();
        let padded = pad4(unpadded);
        if padded > u8::MAX as usize {
            return Err(ChunkError::HeaderOverflow);
        }
        out.push(padded as u8);
        out.push(self.tf_combination);
        out.extend_from_slice(&self.package_number.to_be_bytes());
        out.extend_from_slice(&self.session_id.to_be_bytes());
        out.extend_from_slice(&tlv_bytes);
        out.resize(out.len() + (padded - unpadded), 0);
        Ok(())
    }
}

/// Variable-length version 2 chunk header (big-endian)
///
/// Layout: header_length(1) op_code(1) message_size(2) sequence_number(4),
/// then TLVs zero-padded to `header_length`. When `message_size` is nonzero
/// a data header follows: length(1) tf_combination(1) package_number(2)
/// session_id(4) plus its own TLVs, and the payload after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlpV2Header {
    /// Operation code (zero for plain data)
    pub op_code: u8,
    /// Sequence number of this chunk
    pub sequence_number: u32,
    /// Header TLV extensions
    pub tlvs: Vec<Tlv>,
    /// Data header, present exactly when the chunk carries data
    pub data: Option<TlpV2DataHeader>,
}

impl TlpV2Header {
    fn encode_into(&self, payload_len: usize, out: &mut Vec<u8>) -> Result<(), ChunkError> {
        let mut tlv_bytes = Vec::new();
        encode_tlvs(&self.tlvs, &mut tlv_bytes)?;
        let unpadded = 8 + tlv_bytes.len();
        let padded = pad4(unpadded);
        if padded > u8::MAX as usize {
            return Err(ChunkError::HeaderOverflow);
        }

        let mut data_bytes = Vec::new();
        match &self.data {
            Some(data) => data.encode_into(&mut data_bytes)?,
            None if payload_len > 0 => return Err(ChunkError::MissingDataHeader),
            None => {}
        }
        let message_size = data_bytes.len() + payload_len;
        if message_size > u16::MAX as usize {
            return Err(ChunkError::HeaderOverflow);
        }

        out.push(padded as u8);
        out.push(self.op_code);
        out.extend_from_slice(&(message_size as u16).to_be_bytes());
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&tlv_bytes);
        out.resize(out.len() + (padded - unpadded), 0);
        out.extend_from_slice(&data_bytes);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<(Self, Vec<u8>), ChunkError> {
        if bytes.len() < 8 {
            return Err(ChunkError::Truncated {
                expected: 8,
                actual: bytes.len(),
            });
        }
        let header_len = bytes[0] as usize;
        if header_len < 8 {
            return Err(ChunkError::InvalidHeader {
                reason: format!("header length {header_len} below fixed part"),
            });
        }
        if header_len > bytes.len() {
            return Err(ChunkError::Truncated {
                expected: header_len,
                actual: bytes.len(),
            });
        }
        let op_code = bytes[1];
        let message_size = read_u16_be(&bytes[2..4]) as usize;
        let sequence_number = read_u32_be(&bytes[4..8]);
        let tlvs = parse_tlvs(&bytes[8..header_len])?;

        let rest = &bytes[header_len..];
        if rest.len() != message_size {
            return Err(ChunkError::LengthMismatch {
                declared: message_size,
                actual: rest.len(),
            });
        }
        if message_size == 0 {
            let header = Self {
                op_code,
                sequence_number,
                tlvs,
                data: None,
            };
            return Ok((header, Vec::new()));
        }

        if rest.len() < 8 {
            return Err(ChunkError::Truncated {
                expected: 8,
                actual: rest.len(),
            });
        }
        let data_len = rest[0] as usize;
        if data_len < 8 {
            return Err(ChunkError::InvalidHeader {
                reason: format!("data header length {data_len} below fixed part"),
            });
        }
        if data_len > rest.len() {
            return Err(ChunkError::Truncated {
                expected: data_len,
                actual: rest.len(),
            });
        }
        let data = TlpV2DataHeader {
            tf_combination: rest[1],
            package_number: read_u16_be(&rest[2..4]),
            session_id: read_u32_be(&rest[4..8]),
            tlvs: parse_tlvs(&rest[8..data_len])?,
        };
        let payload = rest[data_len..].to_vec();
        let header = Self {
            op_code,
            sequence_number,
            tlvs,
            data: Some(data),
        };
        Ok((header, payload))
    }
}

// ----------------------------------------------------------------------------
// Message Chunk
// ----------------------------------------------------------------------------

/// Version-tagged chunk header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkHeader {
    V1(TlpV1Header),
    V2(TlpV2Header),
}

/// One peer-to-peer chunk: header, payload and out-of-band application id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    /// Upper-layer consumer tag, carried as the message trailer
    pub application_id: u32,
    /// Version-specific header
    pub header: ChunkHeader,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl MessageChunk {
    /// Create a version 1 data chunk; `chunk_size` is derived from the payload
    pub fn v1(
        session_id: u32,
        blob_id: u32,
        offset: u64,
        blob_size: u64,
        flags: u32,
        payload: Vec<u8>,
    ) -> Self {
        let header = TlpV1Header {
            session_id,
            blob_id,
            offset,
            blob_size,
            chunk_size: payload.len() as u32,
            flags,
            ack_id: 0,
            ack_unique_id: 0,
            ack_size: 0,
        };
        Self {
            application_id: 0,
            header: ChunkHeader::V1(header),
            payload,
        }
    }

    /// Create a version 2 data chunk
    pub fn v2(
        session_id: u32,
        sequence_number: u32,
        tf_combination: u8,
        package_number: u16,
        payload: Vec<u8>,
    ) -> Self {
        let header = TlpV2Header {
            op_code: 0,
            sequence_number,
            tlvs: Vec::new(),
            data: Some(TlpV2DataHeader {
                tf_combination,
                package_number,
                session_id,
                tlvs: Vec::new(),
            }),
        };
        Self {
            application_id: 0,
            header: ChunkHeader::V2(header),
            payload,
        }
    }

    /// Create a payload-less version 2 control chunk
    pub fn v2_control(op_code: u8, sequence_number: u32) -> Self {
        let header = TlpV2Header {
            op_code,
            sequence_number,
            tlvs: Vec::new(),
            data: None,
        };
        Self {
            application_id: 0,
            header: ChunkHeader::V2(header),
            payload: Vec::new(),
        }
    }

    /// Set the application id
    pub fn with_application_id(mut self, application_id: u32) -> Self {
        self.application_id = application_id;
        self
    }

    /// Wire-addressing scheme this chunk is framed with
    pub fn version(&self) -> TlpVersion {
        match self.header {
            ChunkHeader::V1(_) => TlpVersion::V1,
            ChunkHeader::V2(_) => TlpVersion::V2,
        }
    }

    /// Serialize header and payload; the application id is not included
    pub fn encode(&self) -> Result<Vec<u8>, ChunkError> {
        let mut out = Vec::with_capacity(TlpV1Header::LEN + self.payload.len());
        match &self.header {
            ChunkHeader::V1(header) => {
                if header.chunk_size as usize != self.payload.len() {
                    return Err(ChunkError::LengthMismatch {
                        declared: header.chunk_size as usize,
                        actual: self.payload.len(),
                    });
                }
                header.encode_into(&mut out);
                out.extend_from_slice(&self.payload);
            }
            ChunkHeader::V2(header) => {
                header.encode_into(self.payload.len(), &mut out)?;
                out.extend_from_slice(&self.payload);
            }
        }
        Ok(out)
    }

    /// Parse a chunk of the given version; the application id is left zero
    pub fn decode(version: TlpVersion, bytes: &[u8]) -> Result<Self, ChunkError> {
        match version {
            TlpVersion::V1 => {
                let header = TlpV1Header::decode(bytes)?;
                let payload = bytes[TlpV1Header::LEN..].to_vec();
                if header.chunk_size as usize != payload.len() {
                    return Err(ChunkError::LengthMismatch {
                        declared: header.chunk_size as usize,
                        actual: payload.len(),
                    });
                }
                Ok(Self {
                    application_id: 0,
                    header: ChunkHeader::V1(header),
                    payload,
                })
            }
            TlpVersion::V2 => {
                let (header, payload) = TlpV2Header::decode(bytes)?;
                Ok(Self {
                    application_id: 0,
                    header: ChunkHeader::V2(header),
                    payload,
                })
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

fn encode_tlvs(tlvs: &[Tlv], out: &mut Vec<u8>) -> Result<(), ChunkError> {
    for tlv in tlvs {
        if tlv.kind == 0 {
            return Err(ChunkError::InvalidHeader {
                reason: "TLV type zero is reserved for padding".into(),
            });
        }
        if tlv.value.len() > u8::MAX as usize {
            return Err(ChunkError::HeaderOverflow);
        }
        out.push(tlv.kind);
        out.push(tlv.value.len() as u8);
        out.extend_from_slice(&tlv.value);
    }
    Ok(())
}

fn parse_tlvs(bytes: &[u8]) -> Result<Vec<Tlv>, ChunkError> {
    let mut tlvs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let kind = bytes[i];
        if kind == 0 {
            // zero padding fills the rest of the header
            break;
        }
        if i + 2 > bytes.len() {
            return Err(ChunkError::Truncated {
                expected: i + 2,
                actual: bytes.len(),
            });
        }
        let len = bytes[i + 1] as usize;
        if i + 2 + len > bytes.len() {
            return Err(ChunkError::Truncated {
                expected: i + 2 + len,
                actual: bytes.len(),
            });
        }
        tlvs.push(Tlv {
            kind,
            value: bytes[i + 2..i + 2 + len].to_vec(),
        });
        i += 2 + len;
    }
    Ok(tlvs)
}

fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
