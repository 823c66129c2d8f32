//! Error types for the peer-to-peer transport layer
//!
//! Wire-level oddities on receive (a chunk addressed to another endpoint,
//! an undecodable body) are dropped where they occur and never surface as
//! errors; these types cover encoding problems and misuse of the send path.

use crate::transport::{MAX_CHUNK_SIZE, MAX_OUTSTANDING_SENDS};

// ----------------------------------------------------------------------------
// Chunk Errors
// ----------------------------------------------------------------------------

/// Structural problems in a chunk's binary encoding
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("length field mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("invalid chunk header: {reason}")]
    InvalidHeader { reason: String },

    #[error("header fields exceed the one-byte length encoding")]
    HeaderOverflow,

    #[error("payload carried without a data header")]
    MissingDataHeader,
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Unified error type for the peer transport
#[derive(Debug, thiserror::Error)]
pub enum P2pError {
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("switchboard error: {0}")]
    Switchboard(#[from] msnp_switchboard::SwitchboardError),

    #[error("send window full ({MAX_OUTSTANDING_SENDS} chunks in flight)")]
    WindowFull,

    #[error("encoded chunk is {size} bytes, above the {MAX_CHUNK_SIZE} byte limit")]
    ChunkTooLarge { size: usize },

    #[error("transport is closed")]
    TransportClosed,
}

impl P2pError {
    /// Create an invalid header error with a reason
    pub fn invalid_header<T: Into<String>>(reason: T) -> Self {
        P2pError::Chunk(ChunkError::InvalidHeader {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, P2pError>;
