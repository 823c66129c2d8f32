//! Chunked peer-to-peer transport over MSNP switchboard sessions
//!
//! This crate layers a chunked, flow-controlled, version-negotiated binary
//! transport on top of a `msnp-switchboard` conversation handler, for direct
//! peer-to-peer data exchange (file transfer, custom emoticons and friends).
//! It packetizes binary payloads into TLP chunks, enforces an in-flight send
//! window, and negotiates the two wire-addressing schemes: legacy
//! account-only addressing (version 1) and machine-guid-qualified addressing
//! (version 2).
//!
//! How the pieces above and below the chunk boundary assemble payloads is
//! out of scope; callers fragment to [`transport::MAX_CHUNK_SIZE`] before
//! handing chunks to a [`transport::PeerTransport`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod chunk;
pub mod errors;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use chunk::{ChunkHeader, MessageChunk, Tlv, TlpV1Header, TlpV2DataHeader, TlpV2Header, TlpVersion};
pub use errors::{ChunkError, P2pError, Result};
pub use transport::{
    PeerTransport, TransportSink, HEADER_P2P_DEST, HEADER_P2P_SRC, MAX_CHUNK_SIZE,
    MAX_OUTSTANDING_SENDS, P2P_CONTENT_TYPE,
};
