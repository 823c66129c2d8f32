//! Error types for the switchboard layer
//!
//! Expected protocol outcomes (an invitation that fails, a chunk addressed
//! to another endpoint) are not errors; they are handled where they occur.
//! The types here cover the service seam and caller mistakes: talking to a
//! handler that does not exist, or feeding the manager an event for a
//! session it never registered.

use crate::types::{HandlerId, SessionId};

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Errors reported by the network collaborator behind [`crate::session::SessionService`]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session request refused: {reason}")]
    RequestRefused { reason: String },

    #[error("session {session} is not open")]
    NotOpen { session: SessionId },

    #[error("transmit failed on session {session}: {reason}")]
    TransmitFailed { session: SessionId, reason: String },
}

// ----------------------------------------------------------------------------
// Dispatch Errors
// ----------------------------------------------------------------------------

/// Errors raised by the manager when an operation or event cannot be routed
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered with id {handler}")]
    UnknownHandler { handler: HandlerId },

    #[error("state change for unknown session {session}")]
    UnknownSession { session: SessionId },

    #[error("handler {handler} is already bound to session {session}")]
    AlreadyBound {
        handler: HandlerId,
        session: SessionId,
    },

    #[error("handler {handler} is awaiting a requested session")]
    PendingRequest { handler: HandlerId },
}

// ----------------------------------------------------------------------------
// Crate Error
// ----------------------------------------------------------------------------

/// Unified error type for the switchboard layer
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("invalid contact address: {account:?}")]
    InvalidAddress { account: String },

    #[error("invalid machine guid: {text:?}")]
    InvalidGuid { text: String },
}

impl SwitchboardError {
    /// Create an invalid contact address error
    pub fn invalid_address<T: Into<String>>(account: T) -> Self {
        SwitchboardError::InvalidAddress {
            account: account.into(),
        }
    }

    /// Create an invalid machine guid error
    pub fn invalid_guid<T: Into<String>>(text: T) -> Self {
        SwitchboardError::InvalidGuid { text: text.into() }
    }

    /// Create an unknown handler error
    pub fn unknown_handler(handler: HandlerId) -> Self {
        SwitchboardError::Dispatch(DispatchError::UnknownHandler { handler })
    }

    /// Create an unknown session error
    pub fn unknown_session(session: SessionId) -> Self {
        SwitchboardError::Dispatch(DispatchError::UnknownSession { session })
    }

    /// Create an already-bound error
    pub fn already_bound(handler: HandlerId, session: SessionId) -> Self {
        SwitchboardError::Dispatch(DispatchError::AlreadyBound { handler, session })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, SwitchboardError>;
