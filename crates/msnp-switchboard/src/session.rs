//! Switchboard sessions and the network service seam
//!
//! A session is a short-lived routing channel shared by a small set of
//! participants. The network collaborator owns the actual connection and
//! line protocol; this crate only observes sessions through the
//! [`SessionService`] trait and the [`SessionEvent`] stream the embedder
//! feeds into the manager, one event at a time, on a single thread.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::message::{IncomingMessage, OutgoingMessage};
use crate::types::{ContactAddress, SessionId};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Lifecycle states of a switchboard session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Establishment asked for, connection not usable yet
    Requested,
    /// Connected and ready to carry messages
    Open,
    /// Torn down; the session is about to disappear from all registries
    Closed,
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Registry record for one switchboard session
///
/// The manager holds the authoritative copy; handlers keep only the session
/// id plus their own participant snapshot and re-fetch state through the
/// manager rather than caching across events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    participants: BTreeSet<ContactAddress>,
}

impl Session {
    /// Create a freshly requested session record
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Requested,
            participants: BTreeSet::new(),
        }
    }

    /// Get the session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check whether the session is open
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Get the current participant set
    pub fn participants(&self) -> &BTreeSet<ContactAddress> {
        &self.participants
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn add_participant(&mut self, contact: ContactAddress) {
        self.participants.insert(contact);
    }

    pub(crate) fn remove_participant(&mut self, contact: &ContactAddress) {
        self.participants.remove(contact);
    }
}

// ----------------------------------------------------------------------------
// Send Handle
// ----------------------------------------------------------------------------

/// Service-level correlation handle for one transmitted message
///
/// Returned by [`SessionService::send`]; the matching
/// [`SessionEvent::SendCompleted`] or [`SessionEvent::SendFailed`] carries
/// it back once the network reports the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SendHandle(u64);

impl SendHandle {
    /// Create a handle from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Session Service
// ----------------------------------------------------------------------------

/// Seam to the network collaborator that owns connections and line protocol
///
/// Every call is non-blocking: `request_session` only starts establishment
/// (the `Open` transition arrives later as an event), and `send` only hands
/// the message over (the outcome arrives as a send event keyed by the
/// returned handle).
pub trait SessionService {
    /// Ask for a new switchboard session; it enters the `Requested` state
    fn request_session(&mut self) -> Result<SessionId, SessionError>;

    /// Invite a contact into an open session
    fn invite(&mut self, session: SessionId, contact: &ContactAddress)
        -> Result<(), SessionError>;

    /// Transmit a message on an open session
    fn send(
        &mut self,
        session: SessionId,
        message: OutgoingMessage,
    ) -> Result<SendHandle, SessionError>;
}

// ----------------------------------------------------------------------------
// Session Events
// ----------------------------------------------------------------------------

/// Asynchronous notifications from the network collaborator
///
/// The embedder feeds these into [`crate::switchboard::SwitchboardManager::handle_event`]
/// in arrival order. Each event is processed atomically with respect to the
/// others; "waiting" never blocks, it is represented by handler queues.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session changed lifecycle state
    StateChanged {
        session: SessionId,
        state: SessionState,
    },
    /// The peer established a session and invited us into it
    InvitationReceived {
        session: SessionId,
        inviter: ContactAddress,
    },
    /// A message arrived on a session
    MessageReceived {
        session: SessionId,
        message: IncomingMessage,
    },
    /// A contact joined a session
    ParticipantJoined {
        session: SessionId,
        contact: ContactAddress,
    },
    /// A contact left a session
    ParticipantLeft {
        session: SessionId,
        contact: ContactAddress,
    },
    /// An invited contact could not join
    InvitationFailed {
        session: SessionId,
        contact: ContactAddress,
    },
    /// A transmitted message was acknowledged as delivered
    SendCompleted { handle: SendHandle },
    /// A transmitted message could not be delivered
    SendFailed { handle: SendHandle },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
