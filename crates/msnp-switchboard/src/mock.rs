//! In-memory session service for tests and embedder prototyping
//!
//! Records every call the manager makes and hands out monotonically
//! increasing session ids and send handles, so a test can drive the full
//! lifecycle by feeding the matching [`crate::session::SessionEvent`]s back
//! into the manager.

use crate::errors::SessionError;
use crate::message::OutgoingMessage;
use crate::session::{SendHandle, SessionService};
use crate::types::{ContactAddress, SessionId};

// ----------------------------------------------------------------------------
// Mock Session Service
// ----------------------------------------------------------------------------

/// One message handed to [`MockSessionService::send`]
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Session the message was transmitted on
    pub session: SessionId,
    /// Handle returned to the sender
    pub handle: SendHandle,
    /// The message itself
    pub message: OutgoingMessage,
}

/// Recording [`SessionService`] implementation
#[derive(Debug, Default)]
pub struct MockSessionService {
    next_session: u32,
    next_handle: u64,
    /// Sessions handed out by `request_session`, in order
    pub requested: Vec<SessionId>,
    /// Invitations issued, in order
    pub invites: Vec<(SessionId, ContactAddress)>,
    /// Messages transmitted, in order
    pub sent: Vec<SentMessage>,
    /// Make `request_session` refuse
    pub refuse_requests: bool,
    /// Make `send` fail synchronously
    pub refuse_sends: bool,
}

impl MockSessionService {
    /// Create an empty recording service
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently requested session, if any
    pub fn last_requested(&self) -> Option<SessionId> {
        self.requested.last().copied()
    }

    /// Most recently transmitted message, if any
    pub fn last_sent(&self) -> Option<&SentMessage> {
        self.sent.last()
    }

    /// Take all recorded transmissions, clearing the log
    pub fn drain_sent(&mut self) -> Vec<SentMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl SessionService for MockSessionService {
    fn request_session(&mut self) -> Result<SessionId, SessionError> {
        if self.refuse_requests {
            return Err(SessionError::RequestRefused {
                reason: "mock refusal".into(),
            });
        }
        self.next_session += 1;
        let session = SessionId::new(self.next_session);
        self.requested.push(session);
        Ok(session)
    }

    fn invite(
        &mut self,
        session: SessionId,
        contact: &ContactAddress,
    ) -> Result<(), SessionError> {
        self.invites.push((session, contact.clone()));
        Ok(())
    }

    fn send(
        &mut self,
        session: SessionId,
        message: OutgoingMessage,
    ) -> Result<SendHandle, SessionError> {
        if self.refuse_sends {
            return Err(SessionError::TransmitFailed {
                session,
                reason: "mock refusal".into(),
            });
        }
        self.next_handle += 1;
        let handle = SendHandle::new(self.next_handle);
        self.sent.push(SentMessage {
            session,
            handle,
            message,
        });
        Ok(handle)
    }
}
