//! Conversation handler base
//!
//! A handler hides session-establishment latency behind per-handler FIFO
//! queues: invitations and messages enqueue while no open session is bound
//! and replay, in order, once one is. Invitations always drain to completion
//! (every invited contact has joined or failed) before any queued message is
//! flushed, so content is never sent into a session whose membership is
//! still settling.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::errors::SessionError;
use crate::message::OutgoingMessage;
use crate::session::{SendHandle, SessionService};
use crate::types::{AcceptedTypes, ContactAddress, ContentType, MessageToken, SessionId};

// ----------------------------------------------------------------------------
// Queued Message
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct QueuedMessage {
    token: MessageToken,
    message: OutgoingMessage,
}

/// Sends performed while draining a queue: service handle plus the caller's
/// correlation token, recorded by the manager for completion routing.
pub(crate) type IssuedSends = Vec<(SendHandle, MessageToken)>;

// ----------------------------------------------------------------------------
// Conversation Handler
// ----------------------------------------------------------------------------

/// Per-conversation state multiplexed onto at most one session at a time
///
/// Handlers live in the manager's registry and are driven exclusively by it;
/// owners interact through the manager using the handler's id. The queues
/// are append-only until a flush: entries leave the invite queue only as
/// invited contacts join or fail, and the message queue is cleared in one
/// FIFO flush.
#[derive(Debug)]
pub struct ConversationHandler {
    accepted: AcceptedTypes,
    contacts: BTreeSet<ContactAddress>,
    invite_queue: VecDeque<ContactAddress>,
    message_queue: VecDeque<QueuedMessage>,
    session: Option<SessionId>,
    session_requested: bool,
    next_token: u64,
}

impl ConversationHandler {
    pub(crate) fn new(accepted: AcceptedTypes, initial_contacts: Vec<ContactAddress>) -> Self {
        Self {
            accepted,
            contacts: BTreeSet::new(),
            invite_queue: initial_contacts.into(),
            message_queue: VecDeque::new(),
            session: None,
            session_requested: false,
            next_token: 0,
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Session this handler is currently bound to, if any
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Whether a session request is outstanding for this handler
    pub fn session_requested(&self) -> bool {
        self.session_requested
    }

    /// Snapshot of the participants this handler knows about
    pub fn contacts(&self) -> &BTreeSet<ContactAddress> {
        &self.contacts
    }

    /// Contacts still waiting to be invited or to join
    pub fn queued_invites(&self) -> impl Iterator<Item = &ContactAddress> {
        self.invite_queue.iter()
    }

    /// Number of messages parked until a session is ready
    pub fn queued_message_count(&self) -> usize {
        self.message_queue.len()
    }

    /// Check whether this handler consumes the given content type
    pub fn accepts(&self, content_type: &ContentType) -> bool {
        self.accepted.matches(content_type)
    }

    /// Unbound and not waiting on a requested session
    pub(crate) fn is_unbound(&self) -> bool {
        self.session.is_none() && !self.session_requested
    }

    // ------------------------------------------------------------------
    // Queueing
    // ------------------------------------------------------------------

    pub(crate) fn alloc_token(&mut self) -> MessageToken {
        let token = MessageToken::new(self.next_token);
        self.next_token += 1;
        token
    }

    pub(crate) fn queue_message(&mut self, message: OutgoingMessage) -> MessageToken {
        let token = self.alloc_token();
        self.message_queue.push_back(QueuedMessage { token, message });
        token
    }

    pub(crate) fn queue_invite(&mut self, contact: ContactAddress) {
        self.invite_queue.push_back(contact);
    }

    /// Record that a session request is in flight on our behalf.
    ///
    /// Membership has to be re-established on the replacement session, so
    /// every currently known contact goes back on the invite queue.
    pub(crate) fn mark_session_requested(&mut self) {
        for contact in &self.contacts {
            if !self.invite_queue.contains(contact) {
                self.invite_queue.push_back(contact.clone());
            }
        }
        self.session_requested = true;
    }

    /// The requested session died before opening; allow a future re-request.
    pub(crate) fn clear_session_request(&mut self) {
        self.session_requested = false;
    }

    // ------------------------------------------------------------------
    // Session callbacks (driven by the manager)
    // ------------------------------------------------------------------

    /// Bind to a now-open session and replay the queues.
    ///
    /// Queued invitations are issued first and stay queued until each
    /// contact joins or fails; only a handler with no pending invitations
    /// flushes its message queue here.
    pub(crate) fn session_ready<S: SessionService>(
        &mut self,
        session: SessionId,
        participants: BTreeSet<ContactAddress>,
        service: &mut S,
        sends: &mut IssuedSends,
    ) -> Result<(), SessionError> {
        debug!(%session, invites = self.invite_queue.len(), "handler bound to session");
        self.session_requested = false;
        self.session = Some(session);
        self.contacts = participants;

        if self.invite_queue.is_empty() {
            self.flush_messages(session, service, sends)
        } else {
            for contact in &self.invite_queue {
                service.invite(session, contact)?;
            }
            Ok(())
        }
    }

    pub(crate) fn contact_joined<S: SessionService>(
        &mut self,
        contact: &ContactAddress,
        service: &mut S,
        sends: &mut IssuedSends,
    ) -> Result<(), SessionError> {
        self.contacts.insert(contact.clone());
        if let Some(pos) = self.invite_queue.iter().position(|c| c == contact) {
            self.invite_queue.remove(pos);
            if self.invite_queue.is_empty() {
                if let Some(session) = self.session {
                    self.flush_messages(session, service, sends)?;
                }
            }
        }
        Ok(())
    }

    /// Returns whether the contact was removed (and the owner should be told).
    ///
    /// A removal that would leave a single participant is suppressed; the
    /// session is expected to close instead of shrinking to a meaningless
    /// single-party state.
    pub(crate) fn contact_left(&mut self, contact: &ContactAddress) -> bool {
        if self.contacts.len() > 1 {
            self.contacts.remove(contact)
        } else {
            false
        }
    }

    pub(crate) fn invitation_failed<S: SessionService>(
        &mut self,
        contact: &ContactAddress,
        service: &mut S,
        sends: &mut IssuedSends,
    ) -> Result<(), SessionError> {
        if let Some(pos) = self.invite_queue.iter().position(|c| c == contact) {
            debug!(%contact, "dropping failed invitation from queue");
            self.invite_queue.remove(pos);
            if self.invite_queue.is_empty() {
                if let Some(session) = self.session {
                    self.flush_messages(session, service, sends)?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn flush_messages<S: SessionService>(
        &mut self,
        session: SessionId,
        service: &mut S,
        sends: &mut IssuedSends,
    ) -> Result<(), SessionError> {
        while let Some(queued) = self.message_queue.pop_front() {
            match service.send(session, queued.message.clone()) {
                Ok(handle) => sends.push((handle, queued.token)),
                Err(err) => {
                    // keep FIFO order for a later retry by the embedder
                    self.message_queue.push_front(queued);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
