//! Switchboard manager
//!
//! The manager owns the session registry and multiplexes conversation
//! handlers onto sessions. Self-requested sessions are tracked as a pending
//! binding (one session, the single handler that asked) until they open;
//! open sessions carry a set of bound handlers, fanned out to by declared
//! content type. Peer-initiated sessions start with an empty binding set and
//! acquire handlers through message-driven attachment.
//!
//! All mutation happens here (single writer); handler owners read state back
//! through the accessors instead of caching it across events.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, error, info, trace, warn};

use crate::config::LocalIdentity;
use crate::errors::{DispatchError, Result, SessionError, SwitchboardError};
use crate::handler::{ConversationHandler, IssuedSends};
use crate::message::{IncomingMessage, OutgoingMessage};
use crate::session::{SendHandle, Session, SessionEvent, SessionService, SessionState};
use crate::types::{AcceptedTypes, ContactAddress, HandlerId, MessageToken, SessionId};

// ----------------------------------------------------------------------------
// Handler Events
// ----------------------------------------------------------------------------

/// Typed notification delivered to a handler's owner
#[derive(Debug, Clone)]
pub enum HandlerEvent {
    /// The handler was bound to an open session; queues have been replayed
    SessionReady { session: SessionId },
    /// A message matching the handler's accepted types arrived
    MessageReceived(IncomingMessage),
    /// A contact joined the bound session
    ContactJoined(ContactAddress),
    /// A contact left the bound session
    ContactLeft(ContactAddress),
    /// A send was acknowledged as delivered
    MessageSent(MessageToken),
    /// A send could not be delivered; retry policy is the owner's
    SendFailed(MessageToken),
}

/// One item of [`SwitchboardManager::handle_event`] output
#[derive(Debug, Clone)]
pub enum Notice {
    /// Routed to the owner of the named handler
    Handler {
        handler: HandlerId,
        event: HandlerEvent,
    },
    /// A message no bound handler accepted; the embedder may register a new
    /// handler for it (e.g. an inbound peer transport) and replay the event
    UnclaimedMessage {
        session: SessionId,
        message: IncomingMessage,
    },
}

// ----------------------------------------------------------------------------
// Switchboard Manager
// ----------------------------------------------------------------------------

/// Session registry, invitation routing and message dispatch
pub struct SwitchboardManager<S: SessionService> {
    service: S,
    identity: LocalIdentity,
    /// Authoritative session registry
    sessions: HashMap<SessionId, Session>,
    /// Requested-but-not-open sessions and the one handler awaiting each
    pending: HashMap<SessionId, HandlerId>,
    /// Open sessions and the handlers multiplexed onto them
    active: HashMap<SessionId, BTreeSet<HandlerId>>,
    /// Registered handlers by id
    handlers: HashMap<HandlerId, ConversationHandler>,
    /// Transmitted messages awaiting a delivery outcome
    in_flight: HashMap<SendHandle, (HandlerId, MessageToken)>,
    next_handler: u32,
}

impl<S: SessionService> SwitchboardManager<S> {
    /// Create a manager over the given network service
    pub fn new(service: S, identity: LocalIdentity) -> Self {
        Self {
            service,
            identity,
            sessions: HashMap::new(),
            pending: HashMap::new(),
            active: HashMap::new(),
            handlers: HashMap::new(),
            in_flight: HashMap::new(),
            next_handler: 0,
        }
    }

    /// Local account and machine guid
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Borrow the underlying session service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Mutably borrow the underlying session service
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    // ------------------------------------------------------------------
    // Handler lifecycle
    // ------------------------------------------------------------------

    /// Register a conversation handler.
    ///
    /// A non-empty initial contact set queues the contacts for invitation
    /// and immediately requests a session on the handler's behalf.
    pub fn register_handler(
        &mut self,
        accepted: AcceptedTypes,
        initial_contacts: Vec<ContactAddress>,
    ) -> Result<HandlerId> {
        let id = HandlerId::new(self.next_handler);
        self.next_handler += 1;

        let mut handler = ConversationHandler::new(accepted, initial_contacts);
        if handler.queued_invites().next().is_some() {
            let session = self.service.request_session()?;
            self.sessions.insert(session, Session::new(session));
            self.pending.insert(session, id);
            handler.mark_session_requested();
            info!(handler = %id, %session, "session requested for new handler");
        }
        self.handlers.insert(id, handler);
        debug!(handler = %id, "handler registered");
        Ok(id)
    }

    /// Request a session for a handler that does not have one in flight.
    ///
    /// Completion is asynchronous: the handler is notified through
    /// [`HandlerEvent::SessionReady`] once the session opens.
    pub fn request_session(&mut self, handler: HandlerId) -> Result<()> {
        let h = self
            .handlers
            .get_mut(&handler)
            .ok_or_else(|| SwitchboardError::unknown_handler(handler))?;
        if h.session_requested() {
            return Ok(());
        }
        let session = self.service.request_session()?;
        self.sessions.insert(session, Session::new(session));
        self.pending.insert(session, handler);
        h.mark_session_requested();
        info!(%handler, %session, "switchboard session requested");
        Ok(())
    }

    /// Deregister a handler from all bindings.
    ///
    /// The underlying session stays alive (its lifetime is network-driven)
    /// and no further notices are produced for the handler; delivery
    /// outcomes for its in-flight sends become no-ops.
    pub fn close_handler(&mut self, handler: HandlerId) {
        if self.handlers.remove(&handler).is_none() {
            return;
        }
        self.pending.retain(|_, h| *h != handler);
        for set in self.active.values_mut() {
            set.remove(&handler);
        }
        info!(%handler, "handler closed");
    }

    /// Bind an unbound handler to an already-open session.
    ///
    /// This is the explicit half of message-driven attachment: after an
    /// [`Notice::UnclaimedMessage`], the embedder registers a suitable
    /// handler, attaches it here and replays the message event.
    pub fn attach_handler(&mut self, handler: HandlerId, session: SessionId) -> Result<()> {
        let h = self
            .handlers
            .get_mut(&handler)
            .ok_or_else(|| SwitchboardError::unknown_handler(handler))?;
        if let Some(bound) = h.session() {
            return Err(SwitchboardError::already_bound(handler, bound));
        }
        if h.session_requested() {
            return Err(SwitchboardError::Dispatch(DispatchError::PendingRequest {
                handler,
            }));
        }
        let record = self
            .sessions
            .get(&session)
            .ok_or_else(|| SwitchboardError::unknown_session(session))?;
        if !record.is_open() {
            return Err(SessionError::NotOpen { session }.into());
        }
        let participants = record.participants().clone();

        let mut sends = IssuedSends::new();
        h.session_ready(session, participants, &mut self.service, &mut sends)?;
        self.active.entry(session).or_default().insert(handler);
        for (handle, token) in sends {
            self.in_flight.insert(handle, (handler, token));
        }
        debug!(%handler, %session, "handler attached to session");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound operations
    // ------------------------------------------------------------------

    /// Send a message through a handler, queueing it if no session is open.
    ///
    /// The returned token identifies the message in later
    /// [`HandlerEvent::MessageSent`] / [`HandlerEvent::SendFailed`] notices.
    pub fn send_message(
        &mut self,
        handler: HandlerId,
        message: OutgoingMessage,
    ) -> Result<MessageToken> {
        let h = self
            .handlers
            .get_mut(&handler)
            .ok_or_else(|| SwitchboardError::unknown_handler(handler))?;
        let open = h
            .session()
            .filter(|sid| self.sessions.get(sid).is_some_and(Session::is_open));

        match open {
            Some(session) => {
                let token = h.alloc_token();
                trace!(%handler, %session, content_type = %message.content_type, "transmitting");
                let handle = self.service.send(session, message)?;
                self.in_flight.insert(handle, (handler, token));
                Ok(token)
            }
            None => {
                if !h.session_requested() {
                    let session = self.service.request_session()?;
                    self.sessions.insert(session, Session::new(session));
                    self.pending.insert(session, handler);
                    h.mark_session_requested();
                    info!(%handler, %session, "switchboard session requested");
                }
                let token = h.queue_message(message);
                debug!(%handler, "message queued until a session is ready");
                Ok(token)
            }
        }
    }

    /// Invite a contact through a handler, queueing if no session is open
    pub fn invite_contact(&mut self, handler: HandlerId, contact: ContactAddress) -> Result<()> {
        let h = self
            .handlers
            .get_mut(&handler)
            .ok_or_else(|| SwitchboardError::unknown_handler(handler))?;
        let open = h
            .session()
            .filter(|sid| self.sessions.get(sid).is_some_and(Session::is_open));

        match open {
            Some(session) => {
                self.service.invite(session, &contact)?;
                Ok(())
            }
            None => {
                if !h.session_requested() {
                    let session = self.service.request_session()?;
                    self.sessions.insert(session, Session::new(session));
                    self.pending.insert(session, handler);
                    h.mark_session_requested();
                    info!(%handler, %session, "switchboard session requested");
                }
                h.queue_invite(contact);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Look up a session record
    pub fn session(&self, session: SessionId) -> Option<&Session> {
        self.sessions.get(&session)
    }

    /// Look up a handler
    pub fn handler(&self, handler: HandlerId) -> Option<&ConversationHandler> {
        self.handlers.get(&handler)
    }

    /// Handlers currently bound to a session
    pub fn bound_handlers(&self, session: SessionId) -> impl Iterator<Item = HandlerId> + '_ {
        self.active.get(&session).into_iter().flatten().copied()
    }

    // ------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------

    /// Process one event from the network collaborator.
    ///
    /// Returns the notices to route to handler owners. Each call is atomic
    /// with respect to the others; events for sessions or handlers that
    /// have since disappeared are no-ops.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<Vec<Notice>> {
        match event {
            SessionEvent::StateChanged { session, state } => match state {
                SessionState::Open => self.on_session_open(session),
                SessionState::Closed => {
                    self.on_session_closed(session);
                    Ok(Vec::new())
                }
                SessionState::Requested => {
                    trace!(%session, "ignoring requested-state echo");
                    Ok(Vec::new())
                }
            },
            SessionEvent::InvitationReceived { session, inviter } => {
                debug!(%session, %inviter, "inbound switchboard invitation");
                self.sessions
                    .entry(session)
                    .or_insert_with(|| Session::new(session));
                Ok(Vec::new())
            }
            SessionEvent::MessageReceived { session, message } => {
                self.on_message_received(session, message)
            }
            SessionEvent::ParticipantJoined { session, contact } => {
                self.on_participant_joined(session, contact)
            }
            SessionEvent::ParticipantLeft { session, contact } => {
                self.on_participant_left(session, contact)
            }
            SessionEvent::InvitationFailed { session, contact } => {
                self.on_invitation_failed(session, contact)
            }
            SessionEvent::SendCompleted { handle } => Ok(self.on_send_result(handle, true)),
            SessionEvent::SendFailed { handle } => Ok(self.on_send_result(handle, false)),
        }
    }

    fn on_session_open(&mut self, session: SessionId) -> Result<Vec<Notice>> {
        let record = self
            .sessions
            .get_mut(&session)
            .ok_or_else(|| SwitchboardError::unknown_session(session))?;
        record.set_state(SessionState::Open);
        let participants = record.participants().clone();
        info!(%session, participants = participants.len(), "switchboard session open");

        let mut notices = Vec::new();
        if let Some(handler) = self.pending.remove(&session) {
            self.active.entry(session).or_default().insert(handler);
            match self.handlers.get_mut(&handler) {
                Some(h) => {
                    let mut sends = IssuedSends::new();
                    h.session_ready(session, participants, &mut self.service, &mut sends)?;
                    for (handle, token) in sends {
                        self.in_flight.insert(handle, (handler, token));
                    }
                    notices.push(Notice::Handler {
                        handler,
                        event: HandlerEvent::SessionReady { session },
                    });
                }
                None => {
                    // close_handler scrubs pending entries, so a dangling
                    // binding here means registry corruption
                    debug_assert!(false, "pending binding referenced a dead handler");
                    error!(%session, %handler, "pending binding referenced a dead handler");
                    self.active.entry(session).or_default().remove(&handler);
                }
            }
        } else {
            // peer-initiated session: empty binding set awaiting
            // message-driven attachment
            self.active.entry(session).or_default();
        }
        Ok(notices)
    }

    fn on_session_closed(&mut self, session: SessionId) {
        info!(%session, "switchboard session closed");
        self.sessions.remove(&session);
        if let Some(handler) = self.pending.remove(&session) {
            // closed before opening: let the handler request again later
            if let Some(h) = self.handlers.get_mut(&handler) {
                h.clear_session_request();
            }
        }
        self.active.remove(&session);
        // Bound handlers keep their stale session id; every send path
        // re-checks the registry, so their next operation queues and
        // requests a fresh session.
    }

    fn on_message_received(
        &mut self,
        session: SessionId,
        message: IncomingMessage,
    ) -> Result<Vec<Notice>> {
        let Some(record) = self.sessions.get(&session) else {
            trace!(%session, "dropping message for unknown session");
            return Ok(Vec::new());
        };

        if record.is_open() {
            // message-driven attachment: unbound handlers accepting this
            // content type join the session before delivery
            let candidates: Vec<HandlerId> = self
                .handlers
                .iter()
                .filter(|(_, h)| h.is_unbound() && h.accepts(&message.content_type))
                .map(|(id, _)| *id)
                .collect();
            for handler in candidates {
                if let Err(err) = self.attach_handler(handler, session) {
                    warn!(%handler, %session, %err, "message-driven attachment failed");
                }
            }
        }

        let bound: Vec<HandlerId> = self
            .active
            .get(&session)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut notices = Vec::new();
        for handler in bound {
            let Some(h) = self.handlers.get(&handler) else {
                continue;
            };
            if h.accepts(&message.content_type) {
                notices.push(Notice::Handler {
                    handler,
                    event: HandlerEvent::MessageReceived(message.clone()),
                });
            }
        }

        if notices.is_empty() {
            trace!(%session, content_type = %message.content_type, "message matched no handler");
            return Ok(vec![Notice::UnclaimedMessage { session, message }]);
        }
        Ok(notices)
    }

    fn on_participant_joined(
        &mut self,
        session: SessionId,
        contact: ContactAddress,
    ) -> Result<Vec<Notice>> {
        let Some(record) = self.sessions.get_mut(&session) else {
            trace!(%session, "participant event for unknown session");
            return Ok(Vec::new());
        };
        record.add_participant(contact.clone());

        let bound: Vec<HandlerId> = self
            .active
            .get(&session)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut notices = Vec::new();
        for handler in bound {
            let Some(h) = self.handlers.get_mut(&handler) else {
                continue;
            };
            let mut sends = IssuedSends::new();
            h.contact_joined(&contact, &mut self.service, &mut sends)?;
            for (handle, token) in sends {
                self.in_flight.insert(handle, (handler, token));
            }
            notices.push(Notice::Handler {
                handler,
                event: HandlerEvent::ContactJoined(contact.clone()),
            });
        }
        Ok(notices)
    }

    fn on_participant_left(
        &mut self,
        session: SessionId,
        contact: ContactAddress,
    ) -> Result<Vec<Notice>> {
        let Some(record) = self.sessions.get_mut(&session) else {
            trace!(%session, "participant event for unknown session");
            return Ok(Vec::new());
        };
        record.remove_participant(&contact);

        let bound: Vec<HandlerId> = self
            .active
            .get(&session)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut notices = Vec::new();
        for handler in bound {
            let Some(h) = self.handlers.get_mut(&handler) else {
                continue;
            };
            if h.contact_left(&contact) {
                notices.push(Notice::Handler {
                    handler,
                    event: HandlerEvent::ContactLeft(contact.clone()),
                });
            }
        }
        Ok(notices)
    }

    fn on_invitation_failed(
        &mut self,
        session: SessionId,
        contact: ContactAddress,
    ) -> Result<Vec<Notice>> {
        debug!(%session, %contact, "invitation failed");
        let bound: Vec<HandlerId> = self
            .active
            .get(&session)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for handler in bound {
            let Some(h) = self.handlers.get_mut(&handler) else {
                continue;
            };
            let mut sends = IssuedSends::new();
            h.invitation_failed(&contact, &mut self.service, &mut sends)?;
            for (handle, token) in sends {
                self.in_flight.insert(handle, (handler, token));
            }
        }
        // not surfaced to owners: the queue entry is dropped and the
        // conversation continues with whoever did join
        Ok(Vec::new())
    }

    fn on_send_result(&mut self, handle: SendHandle, delivered: bool) -> Vec<Notice> {
        let Some((handler, token)) = self.in_flight.remove(&handle) else {
            trace!(handle = handle.raw(), "send result for unknown handle");
            return Vec::new();
        };
        if !self.handlers.contains_key(&handler) {
            trace!(%handler, "send result for closed handler ignored");
            return Vec::new();
        }
        let event = if delivered {
            HandlerEvent::MessageSent(token)
        } else {
            HandlerEvent::SendFailed(token)
        };
        vec![Notice::Handler { handler, event }]
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
