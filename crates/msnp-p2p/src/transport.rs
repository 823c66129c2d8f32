//! Flow-controlled peer transport over one switchboard handler
//!
//! A [`PeerTransport`] is scoped to exactly one remote peer identity
//! (account plus optional machine guid). Outbound chunks become switchboard
//! messages with delivery confirmation; inbound messages are filtered by
//! guid addressing, stripped of their application-id trailer and decoded
//! back into chunks. An in-flight send window of [`MAX_OUTSTANDING_SENDS`]
//! chunks is the only backpressure mechanism: the counter tracks in-flight
//! count, not per-chunk identity, so completions may arrive in any order.

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use msnp_switchboard::{
    AcceptedTypes, ContactAddress, HandlerEvent, HandlerId, IncomingMessage, MachineGuid,
    MessageAck, MessageToken, OutgoingMessage, SessionService, SwitchboardManager,
};

use crate::chunk::{MessageChunk, TlpVersion};
use crate::errors::{P2pError, Result};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Content type identifying peer-to-peer chunk traffic
pub const P2P_CONTENT_TYPE: &str = "application/x-msnmsgrp2p";

/// Largest serialized chunk, header included, application-id trailer excluded
pub const MAX_CHUNK_SIZE: usize = 1250;

/// Cap on sent-but-unacknowledged chunks per transport
pub const MAX_OUTSTANDING_SENDS: usize = 5;

/// Source-addressing header, `account;{guid}`
pub const HEADER_P2P_SRC: &str = "P2P-Src";

/// Destination-addressing header, `account` or `account;{guid}`
pub const HEADER_P2P_DEST: &str = "P2P-Dest";

// ----------------------------------------------------------------------------
// Transport Sink
// ----------------------------------------------------------------------------

/// Upward delivery seam of a peer transport
pub trait TransportSink {
    /// A chunk addressed to this endpoint was received and decoded
    fn chunk_received(
        &mut self,
        peer: &ContactAddress,
        peer_guid: Option<&MachineGuid>,
        chunk: MessageChunk,
    );

    /// A sent chunk was acknowledged as delivered
    fn chunk_sent(
        &mut self,
        _peer: &ContactAddress,
        _peer_guid: Option<&MachineGuid>,
        _chunk: &MessageChunk,
    ) {
    }

    /// The transport released its resources and handler binding
    fn transport_closed(&mut self) {}
}

// ----------------------------------------------------------------------------
// Peer Transport
// ----------------------------------------------------------------------------

/// Chunked, version-aware binary transport bound to one peer identity
pub struct PeerTransport {
    handler: HandlerId,
    peer: ContactAddress,
    peer_guid: Option<MachineGuid>,
    outstanding: usize,
    in_flight: HashMap<MessageToken, MessageChunk>,
    sink: Box<dyn TransportSink>,
    closed: bool,
}

impl PeerTransport {
    /// Create a transport toward a known peer, inviting it into a session.
    ///
    /// A missing peer guid restricts the transport to legacy (version 1)
    /// addressing.
    pub fn outbound<S: SessionService>(
        manager: &mut SwitchboardManager<S>,
        peer: ContactAddress,
        peer_guid: Option<MachineGuid>,
        sink: Box<dyn TransportSink>,
    ) -> Result<Self> {
        let handler = manager.register_handler(
            AcceptedTypes::only(P2P_CONTENT_TYPE),
            vec![peer.clone()],
        )?;
        info!(%peer, %handler, "outbound peer transport created");
        Ok(Self {
            handler,
            peer,
            peer_guid,
            outstanding: 0,
            in_flight: HashMap::new(),
            sink,
            closed: false,
        })
    }

    /// Create a transport for a peer that already initiated a session.
    ///
    /// The handler starts with no contacts and binds to the peer's session
    /// through message-driven attachment.
    pub fn inbound<S: SessionService>(
        manager: &mut SwitchboardManager<S>,
        peer: ContactAddress,
        peer_guid: Option<MachineGuid>,
        sink: Box<dyn TransportSink>,
    ) -> Result<Self> {
        let handler =
            manager.register_handler(AcceptedTypes::only(P2P_CONTENT_TYPE), Vec::new())?;
        info!(%peer, %handler, "inbound peer transport created");
        Ok(Self {
            handler,
            peer,
            peer_guid,
            outstanding: 0,
            in_flight: HashMap::new(),
            sink,
            closed: false,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The conversation handler this transport rides on
    pub fn handler(&self) -> HandlerId {
        self.handler
    }

    /// Remote peer account
    pub fn peer(&self) -> &ContactAddress {
        &self.peer
    }

    /// Remote peer machine guid, when configured
    pub fn peer_guid(&self) -> Option<&MachineGuid> {
        self.peer_guid.as_ref()
    }

    /// Number of sent-but-unresolved chunks
    pub fn outstanding_sends(&self) -> usize {
        self.outstanding
    }

    /// Largest chunk this transport will accept for transmission
    pub fn max_chunk_size(&self) -> usize {
        MAX_CHUNK_SIZE
    }

    /// Whether this transport is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Exact identity filter: true iff account and guid both match
    pub fn can_send(&self, peer: &ContactAddress, peer_guid: Option<&MachineGuid>) -> bool {
        self.peer == *peer && self.peer_guid.as_ref() == peer_guid
    }

    /// Whether the send window has room for another chunk
    pub fn ready_to_send(&self) -> bool {
        self.outstanding < MAX_OUTSTANDING_SENDS
    }

    // ------------------------------------------------------------------
    // Send path
    // ------------------------------------------------------------------

    /// Frame and transmit one chunk.
    ///
    /// The encoded chunk gets the big-endian application id appended and is
    /// sent with delivery confirmation. The window slot is taken before
    /// handing the message over; a delivery outcome (or a synchronous send
    /// error) gives it back.
    pub fn send_chunk<S: SessionService>(
        &mut self,
        manager: &mut SwitchboardManager<S>,
        chunk: MessageChunk,
    ) -> Result<MessageToken> {
        if self.closed {
            return Err(P2pError::TransportClosed);
        }
        if !self.ready_to_send() {
            return Err(P2pError::WindowFull);
        }

        let mut body = chunk.encode()?;
        if body.len() > MAX_CHUNK_SIZE {
            return Err(P2pError::ChunkTooLarge { size: body.len() });
        }
        body.extend_from_slice(&chunk.application_id.to_be_bytes());

        let mut message =
            OutgoingMessage::new(P2P_CONTENT_TYPE, body).with_ack(MessageAck::Msnc);
        match (chunk.version(), &self.peer_guid) {
            (TlpVersion::V2, Some(guid)) => {
                let identity = manager.identity();
                message = message
                    .with_header(
                        HEADER_P2P_SRC,
                        format!(
                            "{};{}",
                            identity.account(),
                            identity.machine_guid().braced()
                        ),
                    )
                    .with_header(
                        HEADER_P2P_DEST,
                        format!("{};{}", self.peer, guid.braced()),
                    );
            }
            _ => {
                message = message.with_header(HEADER_P2P_DEST, self.peer.as_str());
            }
        }

        trace!(peer = %self.peer, version = ?chunk.version(), len = chunk.payload.len(), ">>> chunk");
        self.outstanding += 1;
        let token = match manager.send_message(self.handler, message) {
            Ok(token) => token,
            Err(err) => {
                self.outstanding -= 1;
                return Err(err.into());
            }
        };
        self.in_flight.insert(token, chunk);
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    /// Process one handler notice routed to this transport.
    ///
    /// Events arriving after `close` are no-ops.
    pub fn handle_event<S: SessionService>(
        &mut self,
        manager: &mut SwitchboardManager<S>,
        event: &HandlerEvent,
    ) {
        if self.closed {
            return;
        }
        match event {
            HandlerEvent::MessageReceived(message) => {
                self.on_message_received(manager, message);
            }
            HandlerEvent::MessageSent(token) => {
                if let Some(chunk) = self.in_flight.remove(token) {
                    self.outstanding = self.outstanding.saturating_sub(1);
                    self.sink
                        .chunk_sent(&self.peer, self.peer_guid.as_ref(), &chunk);
                }
            }
            HandlerEvent::SendFailed(token) => {
                if self.in_flight.remove(token).is_some() {
                    self.outstanding = self.outstanding.saturating_sub(1);
                    // no retry at this layer; the window slot is simply freed
                    debug!(%token, peer = %self.peer, "chunk delivery failed");
                }
            }
            HandlerEvent::ContactLeft(contact) => {
                if *contact == self.peer {
                    self.close(manager);
                }
            }
            HandlerEvent::SessionReady { .. } | HandlerEvent::ContactJoined(_) => {}
        }
    }

    fn on_message_received<S: SessionService>(
        &mut self,
        manager: &mut SwitchboardManager<S>,
        message: &IncomingMessage,
    ) {
        let mut version = TlpVersion::V1;
        let dest_guid = message.header_guid(HEADER_P2P_DEST);
        if let (Some(dest), Some(sender)) = (dest_guid, message.sender_guid) {
            // destination carries a guid: the chunk uses qualified addressing
            version = TlpVersion::V2;
            if dest != *manager.identity().machine_guid()
                || Some(sender) != self.peer_guid
            {
                trace!(peer = %self.peer, "chunk not addressed to this transport");
                return;
            }
        }

        let body = &message.body;
        if body.len() < 4 {
            warn!(len = body.len(), "chunk message too short for its trailer");
            return;
        }
        let (chunk_bytes, trailer) = body.split_at(body.len() - 4);
        let application_id =
            u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

        match MessageChunk::decode(version, chunk_bytes) {
            Ok(mut chunk) => {
                chunk.application_id = application_id;
                trace!(peer = %message.sender, version = ?version, len = chunk.payload.len(), "<<< chunk");
                self.sink
                    .chunk_received(&message.sender, message.sender_guid.as_ref(), chunk);
            }
            Err(err) => {
                warn!(%err, "dropping undecodable chunk");
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Release the transport and its handler's session binding.
    ///
    /// Chunks already in flight are not cancelled; their late delivery
    /// outcomes are ignored.
    pub fn close<S: SessionService>(&mut self, manager: &mut SwitchboardManager<S>) {
        if self.closed {
            return;
        }
        self.closed = true;
        manager.close_handler(self.handler);
        info!(peer = %self.peer, "peer transport closed");
        self.sink.transport_closed();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use msnp_switchboard::mock::MockSessionService;
    use msnp_switchboard::{LocalIdentity, SessionEvent, SessionId, SessionState};

    use super::*;

    #[derive(Debug)]
    enum SinkEvent {
        Received(MessageChunk),
        Sent(MessageChunk),
        Closed,
    }

    #[derive(Default, Clone)]
    struct SinkLog(Rc<RefCell<Vec<SinkEvent>>>);

    impl SinkLog {
        fn events(&self) -> std::cell::Ref<'_, Vec<SinkEvent>> {
            self.0.borrow()
        }
    }

    impl TransportSink for SinkLog {
        fn chunk_received(
            &mut self,
            _peer: &ContactAddress,
            _peer_guid: Option<&MachineGuid>,
            chunk: MessageChunk,
        ) {
            self.0.borrow_mut().push(SinkEvent::Received(chunk));
        }

        fn chunk_sent(
            &mut self,
            _peer: &ContactAddress,
            _peer_guid: Option<&MachineGuid>,
            chunk: &MessageChunk,
        ) {
            self.0.borrow_mut().push(SinkEvent::Sent(chunk.clone()));
        }

        fn transport_closed(&mut self) {
            self.0.borrow_mut().push(SinkEvent::Closed);
        }
    }

    fn contact(account: &str) -> ContactAddress {
        ContactAddress::new(account).unwrap()
    }

    struct Fixture {
        manager: SwitchboardManager<MockSessionService>,
        transport: PeerTransport,
        log: SinkLog,
        session: SessionId,
        peer: ContactAddress,
        peer_guid: MachineGuid,
    }

    /// Outbound transport with its session opened and the peer joined.
    fn fixture() -> Fixture {
        let identity = LocalIdentity::with_generated_guid("local@example.com").unwrap();
        let mut manager = SwitchboardManager::new(MockSessionService::new(), identity);
        let peer = contact("peer@example.com");
        let peer_guid = MachineGuid::generate();
        let log = SinkLog::default();

        let transport = PeerTransport::outbound(
            &mut manager,
            peer.clone(),
            Some(peer_guid),
            Box::new(log.clone()),
        )
        .unwrap();

        let session = manager.service().last_requested().unwrap();
        manager
            .handle_event(SessionEvent::StateChanged {
                session,
                state: SessionState::Open,
            })
            .unwrap();
        manager
            .handle_event(SessionEvent::ParticipantJoined {
                session,
                contact: peer.clone(),
            })
            .unwrap();

        Fixture {
            manager,
            transport,
            log,
            session,
            peer,
            peer_guid,
        }
    }

    fn data_chunk(seq: u32) -> MessageChunk {
        MessageChunk::v2(1, seq, 0x01, 1, vec![0xAB; 16])
    }

    #[test]
    fn window_fills_at_five_and_reopens_on_any_completion() {
        let mut fx = fixture();
        let mut tokens = Vec::new();

        for seq in 0..MAX_OUTSTANDING_SENDS as u32 {
            assert!(fx.transport.ready_to_send());
            tokens.push(fx.transport.send_chunk(&mut fx.manager, data_chunk(seq)).unwrap());
        }
        assert!(!fx.transport.ready_to_send());
        assert_eq!(fx.transport.outstanding_sends(), MAX_OUTSTANDING_SENDS);

        assert!(matches!(
            fx.transport.send_chunk(&mut fx.manager, data_chunk(99)),
            Err(P2pError::WindowFull)
        ));

        // completion order does not matter: acknowledge the third send
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageSent(tokens[2]));
        assert!(fx.transport.ready_to_send());
        assert_eq!(fx.transport.outstanding_sends(), MAX_OUTSTANDING_SENDS - 1);
    }

    #[test]
    fn send_failure_frees_the_window_slot() {
        let mut fx = fixture();
        let token = fx
            .transport
            .send_chunk(&mut fx.manager, data_chunk(0))
            .unwrap();
        assert_eq!(fx.transport.outstanding_sends(), 1);

        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::SendFailed(token));
        assert_eq!(fx.transport.outstanding_sends(), 0);

        // nothing was delivered, so the sink saw no completion
        assert!(fx.log.events().is_empty());
    }

    #[test]
    fn v2_chunks_carry_qualified_addressing() {
        let mut fx = fixture();
        fx.transport
            .send_chunk(&mut fx.manager, data_chunk(0))
            .unwrap();

        let sent = fx.manager.service().last_sent().unwrap().message.clone();
        assert_eq!(sent.content_type.as_str(), P2P_CONTENT_TYPE);
        assert_eq!(sent.ack, MessageAck::Msnc);

        let src = sent.header(HEADER_P2P_SRC).unwrap();
        let local_guid = fx.manager.identity().machine_guid().braced();
        assert_eq!(src, format!("local@example.com;{local_guid}"));

        let dest = sent.header(HEADER_P2P_DEST).unwrap();
        assert_eq!(
            dest,
            format!("peer@example.com;{}", fx.peer_guid.braced())
        );
    }

    #[test]
    fn v1_chunks_carry_destination_only() {
        let mut fx = fixture();
        let chunk = MessageChunk::v1(1, 2, 0, 16, 0, vec![0xCD; 16]);
        fx.transport.send_chunk(&mut fx.manager, chunk).unwrap();

        let sent = fx.manager.service().last_sent().unwrap().message.clone();
        assert_eq!(sent.header(HEADER_P2P_DEST), Some("peer@example.com"));
        assert_eq!(sent.header(HEADER_P2P_SRC), None);
    }

    #[test]
    fn guidless_transport_downgrades_to_legacy_addressing() {
        let identity = LocalIdentity::with_generated_guid("local@example.com").unwrap();
        let mut manager = SwitchboardManager::new(MockSessionService::new(), identity);
        let peer = contact("peer@example.com");
        let mut transport = PeerTransport::outbound(
            &mut manager,
            peer.clone(),
            None,
            Box::new(SinkLog::default()),
        )
        .unwrap();

        let session = manager.service().last_requested().unwrap();
        manager
            .handle_event(SessionEvent::StateChanged {
                session,
                state: SessionState::Open,
            })
            .unwrap();
        manager
            .handle_event(SessionEvent::ParticipantJoined {
                session,
                contact: peer,
            })
            .unwrap();

        // a v2 chunk without a configured peer guid falls back to v1 headers
        transport.send_chunk(&mut manager, data_chunk(0)).unwrap();
        let sent = manager.service().last_sent().unwrap().message.clone();
        assert_eq!(sent.header(HEADER_P2P_DEST), Some("peer@example.com"));
        assert_eq!(sent.header(HEADER_P2P_SRC), None);
    }

    #[test]
    fn oversized_chunks_are_refused() {
        let mut fx = fixture();
        let chunk = MessageChunk::v1(1, 2, 0, 4096, 0, vec![0; MAX_CHUNK_SIZE]);
        assert!(matches!(
            fx.transport.send_chunk(&mut fx.manager, chunk),
            Err(P2pError::ChunkTooLarge { .. })
        ));
        assert_eq!(fx.transport.outstanding_sends(), 0);
    }

    #[test]
    fn receive_accepts_matching_v2_addressing() {
        let mut fx = fixture();
        let chunk = data_chunk(5).with_application_id(0xDEAD_BEEF);
        let mut body = chunk.encode().unwrap();
        body.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());

        let local_guid = *fx.manager.identity().machine_guid();
        let message = IncomingMessage::new(fx.peer.clone(), P2P_CONTENT_TYPE, body)
            .with_sender_guid(fx.peer_guid)
            .with_header(
                HEADER_P2P_DEST,
                format!("local@example.com;{}", local_guid.braced()),
            );

        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageReceived(message));

        let events = fx.log.events();
        match events.as_slice() {
            [SinkEvent::Received(received)] => {
                assert_eq!(received.application_id, 0xDEAD_BEEF);
                assert_eq!(received.payload, chunk.payload);
                assert_eq!(received.version(), TlpVersion::V2);
            }
            other => panic!("unexpected sink events: {other:?}"),
        }
    }

    #[test]
    fn receive_drops_mismatched_guids_silently() {
        let mut fx = fixture();
        let chunk = data_chunk(5);
        let mut body = chunk.encode().unwrap();
        body.extend_from_slice(&0u32.to_be_bytes());

        let local_guid = *fx.manager.identity().machine_guid();

        // wrong destination guid: chunk meant for another endpoint
        let other = MachineGuid::generate();
        let message = IncomingMessage::new(fx.peer.clone(), P2P_CONTENT_TYPE, body.clone())
            .with_sender_guid(fx.peer_guid)
            .with_header(
                HEADER_P2P_DEST,
                format!("local@example.com;{}", other.braced()),
            );
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageReceived(message));
        assert!(fx.log.events().is_empty());

        // wrong sender guid: another device of the peer account
        let message = IncomingMessage::new(fx.peer.clone(), P2P_CONTENT_TYPE, body)
            .with_sender_guid(other)
            .with_header(
                HEADER_P2P_DEST,
                format!("local@example.com;{}", local_guid.braced()),
            );
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageReceived(message));
        assert!(fx.log.events().is_empty());
    }

    #[test]
    fn receive_without_guids_is_treated_as_v1() {
        let mut fx = fixture();
        let chunk = MessageChunk::v1(1, 2, 0, 5, 0, b"hello".to_vec());
        let mut body = chunk.encode().unwrap();
        body.extend_from_slice(&7u32.to_be_bytes());

        let message = IncomingMessage::new(fx.peer.clone(), P2P_CONTENT_TYPE, body)
            .with_header(HEADER_P2P_DEST, "local@example.com");
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageReceived(message));

        let events = fx.log.events();
        match events.as_slice() {
            [SinkEvent::Received(received)] => {
                assert_eq!(received.version(), TlpVersion::V1);
                assert_eq!(received.application_id, 7);
                assert_eq!(received.payload, b"hello");
            }
            other => panic!("unexpected sink events: {other:?}"),
        }
    }

    #[test]
    fn peer_leaving_closes_the_transport() {
        let mut fx = fixture();
        let peer = fx.peer.clone();
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::ContactLeft(peer));

        assert!(fx.transport.is_closed());
        assert!(matches!(fx.log.events().last(), Some(SinkEvent::Closed)));
        // the handler binding is gone from the manager
        assert!(fx.manager.handler(fx.transport.handler()).is_none());
        assert_eq!(fx.manager.bound_handlers(fx.session).count(), 0);
    }

    #[test]
    fn other_contacts_leaving_is_ignored() {
        let mut fx = fixture();
        fx.transport.handle_event(
            &mut fx.manager,
            &HandlerEvent::ContactLeft(contact("bystander@example.com")),
        );
        assert!(!fx.transport.is_closed());
    }

    #[test]
    fn late_events_after_close_are_no_ops() {
        let mut fx = fixture();
        let token = fx
            .transport
            .send_chunk(&mut fx.manager, data_chunk(0))
            .unwrap();

        fx.transport.close(&mut fx.manager);
        let before = fx.log.events().len();

        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageSent(token));
        assert_eq!(fx.log.events().len(), before);

        assert!(matches!(
            fx.transport.send_chunk(&mut fx.manager, data_chunk(1)),
            Err(P2pError::TransportClosed)
        ));
    }

    #[test]
    fn can_send_requires_exact_identity_match() {
        let fx = fixture();
        let other_guid = MachineGuid::generate();

        assert!(fx.transport.can_send(&fx.peer, Some(&fx.peer_guid)));
        assert!(!fx.transport.can_send(&fx.peer, Some(&other_guid)));
        assert!(!fx.transport.can_send(&fx.peer, None));
        assert!(!fx
            .transport
            .can_send(&contact("someone-else@example.com"), Some(&fx.peer_guid)));
    }

    #[test]
    fn delivered_chunks_reach_the_sink_once() {
        let mut fx = fixture();
        let token = fx
            .transport
            .send_chunk(&mut fx.manager, data_chunk(3))
            .unwrap();

        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageSent(token));
        // a duplicate completion for the same token is ignored
        fx.transport
            .handle_event(&mut fx.manager, &HandlerEvent::MessageSent(token));

        let events = fx.log.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SinkEvent::Sent(_)));
        assert_eq!(fx.transport.outstanding_sends(), 0);
    }

    mod window_properties {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Send,
            CompleteOldest,
            FailOldest,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => Just(Op::Send),
                2 => Just(Op::CompleteOldest),
                1 => Just(Op::FailOldest),
            ]
        }

        proptest! {
            /// The window invariant holds for every interleaving of sends,
            /// completions and failures.
            #[test]
            fn outstanding_never_exceeds_the_window(ops in proptest::collection::vec(op_strategy(), 1..64)) {
                let mut fx = fixture();
                let mut pending: Vec<MessageToken> = Vec::new();
                let mut seq = 0u32;

                for op in ops {
                    match op {
                        Op::Send => {
                            let result = fx.transport.send_chunk(&mut fx.manager, data_chunk(seq));
                            seq += 1;
                            if let Ok(token) = result {
                                pending.push(token);
                            }
                        }
                        Op::CompleteOldest => {
                            if !pending.is_empty() {
                                let token = pending.remove(0);
                                fx.transport.handle_event(&mut fx.manager, &HandlerEvent::MessageSent(token));
                            }
                        }
                        Op::FailOldest => {
                            if !pending.is_empty() {
                                let token = pending.remove(0);
                                fx.transport.handle_event(&mut fx.manager, &HandlerEvent::SendFailed(token));
                            }
                        }
                    }
                    prop_assert!(fx.transport.outstanding_sends() <= MAX_OUTSTANDING_SENDS);
                    prop_assert_eq!(
                        fx.transport.ready_to_send(),
                        fx.transport.outstanding_sends() < MAX_OUTSTANDING_SENDS
                    );
                }
            }
        }
    }
}
