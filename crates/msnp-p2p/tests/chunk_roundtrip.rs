//! End-to-end chunk exchange between two endpoints
//!
//! Drives two managers over mock session services: an outbound transport on
//! the sending side, an inbound transport attached through message-driven
//! dispatch on the receiving side, and the full frame-transmit-receive-ack
//! cycle between them.

use std::cell::RefCell;
use std::rc::Rc;

use msnp_switchboard::mock::MockSessionService;
use msnp_switchboard::{
    ContactAddress, HandlerEvent, IncomingMessage, LocalIdentity, MachineGuid, Notice,
    SessionEvent, SessionId, SessionState, SwitchboardManager,
};

use msnp_p2p::{MessageChunk, PeerTransport, TlpVersion, TransportSink, P2P_CONTENT_TYPE};

#[derive(Default, Clone)]
struct ChunkLog(Rc<RefCell<Vec<MessageChunk>>>);

impl ChunkLog {
    fn take(&self) -> Vec<MessageChunk> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl TransportSink for ChunkLog {
    fn chunk_received(
        &mut self,
        _peer: &ContactAddress,
        _peer_guid: Option<&MachineGuid>,
        chunk: MessageChunk,
    ) {
        self.0.borrow_mut().push(chunk);
    }
}

fn contact(account: &str) -> ContactAddress {
    ContactAddress::new(account).unwrap()
}

struct Endpoint {
    manager: SwitchboardManager<MockSessionService>,
    transport: PeerTransport,
    log: ChunkLog,
}

fn sender(peer_guid: MachineGuid) -> Endpoint {
    let identity = LocalIdentity::with_generated_guid("alice@example.com").unwrap();
    let mut manager = SwitchboardManager::new(MockSessionService::new(), identity);
    let log = ChunkLog::default();
    let peer = contact("bob@example.com");

    let transport = PeerTransport::outbound(
        &mut manager,
        peer.clone(),
        Some(peer_guid),
        Box::new(log.clone()),
    )
    .unwrap();

    // the requested session opens and the peer joins
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

    Endpoint {
        manager,
        transport,
        log,
    }
}

fn receiver(identity: LocalIdentity, peer_guid: MachineGuid) -> (Endpoint, SessionId) {
    let mut manager = SwitchboardManager::new(MockSessionService::new(), identity);
    let log = ChunkLog::default();

    let transport = PeerTransport::inbound(
        &mut manager,
        contact("alice@example.com"),
        Some(peer_guid),
        Box::new(log.clone()),
    )
    .unwrap();

    // the peer established this session and invited us
    let session = SessionId::new(900);
    manager
        .handle_event(SessionEvent::InvitationReceived {
            session,
            inviter: contact("alice@example.com"),
        })
        .unwrap();
    manager
        .handle_event(SessionEvent::StateChanged {
            session,
            state: SessionState::Open,
        })
        .unwrap();

    (
        Endpoint {
            manager,
            transport,
            log,
        },
        session,
    )
}

#[test]
fn chunk_survives_the_full_transmit_receive_cycle() {
    let bob_identity = LocalIdentity::with_generated_guid("bob@example.com").unwrap();
    let bob_guid = *bob_identity.machine_guid();

    let mut alice = sender(bob_guid);
    let alice_guid = *alice.manager.identity().machine_guid();
    let (mut bob, bob_session) = receiver(bob_identity, alice_guid);

    // Alice frames and transmits a chunk
    let payload = b"custom emoticon bytes".to_vec();
    let chunk = MessageChunk::v2(3, 17, 0x01, 1, payload.clone()).with_application_id(0xDEAD_BEEF);
    let token = alice
        .transport
        .send_chunk(&mut alice.manager, chunk)
        .unwrap();
    assert_eq!(alice.transport.outstanding_sends(), 1);

    // The wire message crosses over to Bob's endpoint
    let sent = alice.manager.service().last_sent().unwrap().clone();
    assert_eq!(sent.message.content_type.as_str(), P2P_CONTENT_TYPE);
    let mut inbound = IncomingMessage::new(
        contact("alice@example.com"),
        P2P_CONTENT_TYPE,
        sent.message.body.clone(),
    )
    .with_sender_guid(alice_guid);
    for (name, value) in &sent.message.headers {
        inbound = inbound.with_header(name.clone(), value.clone());
    }

    // Bob's manager attaches the inbound transport and delivers the message
    let notices = bob
        .manager
        .handle_event(SessionEvent::MessageReceived {
            session: bob_session,
            message: inbound,
        })
        .unwrap();
    for notice in notices {
        if let Notice::Handler { handler, event } = notice {
            assert_eq!(handler, bob.transport.handler());
            bob.transport.handle_event(&mut bob.manager, &event);
        }
    }

    let received = bob.log.take();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].application_id, 0xDEAD_BEEF);
    assert_eq!(received[0].payload, payload);
    assert_eq!(received[0].version(), TlpVersion::V2);

    // The delivery acknowledgement frees Alice's window slot
    let notices = alice
        .manager
        .handle_event(SessionEvent::SendCompleted {
            handle: sent.handle,
        })
        .unwrap();
    for notice in notices {
        if let Notice::Handler { event, .. } = notice {
            if let HandlerEvent::MessageSent(t) = &event {
                assert_eq!(*t, token);
            }
            alice
                .transport
                .handle_event(&mut alice.manager, &event);
        }
    }
    assert_eq!(alice.transport.outstanding_sends(), 0);
    assert!(alice.transport.ready_to_send());
}

#[test]
fn foreign_endpoint_traffic_never_reaches_the_sink() {
    let bob_identity = LocalIdentity::with_generated_guid("bob@example.com").unwrap();
    let bob_guid = *bob_identity.machine_guid();

    let mut alice = sender(bob_guid);
    let alice_guid = *alice.manager.identity().machine_guid();

    // Bob's transport expects a different device of Alice's account
    let (mut bob, bob_session) = receiver(bob_identity, MachineGuid::generate());

    let chunk = MessageChunk::v2(3, 18, 0x01, 1, b"not for you".to_vec());
    alice
        .transport
        .send_chunk(&mut alice.manager, chunk)
        .unwrap();

    let sent = alice.manager.service().last_sent().unwrap().clone();
    let mut inbound = IncomingMessage::new(
        contact("alice@example.com"),
        P2P_CONTENT_TYPE,
        sent.message.body.clone(),
    )
    .with_sender_guid(alice_guid);
    for (name, value) in &sent.message.headers {
        inbound = inbound.with_header(name.clone(), value.clone());
    }

    let notices = bob
        .manager
        .handle_event(SessionEvent::MessageReceived {
            session: bob_session,
            message: inbound,
        })
        .unwrap();
    for notice in notices {
        if let Notice::Handler { event, .. } = notice {
            bob.transport.handle_event(&mut bob.manager, &event);
        }
    }

    // source guid does not match the configured peer: dropped, no error
    assert!(bob.log.take().is_empty());
}
