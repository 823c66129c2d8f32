//! Switchboard session multiplexing for the MSNP client core
//!
//! This crate manages the short-lived, shared message-routing sessions
//! ("switchboards") of an instant-messaging client and multiplexes logical
//! conversation handlers onto them. Handlers hide session-establishment
//! latency behind FIFO queues; the manager owns the session registry, routes
//! invitations and fans inbound messages out to handlers by declared content
//! type.
//!
//! The actual network connection and line protocol live behind the
//! [`session::SessionService`] trait and the [`session::SessionEvent`]
//! stream. Everything here is synchronous and single-threaded: the embedder
//! feeds events in one at a time and routes the returned notices to handler
//! owners.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod handler;
pub mod message;
pub mod session;
pub mod switchboard;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::LocalIdentity;
pub use errors::{DispatchError, Result, SessionError, SwitchboardError};
pub use handler::ConversationHandler;
pub use message::{IncomingMessage, MessageAck, OutgoingMessage};
pub use session::{SendHandle, Session, SessionEvent, SessionService, SessionState};
pub use switchboard::{HandlerEvent, Notice, SwitchboardManager};
pub use types::{
    AcceptedTypes, ContactAddress, ContentType, HandlerId, MachineGuid, MessageToken, SessionId,
};
