//! Switchboard message model
//!
//! Messages at this layer are MIME-shaped: a content type, a small set of
//! extra header fields and an opaque body. The chunk transport rides on the
//! same model, putting its addressing in headers and its binary framing in
//! the body.

use serde::{Deserialize, Serialize};

use crate::types::{ContactAddress, ContentType, MachineGuid};

// ----------------------------------------------------------------------------
// Acknowledgement Mode
// ----------------------------------------------------------------------------

/// Delivery acknowledgement requested for an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageAck {
    /// No acknowledgement at all
    None,
    /// Acknowledge only on delivery failure (fire-and-forget default)
    Half,
    /// Acknowledge both delivery and failure
    Full,
    /// Client-level delivery confirmation, used by chunked peer traffic
    Msnc,
}

impl Default for MessageAck {
    fn default() -> Self {
        Self::Half
    }
}

// ----------------------------------------------------------------------------
// Outgoing Message
// ----------------------------------------------------------------------------

/// A message to transmit on a switchboard session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Content type declared to the receiving side
    pub content_type: ContentType,
    /// Extra header fields beyond the content type
    pub headers: Vec<(String, String)>,
    /// Opaque body bytes
    pub body: Vec<u8>,
    /// Requested acknowledgement mode
    pub ack: MessageAck,
}

impl OutgoingMessage {
    /// Create a message with the default acknowledgement mode
    pub fn new<T: Into<ContentType>>(content_type: T, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            headers: Vec::new(),
            body,
            ack: MessageAck::default(),
        }
    }

    /// Set the acknowledgement mode
    pub fn with_ack(mut self, ack: MessageAck) -> Self {
        self.ack = ack;
        self
    }

    /// Append a header field
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header field by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ----------------------------------------------------------------------------
// Incoming Message
// ----------------------------------------------------------------------------

/// A message received on a switchboard session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Account of the sending participant
    pub sender: ContactAddress,
    /// Machine guid of the sending endpoint, when the wire carried one
    pub sender_guid: Option<MachineGuid>,
    /// Declared content type
    pub content_type: ContentType,
    /// Extra header fields
    pub headers: Vec<(String, String)>,
    /// Opaque body bytes
    pub body: Vec<u8>,
}

impl IncomingMessage {
    /// Create an incoming message without extra headers
    pub fn new<T: Into<ContentType>>(
        sender: ContactAddress,
        content_type: T,
        body: Vec<u8>,
    ) -> Self {
        Self {
            sender,
            sender_guid: None,
            content_type: content_type.into(),
            headers: Vec::new(),
            body,
        }
    }

    /// Set the sender's machine guid
    pub fn with_sender_guid(mut self, guid: MachineGuid) -> Self {
        self.sender_guid = Some(guid);
        self
    }

    /// Append a header field
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header field by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Extract the machine guid from an `account;{guid}` style header field
    ///
    /// Returns `None` when the header is absent or carries no brace-wrapped
    /// guid part (legacy single-field addressing).
    pub fn header_guid(&self, name: &str) -> Option<MachineGuid> {
        let value = self.header(name)?;
        let guid_part = value.split(';').find(|part| {
            let part = part.trim();
            part.starts_with('{') && part.ends_with('}')
        })?;
        MachineGuid::parse(guid_part.trim()).ok()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(account: &str) -> ContactAddress {
        ContactAddress::new(account).unwrap()
    }

    #[test]
    fn default_ack_is_half() {
        let msg = OutgoingMessage::new("text/plain", b"hi".to_vec());
        assert_eq!(msg.ack, MessageAck::Half);

        let msg = msg.with_ack(MessageAck::Msnc);
        assert_eq!(msg.ack, MessageAck::Msnc);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let msg = OutgoingMessage::new("text/plain", Vec::new())
            .with_header("P2P-Dest", "bob@example.com");
        assert_eq!(msg.header("p2p-dest"), Some("bob@example.com"));
        assert_eq!(msg.header("P2P-Src"), None);
    }

    #[test]
    fn header_guid_parses_qualified_addressing() {
        let guid = MachineGuid::generate();
        let msg = IncomingMessage::new(contact("bob@example.com"), "text/plain", Vec::new())
            .with_header("P2P-Dest", format!("alice@example.com;{}", guid.braced()));

        assert_eq!(msg.header_guid("P2P-Dest"), Some(guid));
    }

    #[test]
    fn header_guid_absent_for_legacy_addressing() {
        let msg = IncomingMessage::new(contact("bob@example.com"), "text/plain", Vec::new())
            .with_header("P2P-Dest", "alice@example.com");

        assert_eq!(msg.header_guid("P2P-Dest"), None);
        assert_eq!(msg.header_guid("P2P-Src"), None);
    }
}
