//! Core types for the switchboard layer
//!
//! This module defines the fundamental identifiers used throughout the crate,
//! using newtype patterns for semantic validation and type safety. Sessions
//! and handlers are addressed by opaque integer handles rather than object
//! identity, so registries are plain handle-keyed maps.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::errors::SwitchboardError;

// ----------------------------------------------------------------------------
// Session Identifier
// ----------------------------------------------------------------------------

/// Opaque handle for a switchboard session in the manager registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    /// Create a session id from its raw value
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sb:{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Handler Identifier
// ----------------------------------------------------------------------------

/// Opaque handle for a registered conversation handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandlerId(u32);

impl HandlerId {
    /// Create a handler id from its raw value
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler:{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Message Token
// ----------------------------------------------------------------------------

/// Per-handler correlation token for an outgoing message
///
/// A token is assigned the moment a send is accepted, whether the message is
/// transmitted immediately or parked in the handler's queue. Completion and
/// failure notifications carry the token back to the caller, which replaces
/// the success/error continuation closures of the original event wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageToken(u64);

impl MessageToken {
    /// Create a token from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Contact Address
// ----------------------------------------------------------------------------

/// Passport account of a contact (`someone@example.com`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactAddress(String);

impl ContactAddress {
    /// Create a contact address, validating the account form
    pub fn new<T: Into<String>>(account: T) -> Result<Self, SwitchboardError> {
        let account = account.into();
        if account.is_empty() || !account.contains('@') {
            return Err(SwitchboardError::invalid_address(account));
        }
        Ok(Self(account))
    }

    /// Get the account string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContactAddress {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ----------------------------------------------------------------------------
// Machine Guid
// ----------------------------------------------------------------------------

/// Guid identifying one endpoint (machine) of a multi-device account
///
/// The wire text form carries literal braces: `{xxxxxxxx-...-xxxxxxxxxxxx}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineGuid(Uuid);

impl MachineGuid {
    /// Create a machine guid from a uuid
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random machine guid
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner uuid
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Render the brace-wrapped wire form
    pub fn braced(&self) -> String {
        self.0.braced().to_string()
    }

    /// Parse a guid from its wire form, with or without braces
    pub fn parse(text: &str) -> Result<Self, SwitchboardError> {
        let trimmed = text
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(text);
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| SwitchboardError::invalid_guid(text))
    }
}

impl fmt::Display for MachineGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl FromStr for MachineGuid {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ----------------------------------------------------------------------------
// Content Type
// ----------------------------------------------------------------------------

/// MIME content type carried by a switchboard message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentType(String);

impl ContentType {
    /// Create a content type
    pub fn new<T: Into<String>>(mime: T) -> Self {
        Self(mime.into())
    }

    /// Get the MIME string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentType {
    fn from(mime: &str) -> Self {
        Self::new(mime)
    }
}

// ----------------------------------------------------------------------------
// Accepted Types
// ----------------------------------------------------------------------------

/// Declared capability set of a handler, matched by the manager on dispatch
///
/// `Any` corresponds to the `"*"` wildcard; `Exact` lists the content types
/// the handler consumes. Declared up front at registration so the manager
/// never has to interrogate a handler while routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptedTypes {
    /// Accept every content type
    Any,
    /// Accept only the listed content types
    Exact(SmallVec<[ContentType; 4]>),
}

impl AcceptedTypes {
    /// Accept a single content type
    pub fn only<T: Into<ContentType>>(mime: T) -> Self {
        let mut list = SmallVec::new();
        list.push(mime.into());
        Self::Exact(list)
    }

    /// Accept each of the listed content types
    pub fn list<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ContentType>,
    {
        Self::Exact(types.into_iter().map(Into::into).collect())
    }

    /// Check whether a message of the given content type should be delivered
    pub fn matches(&self, content_type: &ContentType) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(list) => list.contains(content_type),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
