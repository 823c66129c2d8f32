//! Local endpoint configuration

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{ContactAddress, MachineGuid};

// ----------------------------------------------------------------------------
// Local Identity
// ----------------------------------------------------------------------------

/// Account and endpoint identity of the local client
///
/// The machine guid disambiguates this endpoint from other devices signed in
/// to the same account; guid-qualified chunk addressing depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    account: ContactAddress,
    machine_guid: MachineGuid,
}

impl LocalIdentity {
    /// Create an identity from an account and an explicit machine guid
    pub fn new(account: ContactAddress, machine_guid: MachineGuid) -> Self {
        Self {
            account,
            machine_guid,
        }
    }

    /// Create an identity with a freshly generated machine guid
    pub fn with_generated_guid<T: Into<String>>(account: T) -> Result<Self> {
        Ok(Self {
            account: ContactAddress::new(account)?,
            machine_guid: MachineGuid::generate(),
        })
    }

    /// Get the local account
    pub fn account(&self) -> &ContactAddress {
        &self.account
    }

    /// Get the local machine guid
    pub fn machine_guid(&self) -> &MachineGuid {
        &self.machine_guid
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
