//! Link/connection state as reported by the connection manager

use serde::{Deserialize, Serialize};

/// Connection state of a radio interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link
    #[default]
    NotConnected,
    /// Associated but not yet authorized (also used while roaming)
    Associated,
    /// Link up and authorized
    Connected,
    /// Link teardown in progress
    Disconnecting,
}

impl ConnectionState {
    /// Whether TSF sync may run in this state
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Whether a BSS link exists (connected, or associated while roaming)
    #[must_use]
    pub fn has_link(self) -> bool {
        matches!(self, Self::Associated | Self::Connected)
    }
}

/// Role of the interface owning the TSF engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceRole {
    /// Client (STA) interface
    #[default]
    Station,
    /// Soft access point (SAP)
    SoftAp,
}
