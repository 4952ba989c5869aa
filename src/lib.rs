//! # wlan-tsf
//!
//! Synchronizes a Wi-Fi radio's TSF (Timestamp Synchronization Function)
//! clock with the host clock and timestamps TX/RX packets in the host
//! time base, for PTP-style time distribution.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wlan_tsf::testing::RecordingTrigger;
//! use wlan_tsf::{ConnectionState, InterfaceRole, TsfConfig, TsfInterface};
//!
//! # async fn example() -> Result<(), wlan_tsf::TsfError> {
//! let iface = TsfInterface::new(
//!     "wlan0",
//!     InterfaceRole::Station,
//!     TsfConfig::builder().gpio_pin(17).build(),
//!     Arc::new(RecordingTrigger::new()),
//! )?;
//! iface.init();
//! iface.on_connection_state_change(ConnectionState::NotConnected, ConnectionState::Connected);
//!
//! // Firmware answers via `iface.on_capture_event(..)` from its event context.
//! let response = iface.capture_tsf(None).await;
//! println!("TSF state {:?} value {:?}", response.state, response.value);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Per interface**: [`TsfInterface`] - owns one engine instance
//! - **Engine**: [`tsf`] - translator, capture state machine, sync controller,
//!   packet annotator, query interface

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod interface;
pub mod tsf;

#[cfg(test)]
mod error_tests;

// Re-exports
pub use error::{ConfigError, TriggerError, TsfError};
pub use interface::{TsfDebugInfo, TsfInterface};
pub use tsf::{
    CaptureEvent, CaptureTrigger, ClockTranslator, FirmwareStatus, HostClock, PacketTimestamp,
    Timestamped, TsfAnchor, TsfCommand, TsfGetState, TsfResponse,
};
pub use types::{ConnectionState, InterfaceRole, SyncOptions, TsfConfig};
