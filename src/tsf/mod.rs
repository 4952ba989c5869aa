//! TSF capture and translation engine.
//!
//! Keeps a Wi-Fi radio's free-running TSF counter and the host wall clock
//! in step so TX/RX packets can carry host-domain hardware timestamps.
//!
//! ## Capture Flow
//!
//! ```text
//! Host                              Firmware
//!   |--- arm_capture (token N) ------>|  (toggles GPIO, latches TSF)
//!   |                                 |
//!   |<-- CaptureEvent (token N, TSF) -|
//!   |                                 |
//!   |  anchor = (TSF, host_now)       |
//!   |  host(t) = anchor.host + (t - anchor.tsf) * tick
//! ```
//!
//! ## Modes
//!
//! - **On-demand**: no PTP options. Captures happen only on a vendor-command
//!   `SET`; `GET` reads the anchor-derived TSF.
//! - **TSF-plus (PTP)**: any PTP option set. The sync controller resyncs on a
//!   fixed interval while connected, and packets are timestamped per the
//!   TX/RX/RAW options. The on-demand path reports
//!   [`TsfGetState::DisabledByTsfPlus`].

pub mod anchor;
pub mod annotator;
pub mod capture;
pub mod hw;
pub mod lifecycle;
pub mod query;
pub mod translator;

#[cfg(test)]
mod tests;

// Re-exports for convenient access.
pub use anchor::TsfAnchor;
pub use annotator::{Direction, PacketAnnotator, PacketTimestamp, Timestamped};
pub use capture::{
    CaptureEvent, CaptureRequest, CaptureSample, CaptureState, CaptureStateMachine, CaptureStats,
    CaptureToken, FirmwareStatus, PendingCapture, Requester,
};
pub use hw::{CaptureTrigger, HostClock, SystemHostClock};
pub use lifecycle::SyncController;
pub use query::{TsfCommand, TsfGetState, TsfOperation, TsfResponse};
pub use translator::ClockTranslator;
