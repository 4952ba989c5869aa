/// Simulated firmware capture path.
pub mod firmware_sim;
#[cfg(test)]
/// Unit tests for the test doubles.
pub mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::TriggerError;
use crate::tsf::{CaptureToken, CaptureTrigger, HostClock, PacketTimestamp, Timestamped};

pub use firmware_sim::{FirmwareBehavior, FirmwareSimulator};

/// Host clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualHostClock {
    now: AtomicU64,
}

impl ManualHostClock {
    /// Create a clock reading `nanos`.
    #[must_use]
    pub fn new(nanos: u64) -> Self {
        Self {
            now: AtomicU64::new(nanos),
        }
    }

    /// Set the current time.
    pub fn set(&self, nanos: u64) {
        self.now.store(nanos, Ordering::Release);
    }

    /// Move the clock forward.
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl HostClock for ManualHostClock {
    fn now_nanos(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// One call made to a [`RecordingTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerCall {
    /// GPIO requested.
    pub gpio: Option<u32>,
    /// Token of the armed capture.
    pub token: CaptureToken,
}

/// Capture trigger that records calls and never answers on its own.
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    calls: Mutex<Vec<TriggerCall>>,
    failing: AtomicBool,
    notify: Option<mpsc::UnboundedSender<TriggerCall>>,
}

impl RecordingTrigger {
    /// Create a trigger that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trigger that also forwards each call over a channel.
    #[must_use]
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<TriggerCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = Self {
            notify: Some(tx),
            ..Self::default()
        };
        (trigger, rx)
    }

    /// Make subsequent triggers fail with a GPIO reset error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// All accepted calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TriggerCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Token of the most recent accepted call.
    #[must_use]
    pub fn last_token(&self) -> Option<CaptureToken> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|c| c.token)
    }
}

impl CaptureTrigger for RecordingTrigger {
    fn trigger(&self, gpio: Option<u32>, token: CaptureToken) -> Result<(), TriggerError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(TriggerError::GpioReset {
                pin: gpio.unwrap_or_default(),
            });
        }
        let call = TriggerCall { gpio, token };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if let Some(notify) = &self.notify {
            let _ = notify.send(call);
        }
        Ok(())
    }
}

/// Minimal packet carrying a timestamp slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestPacket {
    /// Payload.
    pub payload: Vec<u8>,
    /// Attached hardware timestamp.
    pub timestamp: Option<PacketTimestamp>,
}

impl TestPacket {
    /// Create a packet with `payload`.
    #[must_use]
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            timestamp: None,
        }
    }
}

impl Timestamped for TestPacket {
    fn set_timestamp(&mut self, timestamp: PacketTimestamp) {
        self.timestamp = Some(timestamp);
    }
}
