//! Seams to the hardware/firmware and the host clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::capture::CaptureToken;
use crate::error::TriggerError;

/// Issues the capture command that makes firmware latch the TSF.
///
/// The firmware answers asynchronously; whoever receives that answer must
/// hand it to [`CaptureStateMachine::on_capture_event`] together with the
/// `token` passed here.
///
/// [`CaptureStateMachine::on_capture_event`]: super::capture::CaptureStateMachine::on_capture_event
pub trait CaptureTrigger: Send + Sync {
    /// Send the capture command, toggling `gpio` when one is configured.
    ///
    /// # Errors
    /// Returns [`TriggerError`] if the command could not be issued.
    fn trigger(&self, gpio: Option<u32>, token: CaptureToken) -> Result<(), TriggerError>;
}

/// Source of host wall-clock time.
pub trait HostClock: Send + Sync {
    /// Current host time in nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64;
}

/// [`HostClock`] backed by the system real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostClock;

impl HostClock for SystemHostClock {
    fn now_nanos(&self) -> u64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX)
    }
}
