//! Simulated firmware capture path for testing

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::TriggerError;
use crate::tsf::{CaptureEvent, CaptureToken, CaptureTrigger, FirmwareStatus, HostClock};

/// How the simulated firmware answers one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareBehavior {
    /// Deliver one successful event
    Respond,
    /// Never deliver the event
    Drop,
    /// Deliver the same event twice
    Duplicate,
    /// Deliver a failure with this status code
    Fail(u32),
}

/// Firmware simulator
///
/// Latches a simulated TSF (`tsf_offset + host_now / tick_nanos`) when
/// triggered and emits the [`CaptureEvent`] on a channel after `delay`,
/// the way the driver's firmware event context would.
pub struct FirmwareSimulator {
    host_clock: Arc<dyn HostClock>,
    tick_nanos: u64,
    tsf_offset: u64,
    delay: Duration,
    script: Mutex<VecDeque<FirmwareBehavior>>,
    events: mpsc::UnboundedSender<CaptureEvent>,
}

impl FirmwareSimulator {
    /// Create a simulator and the receiving end of its event channel
    #[must_use]
    pub fn new(
        host_clock: Arc<dyn HostClock>,
        tick_nanos: u64,
        tsf_offset: u64,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let sim = Self {
            host_clock,
            tick_nanos: tick_nanos.max(1),
            tsf_offset,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            events,
        };
        (sim, rx)
    }

    /// Delay every event by `delay`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue the behaviour for the next capture (default: respond)
    pub fn push_behavior(&self, behavior: FirmwareBehavior) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(behavior);
    }

    /// Simulated TSF at host time `host_nanos`
    #[must_use]
    pub fn radio_time_at(&self, host_nanos: u64) -> u64 {
        self.tsf_offset
            .wrapping_add(host_nanos / self.tick_nanos)
    }

    fn emit(&self, event: CaptureEvent, copies: usize) {
        if copies == 0 {
            return;
        }
        let events = self.events.clone();
        let send = move || {
            for _ in 0..copies {
                let _ = events.send(event);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) if !self.delay.is_zero() => {
                let delay = self.delay;
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    send();
                });
            }
            _ => send(),
        }
    }
}

impl CaptureTrigger for FirmwareSimulator {
    fn trigger(&self, _gpio: Option<u32>, token: CaptureToken) -> Result<(), TriggerError> {
        let behavior = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(FirmwareBehavior::Respond);

        let event = CaptureEvent {
            token,
            radio_time: self.radio_time_at(self.host_clock.now_nanos()),
            status: match behavior {
                FirmwareBehavior::Fail(code) => FirmwareStatus::Failed(code),
                _ => FirmwareStatus::Success,
            },
        };
        let copies = match behavior {
            FirmwareBehavior::Drop => 0,
            FirmwareBehavior::Duplicate => 2,
            FirmwareBehavior::Respond | FirmwareBehavior::Fail(_) => 1,
        };
        self.emit(event, copies);
        Ok(())
    }
}

impl std::fmt::Debug for FirmwareSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirmwareSimulator")
            .field("tick_nanos", &self.tick_nanos)
            .field("tsf_offset", &self.tsf_offset)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
