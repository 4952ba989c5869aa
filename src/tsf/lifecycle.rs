//! Decides when periodic TSF capture runs.
//!
//! In TSF-plus (PTP) mode the controller resyncs the anchor on a fixed
//! interval for as long as the link is up. Without PTP options it never
//! arms on its own and captures only happen on user request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::capture::{CaptureRequest, CaptureStateMachine};
use crate::error::TsfError;
use crate::types::{ConnectionState, SyncOptions};

/// Starts and stops periodic capture in response to link changes.
pub struct SyncController {
    machine: Arc<CaptureStateMachine>,
    options: SyncOptions,
    interval: Duration,
    capture_timeout: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    skipped_ticks: Arc<AtomicU64>,
}

impl SyncController {
    /// Create a stopped controller.
    #[must_use]
    pub fn new(
        machine: Arc<CaptureStateMachine>,
        options: SyncOptions,
        interval: Duration,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            machine,
            options,
            interval,
            capture_timeout,
            timer: Mutex::new(None),
            skipped_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Options fixed at construction.
    #[must_use]
    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Whether this controller ever arms on its own.
    #[must_use]
    pub fn periodic_enabled(&self) -> bool {
        self.options.ptp_enabled()
    }

    /// Whether the periodic timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active_timers() > 0
    }

    /// Number of live periodic timers (0 or 1).
    #[must_use]
    pub fn active_timers(&self) -> usize {
        usize::from(self.lock_timer().as_ref().is_some_and(|t| !t.is_finished()))
    }

    /// Ticks skipped because a capture was still outstanding.
    #[must_use]
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    /// React to a connection state transition.
    ///
    /// Entering `Connected` starts sync; losing the link stops it. Roaming
    /// (`Connected` -> `Associated` -> `Connected`) keeps the existing
    /// session and restarts the timer on reconnect.
    pub fn on_connection_state_change(&self, old: ConnectionState, new: ConnectionState) {
        tracing::debug!(?old, ?new, "TSF: connection state change");
        if new.is_connected() && !old.is_connected() {
            self.start_sync();
        } else if old.has_link() && !new.has_link() {
            self.stop_sync();
        }
    }

    /// Open a sync session: let the capture machine arm again and, with
    /// PTP options set, start periodic capture, replacing any running timer.
    ///
    /// Returns `false` when no periodic timer was started (PTP options
    /// absent or no async runtime). On-demand captures are enabled either way.
    pub fn start_sync(&self) -> bool {
        self.machine.resume();
        if !self.periodic_enabled() {
            tracing::debug!("TSF: no PTP options, periodic sync disabled");
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("TSF: no async runtime, cannot start periodic sync");
            return false;
        };

        let mut timer = self.lock_timer();
        if let Some(previous) = timer.take() {
            previous.abort();
            tracing::debug!("TSF: cancelled previous sync timer");
        }

        let machine = Arc::downgrade(&self.machine);
        let skipped = Arc::clone(&self.skipped_ticks);
        let interval = self.interval;
        let deadline = self.capture_timeout;
        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(machine) = machine.upgrade() else {
                    break;
                };
                match machine.arm_capture(CaptureRequest::periodic(deadline)) {
                    // Outcome lands in the anchor; nobody waits on the handle.
                    Ok(_pending) => {}
                    Err(TsfError::AlreadyCapturing) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("TSF: capture outstanding, skipping sync tick");
                    }
                    // Stopped while this tick was in flight.
                    Err(TsfError::NotReady) => break,
                    Err(e) => tracing::warn!("TSF: periodic capture failed to arm: {}", e),
                }
            }
        }));

        tracing::info!(
            ?interval,
            options = ?self.options,
            "TSF: periodic sync started"
        );
        true
    }

    /// Stop periodic capture, stop the capture machine (aborting any
    /// in-flight capture and refusing new ones until the next
    /// [`start_sync`](Self::start_sync)) and drop the anchor (TSF is
    /// per-BSS and meaningless once the link is gone).
    ///
    /// Returns `true` if a timer was running.
    pub fn stop_sync(&self) -> bool {
        let previous = self.lock_timer().take();
        let was_running = previous.is_some();
        if let Some(timer) = previous {
            timer.abort();
        }
        self.machine.stop();
        self.machine.translator().reset();
        if was_running {
            tracing::info!("TSF: periodic sync stopped");
        }
        was_running
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        if let Some(timer) = self.lock_timer().take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("options", &self.options)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
