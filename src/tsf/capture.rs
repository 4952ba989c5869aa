//! Hardware TSF capture state machine.
//!
//! ```text
//!            arm_capture                on_capture_event / on_timeout / abort
//!   Idle ----------------> Capturing ---------------------------------------> Idle
//! ```
//!
//! At most one capture is in flight per interface; a second arm is rejected
//! rather than queued. Once [`stop`](CaptureStateMachine::stop)ped the
//! machine refuses to arm until [`resume`](CaptureStateMachine::resume)d.
//! Every arm (and every abort) bumps a generation
//! counter. The generation is handed to the hardware trigger as a
//! [`CaptureToken`] and must come back with the firmware event, so an event
//! for a capture that already timed out, or that belongs to a stopped sync
//! session, can never touch the anchor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::hw::{CaptureTrigger, HostClock};
use super::translator::ClockTranslator;
use crate::error::{Result, TsfError};

/// Capture state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CaptureState {
    /// No capture armed.
    Idle,
    /// Trigger sent, waiting for the firmware event.
    Capturing,
}

/// Who asked for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Requester {
    /// User-space query waiting for the result.
    OneShotQuery,
    /// Periodic PTP resync.
    PeriodicSync,
}

/// Identifies one armed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CaptureToken(u64);

impl CaptureToken {
    /// Generation this token was issued for.
    #[must_use]
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// A request to arm the capture hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Who is asking.
    pub requester: Requester,
    /// How long firmware has to answer.
    pub deadline: Duration,
    /// GPIO override for this capture only.
    pub gpio: Option<u32>,
}

impl CaptureRequest {
    /// One-shot capture for a user query.
    #[must_use]
    pub fn one_shot(deadline: Duration) -> Self {
        Self {
            requester: Requester::OneShotQuery,
            deadline,
            gpio: None,
        }
    }

    /// Capture issued by the periodic resync.
    #[must_use]
    pub fn periodic(deadline: Duration) -> Self {
        Self {
            requester: Requester::PeriodicSync,
            deadline,
            gpio: None,
        }
    }

    /// Toggle a specific GPIO for this capture.
    #[must_use]
    pub fn with_gpio(mut self, gpio: Option<u32>) -> Self {
        self.gpio = gpio;
        self
    }
}

/// Firmware result code of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareStatus {
    /// TSF latched.
    Success,
    /// Firmware-reported failure code.
    Failed(u32),
}

impl FirmwareStatus {
    /// Decode a firmware result code (0 = success).
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        if code == 0 {
            Self::Success
        } else {
            Self::Failed(code)
        }
    }
}

/// Asynchronous capture-complete event from firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Token of the capture this answers.
    pub token: CaptureToken,
    /// Latched TSF value.
    pub radio_time: u64,
    /// Firmware result.
    pub status: FirmwareStatus,
}

/// Result of a completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureSample {
    /// Latched TSF value.
    pub radio_time: u64,
    /// Host time recorded when the event was processed.
    pub host_time: u64,
}

type CaptureReply = Result<CaptureSample>;

/// Handle to an armed capture.
#[derive(Debug)]
pub struct PendingCapture {
    token: CaptureToken,
    reply: oneshot::Receiver<CaptureReply>,
}

impl PendingCapture {
    /// Token of this capture.
    #[must_use]
    pub fn token(&self) -> CaptureToken {
        self.token
    }

    /// Wait for the capture to resolve.
    ///
    /// Bounded by the request deadline: the watchdog resolves the capture
    /// with [`TsfError::CaptureTimeout`] if firmware stays silent. The
    /// watchdog needs a tokio runtime at arm time; a capture armed outside
    /// one is only resolved by an event, [`CaptureStateMachine::on_timeout`]
    /// or an abort.
    ///
    /// # Errors
    /// Returns the failure the capture resolved with.
    pub async fn wait(self) -> Result<CaptureSample> {
        self.reply.await.unwrap_or(Err(TsfError::CaptureAborted))
    }
}

/// Snapshot of capture counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Captures successfully armed.
    pub armed: u64,
    /// Captures that updated the anchor.
    pub completed: u64,
    /// Captures that failed (firmware status or trigger).
    pub failed: u64,
    /// Captures resolved by the watchdog.
    pub timed_out: u64,
    /// Captures cancelled by sync stop.
    pub aborted: u64,
    /// Late, duplicate or foreign events that were discarded.
    pub stale_events: u64,
}

#[derive(Debug, Default)]
struct Counters {
    armed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    aborted: AtomicU64,
    stale_events: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            armed: self.armed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
        }
    }
}

struct InFlight {
    token: CaptureToken,
    request: CaptureRequest,
    reply: oneshot::Sender<CaptureReply>,
    watchdog: Option<JoinHandle<()>>,
}

impl InFlight {
    /// Deliver the outcome to the requester.
    ///
    /// The watchdog is aborted unless it is the caller.
    fn resolve(self, reply: CaptureReply, from_watchdog: bool) {
        if let Some(watchdog) = self.watchdog {
            if !from_watchdog {
                watchdog.abort();
            }
        }
        // Periodic requesters drop their handle; nobody listening is fine.
        let _ = self.reply.send(reply);
    }
}

struct Inner {
    in_flight: Option<InFlight>,
    generation: u64,
    stopped: bool,
}

/// Per-interface capture state machine.
pub struct CaptureStateMachine {
    inner: Mutex<Inner>,
    translator: Arc<ClockTranslator>,
    trigger: Arc<dyn CaptureTrigger>,
    host_clock: Arc<dyn HostClock>,
    counters: Counters,
}

impl CaptureStateMachine {
    /// Create an idle state machine feeding `translator`.
    #[must_use]
    pub fn new(
        translator: Arc<ClockTranslator>,
        trigger: Arc<dyn CaptureTrigger>,
        host_clock: Arc<dyn HostClock>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                in_flight: None,
                generation: 0,
                stopped: false,
            }),
            translator,
            trigger,
            host_clock,
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        if self.lock().in_flight.is_some() {
            CaptureState::Capturing
        } else {
            CaptureState::Idle
        }
    }

    /// Whether a capture is outstanding.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state() == CaptureState::Capturing
    }

    /// Current generation (bumped on every arm and abort).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Whether the machine refuses to arm.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Requester of the outstanding capture, if any.
    #[must_use]
    pub fn outstanding(&self) -> Option<Requester> {
        self.lock().in_flight.as_ref().map(|f| f.request.requester)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Translator this machine updates.
    #[must_use]
    pub fn translator(&self) -> &Arc<ClockTranslator> {
        &self.translator
    }

    /// Arm the capture hardware.
    ///
    /// The firmware event may be delivered from any context, including
    /// synchronously from inside the trigger.
    ///
    /// # Errors
    /// - [`TsfError::NotReady`] after [`stop`](Self::stop) until [`resume`](Self::resume).
    /// - [`TsfError::AlreadyCapturing`] if a capture is outstanding; nothing is queued.
    /// - [`TsfError::GpioResetFailed`] if the trigger could not be issued; the machine stays idle.
    pub fn arm_capture(self: &Arc<Self>, request: CaptureRequest) -> Result<PendingCapture> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let token = {
            let mut inner = self.lock();
            if inner.stopped {
                tracing::debug!(
                    requester = ?request.requester,
                    "TSF: capture stopped, rejecting arm"
                );
                return Err(TsfError::NotReady);
            }
            if let Some(flight) = inner.in_flight.as_ref() {
                tracing::debug!(
                    outstanding = flight.token.0,
                    requester = ?request.requester,
                    "TSF: capture already in progress, rejecting arm"
                );
                return Err(TsfError::AlreadyCapturing);
            }
            inner.generation = inner.generation.wrapping_add(1);
            let token = CaptureToken(inner.generation);
            inner.in_flight = Some(InFlight {
                token,
                request,
                reply: reply_tx,
                watchdog: None,
            });
            token
        };

        if let Err(e) = self.trigger.trigger(request.gpio, token) {
            let mut inner = self.lock();
            if inner.in_flight.as_ref().is_some_and(|f| f.token == token) {
                inner.in_flight = None;
            }
            drop(inner);
            Counters::bump(&self.counters.failed);
            tracing::warn!(generation = token.0, gpio = ?request.gpio, "TSF: capture trigger failed: {}", e);
            return Err(TsfError::GpioResetFailed(e));
        }

        Counters::bump(&self.counters.armed);
        tracing::debug!(
            generation = token.0,
            requester = ?request.requester,
            deadline = ?request.deadline,
            "TSF: capture armed"
        );

        self.spawn_watchdog(token, request.deadline);

        Ok(PendingCapture {
            token,
            reply: reply_rx,
        })
    }

    fn spawn_watchdog(self: &Arc<Self>, token: CaptureToken, deadline: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                generation = token.0,
                "TSF: no async runtime, capture deadline not enforced"
            );
            return;
        };
        let machine: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(deadline).await;
            if let Some(machine) = machine.upgrade() {
                machine.expire(token, true);
            }
        });

        let mut inner = self.lock();
        match inner.in_flight.as_mut() {
            Some(flight) if flight.token == token => flight.watchdog = Some(handle),
            // Already resolved (e.g. firmware answered from inside the trigger).
            _ => handle.abort(),
        }
    }

    /// Consume a firmware capture-complete event.
    ///
    /// Returns `true` if the event resolved the outstanding capture. Events
    /// arriving while idle or carrying another capture's token are counted
    /// as stale and dropped without touching the anchor.
    pub fn on_capture_event(&self, event: CaptureEvent) -> bool {
        let mut inner = self.lock();
        let outstanding = inner.in_flight.as_ref().map(|f| f.token);
        if outstanding != Some(event.token) {
            drop(inner);
            Counters::bump(&self.counters.stale_events);
            tracing::debug!(
                event_generation = event.token.0,
                outstanding = ?outstanding.map(CaptureToken::generation),
                radio_time = event.radio_time,
                "TSF: discarding stale capture event"
            );
            return false;
        }
        let Some(flight) = inner.in_flight.take() else {
            return false;
        };

        let reply = match event.status {
            FirmwareStatus::Success => {
                // Anchor update stays under the lock so an abort cannot interleave.
                let host_time = self.host_clock.now_nanos();
                self.translator.update_anchor(event.radio_time, host_time);
                Ok(CaptureSample {
                    radio_time: event.radio_time,
                    host_time,
                })
            }
            FirmwareStatus::Failed(status) => Err(TsfError::CaptureFailed { status }),
        };
        drop(inner);

        match &reply {
            Ok(sample) => {
                Counters::bump(&self.counters.completed);
                tracing::debug!(
                    generation = event.token.0,
                    radio_time = sample.radio_time,
                    host_time = sample.host_time,
                    "TSF: capture complete"
                );
            }
            Err(e) => {
                Counters::bump(&self.counters.failed);
                tracing::warn!(generation = event.token.0, "TSF: {}", e);
            }
        }
        flight.resolve(reply, false);
        true
    }

    /// Force the capture identified by `token` back to idle with
    /// [`TsfError::CaptureTimeout`].
    ///
    /// Returns `false` if that capture already resolved.
    pub fn on_timeout(&self, token: CaptureToken) -> bool {
        self.expire(token, false)
    }

    fn expire(&self, token: CaptureToken, from_watchdog: bool) -> bool {
        let flight = {
            let mut inner = self.lock();
            if !inner.in_flight.as_ref().is_some_and(|f| f.token == token) {
                return false;
            }
            inner.in_flight.take()
        };
        let Some(flight) = flight else {
            return false;
        };
        let duration = flight.request.deadline;
        Counters::bump(&self.counters.timed_out);
        tracing::warn!(
            generation = token.0,
            ?duration,
            "TSF: firmware did not deliver capture event"
        );
        flight.resolve(Err(TsfError::CaptureTimeout { duration }), from_watchdog);
        true
    }

    /// Cancel any outstanding capture and start a new generation.
    ///
    /// Returns `true` if a capture was outstanding.
    pub fn abort(&self) -> bool {
        self.cancel(false)
    }

    /// Abort and refuse further arms until [`resume`](Self::resume).
    ///
    /// The stop and the generation bump happen under the lock that
    /// `arm_capture` checks, so no capture can be armed past a stop.
    ///
    /// Returns `true` if a capture was outstanding.
    pub fn stop(&self) -> bool {
        self.cancel(true)
    }

    /// Accept arms again after [`stop`](Self::stop).
    pub fn resume(&self) {
        let mut inner = self.lock();
        if inner.stopped {
            inner.stopped = false;
            tracing::debug!(generation = inner.generation, "TSF: capture resumed");
        }
    }

    fn cancel(&self, stop: bool) -> bool {
        let flight = {
            let mut inner = self.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.stopped |= stop;
            inner.in_flight.take()
        };
        match flight {
            Some(flight) => {
                Counters::bump(&self.counters.aborted);
                tracing::debug!(generation = flight.token.0, "TSF: capture aborted");
                flight.resolve(Err(TsfError::CaptureAborted), false);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CaptureStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStateMachine")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
