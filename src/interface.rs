//! Per-radio-interface TSF engine.
//!
//! One [`TsfInterface`] is built at interface bring-up and owns everything
//! the engine needs: the clock translator, the capture state machine, the
//! sync controller and the packet annotator. Interfaces never share state,
//! so several radios or virtual interfaces progress independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::Result;
use crate::tsf::{
    CaptureEvent, CaptureState, CaptureStateMachine, CaptureStats, CaptureTrigger,
    ClockTranslator, HostClock, PacketAnnotator, PacketTimestamp, SyncController,
    SystemHostClock, Timestamped, TsfAnchor,
};
use crate::types::{ConnectionState, InterfaceRole, SyncOptions, TsfConfig};

/// Diagnostic snapshot, available when the `DEBUG_FS` option is set.
#[derive(Debug, Clone, Serialize)]
pub struct TsfDebugInfo {
    /// Interface name.
    pub interface: String,
    /// Interface role.
    pub role: InterfaceRole,
    /// Link state.
    pub link: ConnectionState,
    /// Active PTP options.
    pub options: SyncOptions,
    /// Current anchor.
    pub anchor: TsfAnchor,
    /// Capture state.
    pub capture_state: CaptureState,
    /// Capture generation.
    pub generation: u64,
    /// Capture counters.
    pub stats: CaptureStats,
    /// Whether periodic sync is running.
    pub periodic_running: bool,
}

impl TsfDebugInfo {
    /// Render as pretty JSON.
    ///
    /// # Errors
    /// Returns the serializer error (not expected for this type).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// TSF engine of one radio interface.
pub struct TsfInterface {
    name: String,
    role: InterfaceRole,
    pub(crate) config: TsfConfig,
    options: SyncOptions,
    machine: Arc<CaptureStateMachine>,
    controller: SyncController,
    annotator: PacketAnnotator,
    pub(crate) host_clock: Arc<dyn HostClock>,
    link: Mutex<ConnectionState>,
    initialized: AtomicBool,
}

impl TsfInterface {
    /// Build the engine using the system clock.
    ///
    /// # Errors
    /// Returns [`crate::TsfError::Config`] if `config` fails validation.
    pub fn new(
        name: impl Into<String>,
        role: InterfaceRole,
        config: TsfConfig,
        trigger: Arc<dyn CaptureTrigger>,
    ) -> Result<Self> {
        Self::with_host_clock(name, role, config, trigger, Arc::new(SystemHostClock))
    }

    /// Build the engine with an explicit host clock.
    ///
    /// # Errors
    /// Returns [`crate::TsfError::Config`] if `config` fails validation.
    pub fn with_host_clock(
        name: impl Into<String>,
        role: InterfaceRole,
        config: TsfConfig,
        trigger: Arc<dyn CaptureTrigger>,
        host_clock: Arc<dyn HostClock>,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let options = config.sync_options();

        let translator = Arc::new(ClockTranslator::new(config.tick_nanos));
        let machine = Arc::new(CaptureStateMachine::new(
            Arc::clone(&translator),
            trigger,
            Arc::clone(&host_clock),
        ));
        let controller = SyncController::new(
            Arc::clone(&machine),
            options,
            config.sync_interval,
            config.capture_timeout,
        );
        let annotator = PacketAnnotator::new(translator, options);

        tracing::debug!(interface = %name, ?role, ?options, "TSF: interface created");
        Ok(Self {
            name,
            role,
            config,
            options,
            machine,
            controller,
            annotator,
            host_clock,
            link: Mutex::new(ConnectionState::NotConnected),
            initialized: AtomicBool::new(false),
        })
    }

    fn lock_link(&self) -> MutexGuard<'_, ConnectionState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the module ready. Starts sync right away if the link is
    /// already up.
    pub fn init(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(interface = %self.name, gpio = ?self.config.gpio_pin, "TSF: init");
        if self.connection_state().is_connected() {
            self.controller.start_sync();
        }
    }

    /// Stop sync and mark the module not ready.
    pub fn deinit(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.controller.stop_sync();
        tracing::info!(interface = %self.name, "TSF: deinit");
    }

    /// Whether [`init`](Self::init) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interface role.
    #[must_use]
    pub fn role(&self) -> InterfaceRole {
        self.role
    }

    /// Active PTP options.
    #[must_use]
    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Clock translator.
    #[must_use]
    pub fn translator(&self) -> &Arc<ClockTranslator> {
        self.machine.translator()
    }

    /// Capture state machine.
    #[must_use]
    pub fn capture(&self) -> &Arc<CaptureStateMachine> {
        &self.machine
    }

    /// Sync controller.
    #[must_use]
    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Packet annotator.
    #[must_use]
    pub fn annotator(&self) -> &PacketAnnotator {
        &self.annotator
    }

    /// Last reported link state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.lock_link()
    }

    /// Connection manager notification.
    pub fn on_connection_state_change(&self, old: ConnectionState, new: ConnectionState) {
        *self.lock_link() = new;
        if !self.is_initialized() {
            tracing::debug!(interface = %self.name, ?new, "TSF: not initialized, ignoring link change");
            return;
        }
        self.controller.on_connection_state_change(old, new);
    }

    /// Firmware capture-complete notification.
    pub fn on_capture_event(&self, event: CaptureEvent) -> bool {
        self.machine.on_capture_event(event)
    }

    /// Timestamp an outgoing packet.
    ///
    /// # Errors
    /// See [`PacketAnnotator::annotate_tx`].
    pub fn annotate_tx<P>(&self, packet: &mut P, target_time: u64) -> Result<PacketTimestamp>
    where
        P: Timestamped + ?Sized,
    {
        self.annotator.annotate_tx(packet, target_time)
    }

    /// Timestamp a received packet.
    ///
    /// # Errors
    /// See [`PacketAnnotator::annotate_rx`].
    pub fn annotate_rx<P>(&self, packet: &mut P, target_time: u64) -> Result<PacketTimestamp>
    where
        P: Timestamped + ?Sized,
    {
        self.annotator.annotate_rx(packet, target_time)
    }

    /// Diagnostic snapshot; `None` unless `DEBUG_FS` is enabled.
    #[must_use]
    pub fn debug_snapshot(&self) -> Option<TsfDebugInfo> {
        if !self.options.debug_fs() {
            return None;
        }
        Some(TsfDebugInfo {
            interface: self.name.clone(),
            role: self.role,
            link: self.connection_state(),
            options: self.options,
            anchor: self.translator().anchor(),
            capture_state: self.machine.state(),
            generation: self.machine.generation(),
            stats: self.machine.stats(),
            periodic_running: self.controller.is_running(),
        })
    }
}

impl Drop for TsfInterface {
    fn drop(&mut self) {
        self.machine.stop();
    }
}

impl std::fmt::Debug for TsfInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsfInterface")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("options", &self.options)
            .field("initialized", &self.is_initialized())
            .field("capture", &self.machine)
            .finish_non_exhaustive()
    }
}
