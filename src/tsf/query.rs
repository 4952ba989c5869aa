//! On-demand TSF queries (vendor-command SET / GET).
//!
//! Every outcome is reported as a specific [`TsfGetState`], never as a
//! generic failure.

use serde::Serialize;

use super::capture::{CaptureRequest, CaptureSample};
use crate::error::{Result, TsfError};
use crate::interface::TsfInterface;
use crate::types::InterfaceRole;

/// Outcome of a TSF query, numbered as the driver's `hdd_tsf_get_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum TsfGetState {
    /// Value returned.
    Return = 0,
    /// Station not connected.
    StaNotConnectedNoTsf = 1,
    /// Firmware never delivered the captured value.
    NotReturnedByFw = 2,
    /// A capture is outstanding; retry later.
    CurrentInCapState = 3,
    /// Firmware reported a capture failure.
    CaptureFail = 4,
    /// The query could not be completed.
    GetFail = 5,
    /// GPIO could not be reset for the capture.
    ResetGpioFail = 6,
    /// Soft AP not started.
    SapNotStartedNoTsf = 7,
    /// Module not initialized, or no capture yet.
    NotReady = 8,
    /// Query path owned by TSF-plus (PTP) mode.
    DisabledByTsfPlus = 9,
}

impl TsfGetState {
    /// Numeric driver code.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl From<&TsfError> for TsfGetState {
    fn from(err: &TsfError) -> Self {
        match err {
            TsfError::AnchorNotReady | TsfError::NotReady => Self::NotReady,
            TsfError::AlreadyCapturing => Self::CurrentInCapState,
            TsfError::CaptureTimeout { .. } => Self::NotReturnedByFw,
            TsfError::CaptureFailed { .. } => Self::CaptureFail,
            TsfError::GpioResetFailed(_) => Self::ResetGpioFail,
            TsfError::DisabledByMode => Self::DisabledByTsfPlus,
            TsfError::NotConnected {
                role: InterfaceRole::Station,
            } => Self::StaNotConnectedNoTsf,
            TsfError::NotConnected {
                role: InterfaceRole::SoftAp,
            } => Self::SapNotStartedNoTsf,
            TsfError::CaptureAborted | TsfError::Unsupported | TsfError::Config(_) => {
                Self::GetFail
            }
        }
    }
}

/// Vendor-command operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsfOperation {
    /// Arm a one-shot capture and return the latched value.
    Set,
    /// Read the current TSF estimate.
    Get,
}

/// Decoded vendor-command request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsfCommand {
    /// Requested operation.
    pub operation: TsfOperation,
    /// GPIO override for `Set`.
    pub target_gpio: Option<u32>,
}

impl TsfCommand {
    /// `Set` using the configured GPIO.
    #[must_use]
    pub fn set() -> Self {
        Self {
            operation: TsfOperation::Set,
            target_gpio: None,
        }
    }

    /// `Get`.
    #[must_use]
    pub fn get() -> Self {
        Self {
            operation: TsfOperation::Get,
            target_gpio: None,
        }
    }
}

/// Response to a TSF query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TsfResponse {
    /// Outcome.
    pub state: TsfGetState,
    /// TSF value when `state` is [`TsfGetState::Return`].
    pub value: Option<u64>,
}

impl TsfResponse {
    fn from_result(result: Result<u64>) -> Self {
        match result {
            Ok(value) => Self {
                state: TsfGetState::Return,
                value: Some(value),
            },
            Err(e) => Self {
                state: TsfGetState::from(&e),
                value: None,
            },
        }
    }

    /// Encode as the driver's `[state, tsf_low, tsf_high]` word buffer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "Splitting u64 into two u32 halves")]
    pub fn to_words(&self) -> [u32; 3] {
        let value = self.value.unwrap_or(0);
        [self.state.code(), value as u32, (value >> 32) as u32]
    }
}

impl TsfInterface {
    fn check_query_path(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(TsfError::NotReady);
        }
        if self.options().ptp_enabled() {
            return Err(TsfError::DisabledByMode);
        }
        if !self.connection_state().is_connected() {
            return Err(TsfError::NotConnected { role: self.role() });
        }
        Ok(())
    }

    /// Current TSF estimate derived from the anchor.
    ///
    /// # Errors
    /// - [`TsfError::NotReady`], [`TsfError::DisabledByMode`], [`TsfError::NotConnected`]
    ///   when the query path is unavailable.
    /// - [`TsfError::AlreadyCapturing`] while a capture is outstanding.
    /// - [`TsfError::AnchorNotReady`] before the first capture.
    pub fn current_tsf(&self) -> Result<u64> {
        self.check_query_path()?;
        if self.capture().is_capturing() {
            return Err(TsfError::AlreadyCapturing);
        }
        self.translator()
            .host_to_radio(self.host_clock.now_nanos())
    }

    /// Arm a one-shot capture and wait for firmware, bounded by the
    /// configured capture timeout.
    ///
    /// # Errors
    /// Query-path errors as for [`current_tsf`](Self::current_tsf), plus any
    /// capture failure.
    pub async fn capture_once(&self, gpio: Option<u32>) -> Result<CaptureSample> {
        self.check_query_path()?;
        let request = CaptureRequest::one_shot(self.config.capture_timeout)
            .with_gpio(gpio.or(self.config.gpio_pin));
        let pending = self.capture().arm_capture(request)?;
        pending.wait().await
    }

    /// GET: report the current TSF.
    #[must_use]
    pub fn get_tsf(&self) -> TsfResponse {
        let response = TsfResponse::from_result(self.current_tsf());
        tracing::debug!(interface = %self.name(), state = ?response.state, "TSF: get");
        response
    }

    /// SET: capture the TSF and report the latched value.
    pub async fn capture_tsf(&self, gpio: Option<u32>) -> TsfResponse {
        let response =
            TsfResponse::from_result(self.capture_once(gpio).await.map(|s| s.radio_time));
        tracing::debug!(interface = %self.name(), state = ?response.state, "TSF: capture");
        response
    }

    /// Vendor-command entry point.
    pub async fn handle_tsf_cmd(&self, command: TsfCommand) -> TsfResponse {
        match command.operation {
            TsfOperation::Set => self.capture_tsf(command.target_gpio).await,
            TsfOperation::Get => self.get_tsf(),
        }
    }
}
