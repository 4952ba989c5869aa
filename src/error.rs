use thiserror::Error;

use crate::types::InterfaceRole;

/// Errors raised by the hardware capture trigger collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    /// GPIO could not be reset/toggled for the capture
    #[error("GPIO {pin} reset failed")]
    GpioReset {
        /// The GPIO pin involved
        pin: u32,
    },

    /// Firmware rejected the capture command
    #[error("firmware rejected capture command: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its valid range
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Name of the offending field
        field: &'static str,
        /// Description of the problem
        message: String,
    },

    /// The configuration document could not be parsed
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur during TSF capture and translation
#[derive(Debug, Error)]
pub enum TsfError {
    /// No successful capture has established an anchor yet
    #[error("TSF anchor not ready")]
    AnchorNotReady,

    /// A capture is already in flight on this interface
    #[error("capture already in progress")]
    AlreadyCapturing,

    /// Firmware did not deliver the capture event before the deadline
    #[error("capture timed out after {duration:?}")]
    CaptureTimeout {
        /// The deadline that elapsed
        duration: std::time::Duration,
    },

    /// Firmware reported a failed capture
    #[error("capture failed: firmware status {status}")]
    CaptureFailed {
        /// Firmware result code
        status: u32,
    },

    /// The hardware trigger could not be issued
    #[error("GPIO reset failed: {0}")]
    GpioResetFailed(#[source] TriggerError),

    /// Capture was cancelled because sync stopped
    #[error("capture aborted")]
    CaptureAborted,

    /// Module not initialized for this interface
    #[error("TSF module not ready")]
    NotReady,

    /// PTP (TSF-plus) mode owns this path
    #[error("disabled by TSF-plus mode")]
    DisabledByMode,

    /// Interface has no active link for its role
    #[error("{role:?} has no active link")]
    NotConnected {
        /// Role of the interface
        role: InterfaceRole,
    },

    /// Timestamping direction not enabled in the sync options
    #[error("timestamping not supported")]
    Unsupported,

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl TsfError {
    /// Check if the caller may retry the operation later
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AnchorNotReady
                | Self::AlreadyCapturing
                | Self::CaptureTimeout { .. }
                | Self::CaptureFailed { .. }
                | Self::CaptureAborted
        )
    }

    /// Check if this error originated on the firmware side of a capture
    #[must_use]
    pub fn is_firmware_failure(&self) -> bool {
        matches!(
            self,
            Self::CaptureTimeout { .. } | Self::CaptureFailed { .. }
        )
    }
}

/// Result type alias for TSF operations
pub type Result<T> = std::result::Result<T, TsfError>;
