use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::options::SyncOptions;
use crate::error::ConfigError;

/// Configuration for a TSF engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsfConfig {
    /// GPIO the firmware toggles on capture (None = firmware-internal latch)
    pub gpio_pin: Option<u32>,

    /// Deadline for the firmware capture event (default: 1 second)
    pub capture_timeout: Duration,

    /// Interval between periodic captures in PTP mode (default: 9 seconds)
    pub sync_interval: Duration,

    /// Duration of one radio clock tick in nanoseconds (default: 1000, a 1 MHz TSF)
    pub tick_nanos: u64,

    /// Raw PTP option bits, see [`SyncOptions`] (default: 0, PTP disabled)
    pub ptp_options: u32,
}

impl Default for TsfConfig {
    fn default() -> Self {
        Self {
            gpio_pin: None,
            capture_timeout: Duration::from_secs(1),
            sync_interval: Duration::from_secs(9),
            tick_nanos: 1000,
            ptp_options: 0,
        }
    }
}

impl TsfConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> TsfConfigBuilder {
        TsfConfigBuilder::default()
    }

    /// Parse a JSON config document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_nanos == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_nanos",
                message: "must be non-zero".to_string(),
            });
        }
        if self.capture_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "capture_timeout",
                message: "must be non-zero".to_string(),
            });
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sync_interval",
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Typed view of the PTP option bits
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::from_config_bits(self.ptp_options)
    }
}

/// Builder for `TsfConfig`
#[derive(Debug, Clone, Default)]
pub struct TsfConfigBuilder {
    config: TsfConfig,
}

impl TsfConfigBuilder {
    /// Set the capture GPIO
    #[must_use]
    pub fn gpio_pin(mut self, pin: u32) -> Self {
        self.config.gpio_pin = Some(pin);
        self
    }

    /// Set the firmware event deadline
    #[must_use]
    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.config.capture_timeout = timeout;
        self
    }

    /// Set periodic sync interval
    #[must_use]
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval = interval;
        self
    }

    /// Set the radio tick duration
    #[must_use]
    pub fn tick_nanos(mut self, nanos: u64) -> Self {
        self.config.tick_nanos = nanos;
        self
    }

    /// Set PTP options
    #[must_use]
    pub fn ptp_options(mut self, options: SyncOptions) -> Self {
        self.config.ptp_options = options.bits();
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> TsfConfig {
        self.config
    }
}
