//! PTP timestamping options

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// TSF-plus (PTP) options, fixed once sync is configured.
    ///
    /// Bit values follow the driver's `gtsf_ptp_options` ini setting.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SyncOptions: u32 {
        /// Timestamp received packets
        const RX = 0x1;
        /// Timestamp transmitted packets
        const TX = 0x2;
        /// Also record raw radio ticks on packets
        const RAW = 0x4;
        /// Expose the debug snapshot
        const DEBUG_FS = 0x8;
    }
}

impl SyncOptions {
    /// Build from the raw config bits, dropping unknown bits
    #[must_use]
    pub fn from_config_bits(bits: u32) -> Self {
        let options = Self::from_bits_truncate(bits);
        if options.bits() != bits {
            tracing::warn!(
                bits = format_args!("0x{bits:X}"),
                "TSF: ignoring unknown PTP option bits"
            );
        }
        options
    }

    /// Whether TSF-plus (PTP) mode is active.
    ///
    /// In PTP mode the periodic sync owns the capture hardware and the
    /// on-demand query path is disabled.
    #[must_use]
    pub fn ptp_enabled(self) -> bool {
        !self.is_empty()
    }

    /// Whether TX timestamping is enabled
    #[must_use]
    pub fn tx(self) -> bool {
        self.contains(Self::TX)
    }

    /// Whether RX timestamping is enabled
    #[must_use]
    pub fn rx(self) -> bool {
        self.contains(Self::RX)
    }

    /// Whether raw radio ticks are recorded
    #[must_use]
    pub fn raw(self) -> bool {
        self.contains(Self::RAW)
    }

    /// Whether the debug snapshot is exposed
    #[must_use]
    pub fn debug_fs(self) -> bool {
        self.contains(Self::DEBUG_FS)
    }
}
