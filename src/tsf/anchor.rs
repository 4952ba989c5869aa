//! Radio/host clock anchor pair.

use serde::Serialize;

/// The most recent successful capture: at `radio_time` ticks the host
/// clock read `host_time` nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TsfAnchor {
    /// Radio TSF value in ticks.
    pub radio_time: u64,
    /// Host wall-clock time in nanoseconds.
    pub host_time: u64,
    /// False until the first successful capture.
    pub valid: bool,
}

impl TsfAnchor {
    /// Anchor before any capture has completed.
    pub const INVALID: Self = Self {
        radio_time: 0,
        host_time: 0,
        valid: false,
    };

    /// Create a valid anchor.
    #[must_use]
    pub fn new(radio_time: u64, host_time: u64) -> Self {
        Self {
            radio_time,
            host_time,
            valid: true,
        }
    }
}

impl std::fmt::Display for TsfAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid {
            write!(f, "tsf={} host={}ns", self.radio_time, self.host_time)
        } else {
            f.write_str("<no anchor>")
        }
    }
}
