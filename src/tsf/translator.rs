//! Radio ↔ host clock translation.
//!
//! The radio TSF is a free-running 64-bit counter; the host clock is wall
//! time in nanoseconds. A single [`TsfAnchor`] pairs the two domains and
//! every conversion is a linear offset from it:
//!
//! ```text
//! host  = anchor.host  + (radio - anchor.radio) * tick_nanos
//! radio = anchor.radio + (host  - anchor.host)  / tick_nanos
//! ```
//!
//! All arithmetic is modulo 2^64, so a counter rollover between the anchor
//! and the converted value is handled transparently.
//!
//! The anchor lives in a sequence lock over atomics: packet annotation on
//! the TX/RX paths reads it without taking a lock, and a reader can never
//! observe a radio time from one capture paired with a host time from
//! another.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering, fence};

use super::anchor::TsfAnchor;
use crate::error::{Result, TsfError};

/// Converts timestamps between the radio TSF and the host clock.
pub struct ClockTranslator {
    /// Nanoseconds per radio tick.
    tick_nanos: u64,
    /// Sequence counter; odd while a writer is updating the anchor.
    seq: AtomicU64,
    radio_time: AtomicU64,
    host_time: AtomicU64,
    valid: AtomicBool,
}

impl ClockTranslator {
    /// TSF counts microseconds.
    pub const DEFAULT_TICK_NANOS: u64 = 1000;

    /// Create a translator with no anchor.
    ///
    /// A zero `tick_nanos` is treated as one.
    #[must_use]
    pub fn new(tick_nanos: u64) -> Self {
        Self {
            tick_nanos: tick_nanos.max(1),
            seq: AtomicU64::new(0),
            radio_time: AtomicU64::new(0),
            host_time: AtomicU64::new(0),
            valid: AtomicBool::new(false),
        }
    }

    /// Nanoseconds per radio tick.
    #[must_use]
    pub fn tick_nanos(&self) -> u64 {
        self.tick_nanos
    }

    /// Replace the anchor with a new capture. Always succeeds.
    pub fn update_anchor(&self, radio_time: u64, host_time: u64) {
        self.store(TsfAnchor::new(radio_time, host_time));
        tracing::trace!(radio_time, host_time, "TSF: anchor updated");
    }

    /// Invalidate the anchor.
    pub fn reset(&self) {
        self.store(TsfAnchor::INVALID);
    }

    /// Consistent copy of the current anchor.
    #[must_use]
    pub fn anchor(&self) -> TsfAnchor {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let anchor = TsfAnchor {
                    radio_time: self.radio_time.load(Ordering::Relaxed),
                    host_time: self.host_time.load(Ordering::Relaxed),
                    valid: self.valid.load(Ordering::Relaxed),
                };
                fence(Ordering::Acquire);
                if self.seq.load(Ordering::Relaxed) == before {
                    return anchor;
                }
            }
            spin_loop();
        }
    }

    /// Whether a capture has established the anchor.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.anchor().valid
    }

    /// Convert a radio TSF value to host nanoseconds.
    ///
    /// # Errors
    /// Returns [`TsfError::AnchorNotReady`] before the first capture.
    pub fn radio_to_host(&self, radio_time: u64) -> Result<u64> {
        let anchor = self.valid_anchor()?;
        let ticks = radio_time.wrapping_sub(anchor.radio_time);
        Ok(anchor
            .host_time
            .wrapping_add(ticks.wrapping_mul(self.tick_nanos)))
    }

    /// Convert host nanoseconds to a radio TSF value.
    ///
    /// Rounds toward the earlier tick, so converting the result back lands
    /// within one tick below `host_time`.
    ///
    /// # Errors
    /// Returns [`TsfError::AnchorNotReady`] before the first capture.
    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        reason = "Two's-complement reinterpretation of a modulo-2^64 difference"
    )]
    pub fn host_to_radio(&self, host_time: u64) -> Result<u64> {
        let anchor = self.valid_anchor()?;
        let elapsed = host_time.wrapping_sub(anchor.host_time) as i64;
        let tick = i64::try_from(self.tick_nanos).unwrap_or(i64::MAX);
        let ticks = elapsed.div_euclid(tick);
        Ok(anchor.radio_time.wrapping_add(ticks as u64))
    }

    fn valid_anchor(&self) -> Result<TsfAnchor> {
        let anchor = self.anchor();
        if anchor.valid {
            Ok(anchor)
        } else {
            Err(TsfError::AnchorNotReady)
        }
    }

    fn store(&self, anchor: TsfAnchor) {
        // Claim the even -> odd transition; concurrent writers wait their turn.
        let mut seq = self.seq.load(Ordering::Relaxed);
        loop {
            if seq & 1 == 1 {
                spin_loop();
                seq = self.seq.load(Ordering::Relaxed);
                continue;
            }
            match self.seq.compare_exchange_weak(
                seq,
                seq.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => seq = current,
            }
        }
        fence(Ordering::Release);

        self.radio_time.store(anchor.radio_time, Ordering::Relaxed);
        self.host_time.store(anchor.host_time, Ordering::Relaxed);
        self.valid.store(anchor.valid, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }
}

impl Default for ClockTranslator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TICK_NANOS)
    }
}

impl std::fmt::Debug for ClockTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockTranslator")
            .field("tick_nanos", &self.tick_nanos)
            .field("anchor", &self.anchor())
            .finish_non_exhaustive()
    }
}
