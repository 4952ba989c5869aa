//! Per-packet TX/RX timestamping.
//!
//! Runs on the data path: no locks, no allocation, never blocks. A failed
//! annotation leaves the packet untouched and the caller forwards it anyway.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::translator::ClockTranslator;
use crate::error::{Result, TsfError};
use crate::types::SyncOptions;

/// Host-domain timestamp derived for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PacketTimestamp {
    /// Host time in nanoseconds since the Unix epoch.
    pub host_time: u64,
    /// Raw radio ticks, recorded when the RAW option is set.
    pub radio_time: Option<u64>,
}

impl PacketTimestamp {
    /// Host time as a duration since the Unix epoch.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.host_time)
    }
}

/// Packet types that can carry a hardware timestamp.
pub trait Timestamped {
    /// Attach the derived timestamp.
    fn set_timestamp(&mut self, timestamp: PacketTimestamp);
}

/// Packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Transmitted packet.
    Tx,
    /// Received packet.
    Rx,
}

/// Applies the clock translation to individual packets.
#[derive(Debug, Clone)]
pub struct PacketAnnotator {
    translator: Arc<ClockTranslator>,
    options: SyncOptions,
}

impl PacketAnnotator {
    /// Create an annotator reading `translator`.
    #[must_use]
    pub fn new(translator: Arc<ClockTranslator>, options: SyncOptions) -> Self {
        Self {
            translator,
            options,
        }
    }

    /// Whether `direction` is timestamped at all.
    #[must_use]
    pub fn enabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::Tx => self.options.tx(),
            Direction::Rx => self.options.rx(),
        }
    }

    /// Timestamp an outgoing packet sent at radio time `target_time`.
    ///
    /// # Errors
    /// - [`TsfError::Unsupported`] if TX timestamping is off.
    /// - [`TsfError::AnchorNotReady`] before the first capture.
    pub fn annotate_tx<P>(&self, packet: &mut P, target_time: u64) -> Result<PacketTimestamp>
    where
        P: Timestamped + ?Sized,
    {
        self.annotate(Direction::Tx, packet, target_time)
    }

    /// Timestamp a received packet captured at radio time `target_time`.
    ///
    /// # Errors
    /// - [`TsfError::Unsupported`] if RX timestamping is off.
    /// - [`TsfError::AnchorNotReady`] before the first capture.
    pub fn annotate_rx<P>(&self, packet: &mut P, target_time: u64) -> Result<PacketTimestamp>
    where
        P: Timestamped + ?Sized,
    {
        self.annotate(Direction::Rx, packet, target_time)
    }

    fn annotate<P>(
        &self,
        direction: Direction,
        packet: &mut P,
        target_time: u64,
    ) -> Result<PacketTimestamp>
    where
        P: Timestamped + ?Sized,
    {
        if !self.enabled(direction) {
            return Err(TsfError::Unsupported);
        }
        let host_time = self.translator.radio_to_host(target_time)?;
        let timestamp = PacketTimestamp {
            host_time,
            radio_time: self.options.raw().then_some(target_time),
        };
        packet.set_timestamp(timestamp);
        Ok(timestamp)
    }
}
