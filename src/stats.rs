//! Relay statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of relay activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames pulled from the source across all producer runs
    pub frames_produced: u64,
    /// Frames pushed out of full consumer buffers before being read
    pub frames_dropped: u64,
    /// `notify_all` passes issued
    pub broadcasts: u64,
    /// Consumers evicted as stale
    pub evictions: u64,
    /// Producer runs started
    pub producer_starts: u64,
    /// Currently registered consumers
    pub consumers: usize,
    /// Whether a producer is running
    pub running: bool,
}

/// Live counters updated by the producer
#[derive(Debug, Default)]
pub(crate) struct RelayCounters {
    frames_produced: AtomicU64,
    frames_dropped: AtomicU64,
    broadcasts: AtomicU64,
    evictions: AtomicU64,
    producer_starts: AtomicU64,
}

impl RelayCounters {
    pub(crate) fn frame_produced(&self, dropped: usize) {
        self.frames_produced.fetch_add(1, Ordering::Relaxed);
        self.frames_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn broadcast(&self, evicted: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub(crate) fn producer_started(&self) {
        self.producer_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, consumers: usize, running: bool) -> RelayStats {
        RelayStats {
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            producer_starts: self.producer_starts.load(Ordering::Relaxed),
            consumers,
            running,
        }
    }
}
