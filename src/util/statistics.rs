//! Communication counters shared by the gates and tickets of one run.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SyncStatistics {
    vector_syncs: AtomicU64,
    scalar_reductions: AtomicU64,
    matrix_syncs: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of [`SyncStatistics`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub vector_syncs: u64,
    pub scalar_reductions: u64,
    pub matrix_syncs: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl SyncStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_vector_sync(&self, sent: usize, received: usize) {
        self.vector_syncs.fetch_add(1, Ordering::Relaxed);
        self.add_bytes(sent, received);
    }

    pub fn record_matrix_sync(&self, sent: usize, received: usize) {
        self.matrix_syncs.fetch_add(1, Ordering::Relaxed);
        self.add_bytes(sent, received);
    }

    pub fn record_reduction(&self) {
        self.scalar_reductions.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes(&self, sent: usize, received: usize) {
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(received as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            vector_syncs: self.vector_syncs.load(Ordering::Relaxed),
            scalar_reductions: self.scalar_reductions.load(Ordering::Relaxed),
            matrix_syncs: self.matrix_syncs.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.vector_syncs,
            &self.scalar_reductions,
            &self.matrix_syncs,
            &self.bytes_sent,
            &self.bytes_received,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let s = SyncStatistics::new();
        s.record_vector_sync(16, 8);
        s.record_vector_sync(16, 8);
        s.record_reduction();
        let snap = s.snapshot();
        assert_eq!(snap.vector_syncs, 2);
        assert_eq!(snap.bytes_sent, 32);
        assert_eq!(snap.bytes_received, 16);
        assert_eq!(snap.scalar_reductions, 1);
        s.reset();
        assert_eq!(s.snapshot(), StatisticsSnapshot::default());
    }
}
