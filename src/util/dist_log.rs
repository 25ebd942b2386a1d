//! Rank-aware logging handle.
//!
//! Messages that every rank would emit identically go through [`RankLogger`],
//! which forwards them to the `log` facade on rank 0 only.

use crate::algs::communicator::Communicator;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RankLogger {
    rank: usize,
    size: usize,
}

impl RankLogger {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }

    pub fn for_comm<C: Communicator>(comm: &C) -> Self {
        Self::new(comm.rank(), comm.size())
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.rank == 0
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.is_master() {
            log::info!("{}", msg.as_ref());
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.is_master() {
            log::warn!("{}", msg.as_ref());
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        if self.is_master() {
            log::error!("{}", msg.as_ref());
        }
    }

    /// Per-rank message, tagged with the rank.
    pub fn debug_all(&self, msg: impl AsRef<str>) {
        log::debug!("[{}/{}] {}", self.rank, self.size, msg.as_ref());
    }
}
