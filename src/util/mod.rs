//! Process-level helpers: rank-0 logging, statistics, collective file access, abort.

pub mod dist_file_io;
pub mod dist_log;
pub mod runtime;
pub mod statistics;

pub use dist_log::RankLogger;
pub use statistics::SyncStatistics;
