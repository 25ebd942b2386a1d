//! Communication backends and the byte-level plumbing on top of them.

pub mod communicator;
pub mod request;
pub mod wire;

pub use communicator::{Communicator, LocalComm, LocalUniverse, NoComm};
