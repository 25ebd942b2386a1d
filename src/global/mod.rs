//! Distributed consistency layer: gates, exchange tickets, matrix synchronisation,
//! muxers and splitters.

pub mod gate;
pub mod muxer;
pub mod splitter;
pub mod synch_mat;
pub mod synch_scal;
pub mod synch_vec;
pub mod vector;

pub use gate::Gate;
pub use muxer::Muxer;
pub use splitter::Splitter;
pub use synch_mat::SynchMatrix;
pub use synch_scal::SynchScalarTicket;
pub use synch_vec::SynchVectorTicket;
pub use vector::GlobalVector;
