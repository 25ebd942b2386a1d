#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-gate
//!
//! mesh-gate keeps distributed finite-element vectors and matrices consistent
//! across processes and builds the partitioned mesh hierarchies they live on.
//!
//! ## Features
//! - [`Gate`](global::Gate): frequency weighting, type-0/type-1 conversion,
//!   halo exchange and global reductions, blocking or through tickets
//! - [`SynchMatrix`](global::SynchMatrix): assembly of halo couplings of a
//!   type-0 matrix into a type-1 matrix
//! - [`Muxer`](global::Muxer) and [`Splitter`](global::Splitter): transfer
//!   between sibling ranks and their parent, and to one base-mesh vector
//! - [`PartiDomainControl`](control::PartiDomainControl): mesh files, manual
//!   partitions, METIS or a built-in fallback partitioner
//! - [`HierarchUnitCubeDomainControl`](control::HierarchUnitCubeDomainControl):
//!   unit-square hierarchies over shrinking communicator layers
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-gate = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "metis-support", "rayon"]
//! ```
//!
//! Every multi-rank routine is collective: all ranks of the communicator must
//! call it in the same order. [`LocalUniverse`](algs::LocalUniverse) runs such
//! code on threads, one per rank, which is how the tests exercise it.

pub mod adjacency;
pub mod algs;
pub mod control;
pub mod geometry;
pub mod global;
pub mod lafem;
pub mod mesh_error;
pub mod partitioning;
pub mod util;

pub use mesh_error::MeshGateError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::adjacency::Graph;
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, LocalUniverse, NoComm, ReduceOp};
    pub use crate::control::system::{
        assemble_layer_muxer, assemble_vertex_gate, assemble_vertex_matrix, assemble_vertex_splitter,
    };
    pub use crate::control::{
        DomainControl, DomainLayer, DomainLevel, HierarchUnitCubeDomainControl, PartiConfig, PartiDomainControl,
        PartiStrategy, UnitCubeDomainControl, VirtualLevel,
    };
    pub use crate::geometry::{AdaptMode, MeshFileReader, MeshPart, QuadMesh, RootMeshNode};
    pub use crate::global::{Gate, GlobalVector, Muxer, Splitter, SynchMatrix};
    pub use crate::lafem::{CloneMode, CsrMatrix, DenseVector, Scalar, VectorMirror};
    pub use crate::mesh_error::MeshGateError;
    pub use crate::util::{RankLogger, SyncStatistics};
}
