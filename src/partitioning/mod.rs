//! Graph partitioners for the automatic partitioning strategies.
//!
//! Each [`Partitioner`] maps a dual graph and a process count to a
//! [`RankAssignment`]. [`synchronized_partition`] runs one on rank 0 and
//! distributes the outcome, so every rank takes the same branch afterwards.

pub mod dual_graph;
pub mod fallback;
#[cfg(feature = "metis-support")]
pub mod metis;

pub use dual_graph::dual_graph;

use crate::adjacency::Graph;
use crate::algs::communicator::Communicator;
use crate::algs::wire::{broadcast_bytes, decode_indices, encode_indices};
use crate::mesh_error::MeshGateError;

/// Element-to-rank map of one partitioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankAssignment {
    rank_at_elem: Vec<usize>,
    num_ranks: usize,
}

impl RankAssignment {
    pub fn new(rank_at_elem: Vec<usize>, num_ranks: usize) -> Self {
        assert!(
            rank_at_elem.iter().all(|&r| r < num_ranks),
            "element assigned to a rank >= {num_ranks}"
        );
        Self {
            rank_at_elem,
            num_ranks,
        }
    }

    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    pub fn num_elements(&self) -> usize {
        self.rank_at_elem.len()
    }

    pub fn rank_at_elem(&self) -> &[usize] {
        &self.rank_at_elem
    }

    /// rank → elements, elements ascending.
    pub fn elems_at_rank(&self) -> Graph {
        let mut lists = vec![Vec::new(); self.num_ranks];
        for (e, &r) in self.rank_at_elem.iter().enumerate() {
            lists[r].push(e);
        }
        Graph::from_lists(self.rank_at_elem.len(), lists)
    }

    pub fn has_empty_rank(&self) -> bool {
        let mut seen = vec![false; self.num_ranks];
        for &r in &self.rank_at_elem {
            seen[r] = true;
        }
        seen.contains(&false)
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_indices(&self.rank_at_elem)
    }

    pub fn decode(bytes: &[u8], num_ranks: usize, num_elems: usize) -> Result<Self, MeshGateError> {
        if bytes.len() != 8 * num_elems {
            return Err(MeshGateError::PartitionerFailed {
                strategy: "broadcast".into(),
                reason: format!("expected {} bytes, got {}", 8 * num_elems, bytes.len()),
            });
        }
        let rank_at_elem = decode_indices(bytes);
        if let Some(&r) = rank_at_elem.iter().find(|&&r| r >= num_ranks) {
            return Err(MeshGateError::PartitionerFailed {
                strategy: "broadcast".into(),
                reason: format!("rank {r} out of range"),
            });
        }
        Ok(Self {
            rank_at_elem,
            num_ranks,
        })
    }
}

/// The automatic partitioners, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partitioner {
    Metis,
    Fallback,
}

impl Partitioner {
    pub fn name(self) -> &'static str {
        match self {
            Partitioner::Metis => "metis",
            Partitioner::Fallback => "fallback",
        }
    }

    /// Whether this build can run the partitioner at all.
    pub fn is_available(self) -> bool {
        match self {
            Partitioner::Metis => cfg!(feature = "metis-support"),
            Partitioner::Fallback => true,
        }
    }

    /// `None` when the partitioner is unavailable or gives up.
    pub fn compute_partition(self, graph: &Graph, nparts: usize) -> Option<RankAssignment> {
        match self {
            #[cfg(feature = "metis-support")]
            Partitioner::Metis => metis::partition(graph, nparts),
            #[cfg(not(feature = "metis-support"))]
            Partitioner::Metis => {
                log::debug!("built without metis-support; skipping METIS for {nparts} parts");
                let _ = graph;
                None
            }
            Partitioner::Fallback => fallback::partition(graph, nparts),
        }
    }
}

/// Rank 0 partitions `graph` into `comm.size()` parts and broadcasts the result.
///
/// A failure, or an assignment that leaves a rank empty, is reported on every
/// rank as `PartitionerFailed`.
pub fn synchronized_partition<C: Communicator>(
    comm: &C,
    partitioner: Partitioner,
    graph: &Graph,
) -> Result<RankAssignment, MeshGateError> {
    let nparts = comm.size();
    let fail = |reason: &str| MeshGateError::PartitionerFailed {
        strategy: partitioner.name().into(),
        reason: reason.into(),
    };
    let mine = (comm.rank() == 0).then(|| match partitioner.compute_partition(graph, nparts) {
        Some(a) if !a.has_empty_rank() => {
            let mut bytes = vec![1u8];
            bytes.extend(a.encode());
            bytes
        }
        Some(_) => vec![2u8],
        None => vec![0u8],
    });
    let bytes = broadcast_bytes(comm, 0, mine);
    match bytes.split_first() {
        Some((1, rest)) => RankAssignment::decode(rest, nparts, graph.num_domain()),
        Some((2, _)) => Err(fail("a rank received no elements")),
        _ => Err(fail("no partition produced")),
    }
}
