//! Mesh levels and communicator layers of a domain hierarchy.

use crate::algs::communicator::Communicator;
use crate::geometry::{MeshPart, QuadMesh, RootMeshNode};
use std::sync::Arc;

/// One refinement level of a rank's patch.
#[derive(Debug, Clone)]
pub struct DomainLevel {
    level_index: usize,
    mesh_node: RootMeshNode,
    base_mesh_node: Option<RootMeshNode>,
}

impl DomainLevel {
    pub fn new(level_index: usize, mesh_node: RootMeshNode) -> Self {
        Self {
            level_index,
            mesh_node,
            base_mesh_node: None,
        }
    }

    /// Attach the unpartitioned base mesh refined to the same level.
    pub fn with_base_mesh_node(mut self, base: RootMeshNode) -> Self {
        self.base_mesh_node = Some(base);
        self
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn mesh_node(&self) -> &RootMeshNode {
        &self.mesh_node
    }

    pub fn mesh(&self) -> &QuadMesh {
        self.mesh_node.mesh()
    }

    pub fn base_mesh_node(&self) -> Option<&RootMeshNode> {
        self.base_mesh_node.as_ref()
    }

    pub fn find_halo_part(&self, rank: usize) -> Option<&MeshPart> {
        self.mesh_node.halo(rank)
    }

    pub fn find_patch_part(&self, rank: usize) -> Option<&MeshPart> {
        self.mesh_node.patch(rank)
    }
}

/// One communicator layer: the ranks that share the levels of this layer.
///
/// A layer whose ranks are grouped into sibling communicators is a child
/// layer; within each group the rank `parent_rank` represents the group on
/// the next coarser layer.
pub struct DomainLayer<C: Communicator> {
    comm: Arc<C>,
    layer_index: usize,
    neighbour_ranks: Vec<usize>,
    sibling_comm: Option<Arc<C>>,
    parent_rank: usize,
}

impl<C: Communicator> DomainLayer<C> {
    pub fn new(comm: Arc<C>, layer_index: usize) -> Self {
        Self {
            comm,
            layer_index,
            neighbour_ranks: Vec::new(),
            sibling_comm: None,
            parent_rank: 0,
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn comm_arc(&self) -> &Arc<C> {
        &self.comm
    }

    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    pub fn neighbour_ranks(&self) -> &[usize] {
        &self.neighbour_ranks
    }

    pub fn set_neighbour_ranks(&mut self, ranks: Vec<usize>) {
        self.neighbour_ranks = ranks;
    }

    pub fn set_parent(&mut self, sibling_comm: Arc<C>, parent_rank: usize) {
        assert!(parent_rank < sibling_comm.size(), "parent rank outside the sibling group");
        self.sibling_comm = Some(sibling_comm);
        self.parent_rank = parent_rank;
    }

    pub fn sibling_comm(&self) -> Option<&Arc<C>> {
        self.sibling_comm.as_ref()
    }

    pub fn parent_rank(&self) -> usize {
        self.parent_rank
    }

    pub fn is_child(&self) -> bool {
        self.sibling_comm.is_some()
    }

    pub fn is_parent(&self) -> bool {
        self.sibling_comm
            .as_ref()
            .is_some_and(|s| s.rank() == self.parent_rank)
    }
}

impl<C: Communicator> std::fmt::Debug for DomainLayer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainLayer")
            .field("layer_index", &self.layer_index)
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("neighbour_ranks", &self.neighbour_ranks)
            .field("is_child", &self.is_child())
            .field("is_parent", &self.is_parent())
            .finish()
    }
}
