//! Sync-layer objects built from domain levels.
//!
//! Everything here works on vertex DOFs (one value per mesh vertex), which is
//! enough to drive gates, splitters and muxers from real partitioned meshes.

use super::domain::{DomainLayer, DomainLevel, VirtualLevel};
use crate::adjacency::Graph;
use crate::algs::communicator::Communicator;
use crate::global::{Gate, Muxer, Splitter};
use crate::lafem::{CsrMatrix, DenseVector, Scalar, VectorMirror};
use crate::mesh_error::MeshGateError;
use std::sync::Arc;

/// Gate over the layer's communicator with one halo-vertex mirror per
/// neighbour rank.
pub fn assemble_vertex_gate<T: Scalar, C: Communicator>(
    layer: &DomainLayer<C>,
    level: &DomainLevel,
) -> Result<Gate<T, C>, MeshGateError> {
    let nv = level.mesh().num_vertices();
    let mut gate = Gate::new(Some(layer.comm_arc().clone()));
    for &r in layer.neighbour_ranks() {
        let Some(halo) = level.find_halo_part(r) else {
            return Err(MeshGateError::MissingMeshPart(format!(
                "halo of rank {r} on level {}",
                level.level_index()
            )));
        };
        gate.push(r, VectorMirror::new(nv, halo.vertices.clone()));
    }
    gate.compile(DenseVector::new(nv));
    Ok(gate)
}

/// Splitter with rank 0 of `comm` as root.
///
/// The root needs the base mesh of the level with one patch part per rank,
/// as kept by a partitioned domain control with `keep_base_levels`.
pub fn assemble_vertex_splitter<T: Scalar, C: Communicator>(
    comm: Arc<C>,
    level: &DomainLevel,
) -> Result<Splitter<T, C>, MeshGateError> {
    let nv = level.mesh().num_vertices();
    let mut splitter = Splitter::new();
    if comm.rank() == 0 {
        let Some(base) = level.base_mesh_node() else {
            return Err(MeshGateError::MissingMeshPart(format!(
                "base mesh on level {}",
                level.level_index()
            )));
        };
        let nb = base.mesh().num_vertices();
        splitter.set_root(comm.clone(), 0, VectorMirror::make_identity(nv));
        for r in 0..comm.size() {
            let Some(patch) = base.patch(r) else {
                return Err(MeshGateError::MissingMeshPart(format!("base patch of rank {r}")));
            };
            splitter.push_patch(VectorMirror::new(nb, patch.vertices.clone()));
        }
        splitter.set_base_vector_template(DenseVector::new(nb));
    } else {
        splitter.set_root(comm, 0, VectorMirror::make_identity(nv));
    }
    splitter.compile(&DenseVector::new(nv));
    Ok(splitter)
}

/// Muxer between a child level and its parent level; `None` unless the
/// virtual level is a child.
///
/// Children send their whole vector; the parent maps child `j` onto its
/// own vector through patch part `j` of the parent level.
pub fn assemble_layer_muxer<T: Scalar, C: Communicator>(
    virt: &VirtualLevel<C>,
) -> Result<Option<Muxer<T, C>>, MeshGateError> {
    let layer = virt.layer();
    let Some(sibling) = layer.sibling_comm().filter(|_| virt.is_child()) else {
        return Ok(None);
    };
    let nv = virt.level().mesh().num_vertices();
    let mut muxer = Muxer::new();
    muxer.set_parent(sibling.clone(), layer.parent_rank(), VectorMirror::make_identity(nv));
    if let Some(level_p) = virt.level_p() {
        let np = level_p.mesh().num_vertices();
        for j in 0..sibling.size() {
            let Some(patch) = level_p.find_patch_part(j) else {
                return Err(MeshGateError::MissingMeshPart(format!(
                    "child patch {j} on parent level {}",
                    level_p.level_index()
                )));
            };
            muxer.push_child(VectorMirror::new(np, patch.vertices.clone()));
        }
    }
    Ok(Some(muxer))
}

/// Vertex-vertex matrix of the level; entry `(i, j)` counts the cells that
/// contain both vertices.
///
/// The result is a type-0 matrix: synchronising it yields the cell counts of
/// the whole domain.
pub fn assemble_vertex_matrix<T: Scalar>(level: &DomainLevel) -> CsrMatrix<T> {
    let mesh = level.mesh();
    let verts_at_elem = mesh.verts_at_elem();
    let elems_at_vert = verts_at_elem.transpose();
    let pattern = Graph::compose_injectify(&elems_at_vert, &verts_at_elem);
    let matrix = CsrMatrix::from_graph(&pattern);
    for cell in mesh.cells() {
        for &i in cell {
            for &j in cell {
                matrix.add(i, j, T::one());
            }
        }
    }
    matrix
}
