//! Dual graph of a mesh.
//
// Each cell is a node; two cells are adjacent if they share at least one
// vertex. The result is symmetric, self-free and has sorted adjacency lists,
// so it can be handed to METIS as is.

use crate::adjacency::Graph;
use crate::geometry::QuadMesh;

pub fn dual_graph(mesh: &QuadMesh) -> Graph {
    let verts_at_elem = mesh.verts_at_elem();
    let elems_at_vert = verts_at_elem.transpose();
    let neighbours = Graph::compose_injectify(&verts_at_elem, &elems_at_vert);
    let lists = (0..neighbours.num_domain()).map(|c| {
        let mut l: Vec<usize> = neighbours.image(c).iter().copied().filter(|&d| d != c).collect();
        l.sort_unstable();
        l
    });
    Graph::from_lists(mesh.num_cells(), lists)
}
