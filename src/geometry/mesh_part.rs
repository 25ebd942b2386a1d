//! Subsets of a mesh (boundaries, halos, patches) given as target lists.

use super::mesh::QuadMesh;
use crate::mesh_error::MeshGateError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Ordered target sets into the vertices, edges and cells of one mesh.
///
/// The order of each list is part of the data: two parts that describe the same
/// entities in the same order on two ranks stay aligned through refinement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshPart {
    #[serde(default)]
    pub vertices: Vec<usize>,
    #[serde(default)]
    pub edges: Vec<usize>,
    #[serde(default)]
    pub cells: Vec<usize>,
    /// Chart the part's vertices are projected onto after refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
}

impl MeshPart {
    pub fn new(vertices: Vec<usize>, edges: Vec<usize>, cells: Vec<usize>) -> Self {
        Self {
            vertices,
            edges,
            cells,
            chart: None,
        }
    }

    pub fn with_chart(mut self, chart: impl Into<String>) -> Self {
        self.chart = Some(chart.into());
        self
    }

    /// Cells plus every vertex and edge they touch, numbered by first visit.
    pub fn from_cells(mesh: &QuadMesh, cells: Vec<usize>) -> Self {
        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        let mut seen_v = vec![false; mesh.num_vertices()];
        let mut seen_e = vec![false; mesh.num_edges()];
        for &c in &cells {
            for v in mesh.cell(c) {
                if !std::mem::replace(&mut seen_v[v], true) {
                    vertices.push(v);
                }
            }
            for e in mesh.cell_edges(c) {
                if !std::mem::replace(&mut seen_e[e], true) {
                    edges.push(e);
                }
            }
        }
        Self::new(vertices, edges, cells)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.cells.is_empty()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Check every target against the sizes of `mesh`.
    pub fn validate(&self, mesh: &QuadMesh) -> Result<(), MeshGateError> {
        let check = |what: &str, list: &[usize], n: usize| match list.iter().find(|&&i| i >= n) {
            Some(i) => Err(MeshGateError::InvalidTopology(format!(
                "mesh part {what} {i} out of range (mesh has {n})"
            ))),
            None => Ok(()),
        };
        check("vertex", &self.vertices, mesh.num_vertices())?;
        check("edge", &self.edges, mesh.num_edges())?;
        check("cell", &self.cells, mesh.num_cells())
    }

    /// The part on `coarse.refine()`, in the same order as the refined mesh.
    pub fn refine(&self, coarse: &QuadMesh) -> MeshPart {
        let nv = coarse.num_vertices();
        let ne = coarse.num_edges();
        let mut vertices = Vec::with_capacity(self.vertices.len() + self.edges.len() + self.cells.len());
        vertices.extend_from_slice(&self.vertices);
        vertices.extend(self.edges.iter().map(|&e| nv + e));
        vertices.extend(self.cells.iter().map(|&c| nv + ne + c));

        let mut edges = Vec::with_capacity(2 * self.edges.len() + 4 * self.cells.len());
        for &e in &self.edges {
            edges.push(QuadMesh::child_half_edge(e, 0));
            edges.push(QuadMesh::child_half_edge(e, 1));
        }
        for &c in &self.cells {
            edges.extend((0..4).map(|k| 2 * ne + 4 * c + k));
        }

        let cells = self
            .cells
            .iter()
            .flat_map(|&c| (0..4).map(move |j| QuadMesh::child_cell(c, j)))
            .collect();
        MeshPart {
            vertices,
            edges,
            cells,
            chart: self.chart.clone(),
        }
    }

    /// Keep the targets that have an image under the given maps, in part order.
    pub fn restrict(
        &self,
        vert_map: &HashMap<usize, usize>,
        edge_map: &HashMap<usize, usize>,
        cell_map: &HashMap<usize, usize>,
    ) -> MeshPart {
        let apply = |list: &[usize], map: &HashMap<usize, usize>| -> Vec<usize> {
            list.iter().filter_map(|i| map.get(i).copied()).collect()
        };
        MeshPart {
            vertices: apply(&self.vertices, vert_map),
            edges: apply(&self.edges, edge_map),
            cells: apply(&self.cells, cell_map),
            chart: self.chart.clone(),
        }
    }
}
