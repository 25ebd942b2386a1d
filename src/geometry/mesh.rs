//! Conforming quadrilateral meshes and their standard 2-level refinement.
//!
//! Every quad stores its vertices in the local order `(0,0), (1,0), (0,1), (1,1)`
//! and its edges in the local order `e0 = v0v1, e1 = v2v3, e2 = v0v2, e3 = v1v3`.
//! Edges carry an orientation (`edges[e][0]` is the first vertex); refinement
//! inherits it, so two meshes cut from the same parent keep agreeing on it.

use crate::adjacency::Graph;
use crate::mesh_error::MeshGateError;
use hashbrown::HashMap;

/// Local vertices of the four local edges of a quad.
pub const LOCAL_EDGE_VERTS: [[usize; 2]; 4] = [[0, 1], [2, 3], [0, 2], [1, 3]];

/// Vertices of the 4 children of a refined quad, in the child's local order.
///
/// Index `0..4` is a parent vertex, `4 + k` the midpoint of local edge `k`,
/// `8` the cell centre.
pub const CHILD_VERTS: [[usize; 4]; 4] = [[0, 4, 6, 8], [4, 1, 8, 7], [6, 8, 2, 5], [8, 7, 5, 3]];

/// Edges of the 4 children of a refined quad, in the child's local order.
///
/// Index `2k + h` is the half of local edge `k` adjacent to its local vertex
/// `LOCAL_EDGE_VERTS[k][h]`; `8 + k` is interior edge `k`.
pub const CHILD_EDGES: [[usize; 4]; 4] = [[0, 10, 4, 8], [1, 11, 8, 6], [10, 2, 5, 9], [11, 3, 9, 7]];

/// Vertices (as `CHILD_VERTS` indices) of the 4 interior edges of a refined quad.
const INTERIOR_EDGES: [[usize; 2]; 4] = [[4, 8], [8, 5], [6, 8], [8, 7]];

#[derive(Debug, Clone, PartialEq)]
pub struct QuadMesh {
    coords: Vec<[f64; 2]>,
    edges: Vec<[usize; 2]>,
    cells: Vec<[usize; 4]>,
    cell_edges: Vec<[usize; 4]>,
}

impl QuadMesh {
    /// Build a mesh from vertex coordinates and cells; edges are numbered in
    /// first-visit order and oriented by the visiting cell.
    pub fn new(coords: Vec<[f64; 2]>, cells: Vec<[usize; 4]>) -> Result<Self, MeshGateError> {
        check_cells(coords.len(), &cells)?;
        let mut lookup: HashMap<(usize, usize), usize> = HashMap::new();
        let mut edges = Vec::new();
        let mut cell_edges = Vec::with_capacity(cells.len());
        for cell in &cells {
            let mut ce = [0; 4];
            for (k, lv) in LOCAL_EDGE_VERTS.iter().enumerate() {
                let (a, b) = (cell[lv[0]], cell[lv[1]]);
                ce[k] = *lookup.entry(edge_key(a, b)).or_insert_with(|| {
                    edges.push([a, b]);
                    edges.len() - 1
                });
            }
            cell_edges.push(ce);
        }
        Ok(Self {
            coords,
            edges,
            cells,
            cell_edges,
        })
    }

    /// Build a mesh with prescribed (oriented) edges.
    pub fn from_parts(
        coords: Vec<[f64; 2]>,
        edges: Vec<[usize; 2]>,
        cells: Vec<[usize; 4]>,
    ) -> Result<Self, MeshGateError> {
        check_cells(coords.len(), &cells)?;
        let mut lookup: HashMap<(usize, usize), usize> = HashMap::with_capacity(edges.len());
        for (e, &[a, b]) in edges.iter().enumerate() {
            if a >= coords.len() || b >= coords.len() || a == b {
                return Err(MeshGateError::InvalidTopology(format!(
                    "edge {e} has invalid vertices ({a}, {b})"
                )));
            }
            if lookup.insert(edge_key(a, b), e).is_some() {
                return Err(MeshGateError::InvalidTopology(format!(
                    "edge ({a}, {b}) given twice"
                )));
            }
        }
        let mut used = vec![false; edges.len()];
        let mut cell_edges = Vec::with_capacity(cells.len());
        for (c, cell) in cells.iter().enumerate() {
            let mut ce = [0; 4];
            for (k, lv) in LOCAL_EDGE_VERTS.iter().enumerate() {
                let (a, b) = (cell[lv[0]], cell[lv[1]]);
                let Some(&e) = lookup.get(&edge_key(a, b)) else {
                    return Err(MeshGateError::InvalidTopology(format!(
                        "cell {c}: edge ({a}, {b}) missing"
                    )));
                };
                used[e] = true;
                ce[k] = e;
            }
            cell_edges.push(ce);
        }
        if let Some(e) = used.iter().position(|u| !u) {
            return Err(MeshGateError::InvalidTopology(format!(
                "edge {e} belongs to no cell"
            )));
        }
        Ok(Self {
            coords,
            edges,
            cells,
            cell_edges,
        })
    }

    /// The unit square as a single quad.
    pub fn unit_square() -> Self {
        Self {
            coords: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            edges: vec![[0, 1], [2, 3], [0, 2], [1, 3]],
            cells: vec![[0, 1, 2, 3]],
            cell_edges: vec![[0, 1, 2, 3]],
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.coords.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn vertex(&self, v: usize) -> [f64; 2] {
        self.coords[v]
    }

    pub fn vertex_mut(&mut self, v: usize) -> &mut [f64; 2] {
        &mut self.coords[v]
    }

    pub fn coords(&self) -> &[[f64; 2]] {
        &self.coords
    }

    pub fn edge(&self, e: usize) -> [usize; 2] {
        self.edges[e]
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn cell(&self, c: usize) -> [usize; 4] {
        self.cells[c]
    }

    pub fn cells(&self) -> &[[usize; 4]] {
        &self.cells
    }

    pub fn cell_edges(&self, c: usize) -> [usize; 4] {
        self.cell_edges[c]
    }

    pub fn centroid(&self, c: usize) -> [f64; 2] {
        let cell = self.cells[c];
        let mut p = [0.0; 2];
        for v in cell {
            p[0] += 0.25 * self.coords[v][0];
            p[1] += 0.25 * self.coords[v][1];
        }
        p
    }

    /// Index of the edge joining `a` and `b` (either orientation).
    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edges
            .iter()
            .position(|&[x, y]| (x, y) == (a, b) || (x, y) == (b, a))
    }

    /// cell → vertex adjacency.
    pub fn verts_at_elem(&self) -> Graph {
        Graph::from_lists(self.num_vertices(), self.cells.iter().map(|c| c.to_vec()))
    }

    /// cell → edge adjacency.
    pub fn edges_at_elem(&self) -> Graph {
        Graph::from_lists(self.num_edges(), self.cell_edges.iter().map(|c| c.to_vec()))
    }

    /// Index of child `j` of coarse cell `c` after [`refine`](Self::refine).
    pub fn child_cell(c: usize, j: usize) -> usize {
        4 * c + j
    }

    /// Index of the half of edge `e` next to its vertex `edges[e][h]`.
    pub fn child_half_edge(e: usize, h: usize) -> usize {
        2 * e + h
    }

    /// Fine index of the half of `cell`'s local edge `k` that touches the
    /// cell's local vertex `LOCAL_EDGE_VERTS[k][h]`.
    pub fn cell_half_edge(&self, c: usize, k: usize, h: usize) -> usize {
        let e = self.cell_edges[c][k];
        let v = self.cells[c][LOCAL_EDGE_VERTS[k][h]];
        Self::child_half_edge(e, usize::from(self.edges[e][0] != v))
    }

    /// Fine vertex index of `CHILD_VERTS` entry `l` of coarse cell `c`.
    pub fn refined_cell_vertex(&self, c: usize, l: usize) -> usize {
        match l {
            0..4 => self.cells[c][l],
            4..8 => self.num_vertices() + self.cell_edges[c][l - 4],
            8 => self.num_vertices() + self.num_edges() + c,
            _ => panic!("refined quad has 9 vertices, got local index {l}"),
        }
    }

    /// Fine edge index of `CHILD_EDGES` entry `l` of coarse cell `c`.
    pub fn refined_cell_edge(&self, c: usize, l: usize) -> usize {
        match l {
            0..8 => self.cell_half_edge(c, l / 2, l % 2),
            8..12 => 2 * self.num_edges() + 4 * c + (l - 8),
            _ => panic!("refined quad has 12 edges, got local index {l}"),
        }
    }

    /// Standard refinement: every quad is split into 4.
    ///
    /// Fine vertices are the coarse vertices, then one midpoint per edge, then one
    /// centre per cell. Fine edges are two halves per coarse edge (half 0 next to
    /// `edges[e][0]`), then four interior edges per cell. Child `j` of cell `c`
    /// is fine cell `4c + j`.
    pub fn refine(&self) -> QuadMesh {
        let nv = self.num_vertices();
        let ne = self.num_edges();
        let nc = self.num_cells();

        let mut coords = Vec::with_capacity(nv + ne + nc);
        coords.extend_from_slice(&self.coords);
        coords.extend(self.edges.iter().map(|&[a, b]| {
            let (pa, pb) = (self.coords[a], self.coords[b]);
            [0.5 * (pa[0] + pb[0]), 0.5 * (pa[1] + pb[1])]
        }));
        coords.extend((0..nc).map(|c| self.centroid(c)));

        let mut edges = Vec::with_capacity(2 * ne + 4 * nc);
        for (e, &[a, b]) in self.edges.iter().enumerate() {
            edges.push([a, nv + e]);
            edges.push([nv + e, b]);
        }
        for c in 0..nc {
            for [p, q] in INTERIOR_EDGES {
                edges.push([self.refined_cell_vertex(c, p), self.refined_cell_vertex(c, q)]);
            }
        }

        let mut cells = Vec::with_capacity(4 * nc);
        let mut cell_edges = Vec::with_capacity(4 * nc);
        for c in 0..nc {
            for j in 0..4 {
                cells.push(CHILD_VERTS[j].map(|l| self.refined_cell_vertex(c, l)));
                cell_edges.push(CHILD_EDGES[j].map(|l| self.refined_cell_edge(c, l)));
            }
        }
        QuadMesh {
            coords,
            edges,
            cells,
            cell_edges,
        }
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn check_cells(num_verts: usize, cells: &[[usize; 4]]) -> Result<(), MeshGateError> {
    for (c, cell) in cells.iter().enumerate() {
        if let Some(&v) = cell.iter().find(|&&v| v >= num_verts) {
            return Err(MeshGateError::InvalidTopology(format!(
                "cell {c} references vertex {v}, mesh has {num_verts}"
            )));
        }
        for i in 0..4 {
            if cell[i + 1..].contains(&cell[i]) {
                return Err(MeshGateError::InvalidTopology(format!(
                    "cell {c} repeats vertex {}",
                    cell[i]
                )));
            }
        }
    }
    Ok(())
}
