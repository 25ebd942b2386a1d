//! A mesh together with its named parts, halos and patches.

use super::atlas::{AdaptMode, MeshAtlas};
use super::mesh::QuadMesh;
use super::mesh_part::MeshPart;
use crate::adjacency::Graph;
use crate::mesh_error::MeshGateError;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Root of a mesh tree: one mesh plus everything that refines with it.
///
/// Halos are keyed by neighbour rank and list the entities shared with that
/// rank, ordered by their index on the mesh the patch was cut from, so both
/// sides of a halo enumerate it identically. Patches are keyed by rank and list
/// the part of this mesh that forms that rank's patch, in the patch's own order.
#[derive(Debug, Clone)]
pub struct RootMeshNode {
    mesh: QuadMesh,
    atlas: Arc<MeshAtlas>,
    parts: BTreeMap<String, MeshPart>,
    halos: BTreeMap<usize, MeshPart>,
    patches: BTreeMap<usize, MeshPart>,
}

/// A rank's patch as cut out of a partitioned mesh.
#[derive(Debug, Clone)]
pub struct PatchExtraction {
    pub node: RootMeshNode,
    /// Ranks sharing at least one vertex with the patch, ascending.
    pub neighbour_ranks: Vec<usize>,
}

impl RootMeshNode {
    pub fn new(mesh: QuadMesh, atlas: Arc<MeshAtlas>) -> Self {
        Self {
            mesh,
            atlas,
            parts: BTreeMap::new(),
            halos: BTreeMap::new(),
            patches: BTreeMap::new(),
        }
    }

    /// The unit square with its boundary as mesh part `bnd`.
    pub fn unit_square() -> Self {
        let mut node = Self::new(QuadMesh::unit_square(), Arc::new(MeshAtlas::new()));
        node.parts
            .insert("bnd".into(), MeshPart::new(vec![0, 1, 2, 3], vec![0, 1, 2, 3], vec![]));
        node
    }

    pub fn mesh(&self) -> &QuadMesh {
        &self.mesh
    }

    pub fn atlas(&self) -> &Arc<MeshAtlas> {
        &self.atlas
    }

    /// Add a named part; it must fit the mesh and name a known chart if any.
    pub fn add_mesh_part(&mut self, name: impl Into<String>, part: MeshPart) -> Result<(), MeshGateError> {
        let name = name.into();
        part.validate(&self.mesh)?;
        if let Some(chart) = &part.chart {
            if self.atlas.find_chart(chart).is_none() {
                return Err(MeshGateError::MissingMeshPart(format!(
                    "mesh part '{name}' refers to unknown chart '{chart}'"
                )));
            }
        }
        if self.parts.contains_key(&name) {
            return Err(MeshGateError::InvalidTopology(format!(
                "mesh part '{name}' defined twice"
            )));
        }
        self.parts.insert(name, part);
        Ok(())
    }

    pub fn find_mesh_part(&self, name: &str) -> Option<&MeshPart> {
        self.parts.get(name)
    }

    pub fn mesh_part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn add_halo(&mut self, rank: usize, part: MeshPart) {
        self.halos.insert(rank, part);
    }

    pub fn halo(&self, rank: usize) -> Option<&MeshPart> {
        self.halos.get(&rank)
    }

    pub fn halos(&self) -> &BTreeMap<usize, MeshPart> {
        &self.halos
    }

    pub fn clear_halos(&mut self) {
        self.halos.clear();
    }

    /// Re-key halos through `ranks`; halos without an entry keep their rank.
    pub fn rename_halos(&mut self, ranks: &BTreeMap<usize, usize>) {
        let old = std::mem::take(&mut self.halos);
        for (rank, part) in old {
            let to = ranks.get(&rank).copied().unwrap_or(rank);
            self.halos.insert(to, part);
        }
    }

    pub fn add_patch(&mut self, rank: usize, part: MeshPart) {
        self.patches.insert(rank, part);
    }

    pub fn patch(&self, rank: usize) -> Option<&MeshPart> {
        self.patches.get(&rank)
    }

    pub fn patches(&self) -> &BTreeMap<usize, MeshPart> {
        &self.patches
    }

    pub fn clear_patches(&mut self) {
        self.patches.clear();
    }

    /// Project every chart-bound part onto its chart.
    pub fn adapt(&mut self) {
        for part in self.parts.values() {
            let Some(chart) = part.chart.as_deref().and_then(|c| self.atlas.find_chart(c)) else {
                continue;
            };
            for &v in &part.vertices {
                let p = self.mesh.vertex(v);
                *self.mesh.vertex_mut(v) = chart.project(p);
            }
        }
    }

    /// Refine the mesh and every part, halo and patch once.
    pub fn refine(&self, adapt_mode: AdaptMode) -> RootMeshNode {
        let refine_map = |m: &BTreeMap<usize, MeshPart>| {
            m.iter()
                .map(|(&r, p)| (r, p.refine(&self.mesh)))
                .collect::<BTreeMap<_, _>>()
        };
        let mut fine = RootMeshNode {
            mesh: self.mesh.refine(),
            atlas: self.atlas.clone(),
            parts: self
                .parts
                .iter()
                .map(|(n, p)| (n.clone(), p.refine(&self.mesh)))
                .collect(),
            halos: refine_map(&self.halos),
            patches: refine_map(&self.patches),
        };
        if adapt_mode == AdaptMode::Chart {
            fine.adapt();
        }
        fine
    }

    fn check_partition(&self, elems_at_rank: &Graph, rank: usize) -> Result<Vec<usize>, MeshGateError> {
        if elems_at_rank.num_image() != self.mesh.num_cells() {
            return Err(MeshGateError::InvalidTopology(format!(
                "partition covers {} elements, mesh has {}",
                elems_at_rank.num_image(),
                self.mesh.num_cells()
            )));
        }
        if rank >= elems_at_rank.num_domain() {
            return Err(MeshGateError::InvalidTopology(format!(
                "rank {rank} outside a partition for {} ranks",
                elems_at_rank.num_domain()
            )));
        }
        let mut cells = elems_at_rank.image(rank).to_vec();
        cells.sort_unstable();
        cells.dedup();
        if cells.is_empty() {
            return Err(MeshGateError::InvalidTopology(format!(
                "rank {rank} received an empty patch"
            )));
        }
        Ok(cells)
    }

    /// Record the patch of `rank` as a patch part of this mesh.
    pub fn create_patch_meshpart(&mut self, elems_at_rank: &Graph, rank: usize) -> Result<(), MeshGateError> {
        let cells = self.check_partition(elems_at_rank, rank)?;
        let part = MeshPart::from_cells(&self.mesh, cells);
        self.patches.insert(rank, part);
        Ok(())
    }

    /// Patch parts for every rank of the partition.
    pub fn create_patch_meshparts(&mut self, elems_at_rank: &Graph) -> Result<(), MeshGateError> {
        (0..elems_at_rank.num_domain()).try_for_each(|r| self.create_patch_meshpart(elems_at_rank, r))
    }

    /// Cut out the patch of `rank`.
    ///
    /// Patch-local entities are numbered by first visit over the rank's cells in
    /// ascending order; edges keep their orientation. Named parts are restricted
    /// to the patch, and one halo per neighbour rank is attached. The patch part
    /// is also recorded on `self`.
    pub fn extract_patch(&mut self, elems_at_rank: &Graph, rank: usize) -> Result<PatchExtraction, MeshGateError> {
        let cells = self.check_partition(elems_at_rank, rank)?;
        let ranks_at_elem = elems_at_rank.transpose();

        let elems_at_vert = self.mesh.verts_at_elem().transpose();
        let ranks_at_vert = Graph::compose_injectify(&elems_at_vert, &ranks_at_elem);
        let elems_at_edge = self.mesh.edges_at_elem().transpose();
        let ranks_at_edge = Graph::compose_injectify(&elems_at_edge, &ranks_at_elem);

        let part = MeshPart::from_cells(&self.mesh, cells);
        let mut neighbour_ranks: Vec<usize> = part
            .vertices
            .iter()
            .flat_map(|&v| ranks_at_vert.image(v).iter().copied())
            .filter(|&r| r != rank)
            .collect();
        neighbour_ranks.sort_unstable();
        neighbour_ranks.dedup();

        let index_map = |list: &[usize]| -> HashMap<usize, usize> {
            list.iter().enumerate().map(|(l, &g)| (g, l)).collect()
        };
        let vmap = index_map(&part.vertices);
        let emap = index_map(&part.edges);
        let cmap = index_map(&part.cells);

        let coords = part.vertices.iter().map(|&v| self.mesh.vertex(v)).collect();
        let edges = part
            .edges
            .iter()
            .map(|&e| self.mesh.edge(e).map(|v| vmap[&v]))
            .collect();
        let local_cells = part
            .cells
            .iter()
            .map(|&c| self.mesh.cell(c).map(|v| vmap[&v]))
            .collect();
        let mesh = QuadMesh::from_parts(coords, edges, local_cells)?;

        let mut node = RootMeshNode::new(mesh, self.atlas.clone());
        for (name, p) in &self.parts {
            node.parts.insert(name.clone(), p.restrict(&vmap, &emap, &cmap));
        }
        for &r in &neighbour_ranks {
            let shared = |list: &[usize], ranks_at: &Graph| -> Vec<usize> {
                let mut globals: Vec<usize> = list
                    .iter()
                    .copied()
                    .filter(|&g| ranks_at.image(g).contains(&r))
                    .collect();
                globals.sort_unstable();
                globals
            };
            let halo_v = shared(&part.vertices, &ranks_at_vert);
            let halo_e = shared(&part.edges, &ranks_at_edge);
            node.halos.insert(
                r,
                MeshPart::new(
                    halo_v.iter().map(|v| vmap[v]).collect(),
                    halo_e.iter().map(|e| emap[e]).collect(),
                    Vec::new(),
                ),
            );
        }
        log::debug!(
            "rank {rank}: patch with {} cells, neighbours {:?}",
            part.cells.len(),
            neighbour_ranks
        );
        self.patches.insert(rank, part);
        Ok(PatchExtraction {
            node,
            neighbour_ranks,
        })
    }
}
