//! Synthetic patches of the unit square for power-of-4 process counts.

use super::atlas::AdaptMode;
use super::mesh_node::{PatchExtraction, RootMeshNode};
use crate::adjacency::Graph;
use crate::mesh_error::MeshGateError;

/// `log4(n)` if `n` is a power of 4.
pub fn ilog4(n: usize) -> Option<u32> {
    (n.is_power_of_two() && n.trailing_zeros() % 2 == 0).then(|| n.trailing_zeros() / 2)
}

/// A rank's piece of the unit square.
#[derive(Debug, Clone)]
pub struct UnitCubePatch {
    pub node: RootMeshNode,
    /// Lexicographic ranks of the neighbouring patches, ascending.
    pub neighbour_ranks: Vec<usize>,
    /// Refinement level of the unit square the patch was cut from.
    pub level: usize,
}

pub struct UnitCubePatchGenerator;

impl UnitCubePatchGenerator {
    /// Patch of lexicographic `rank` out of `nprocs = 4^k` ranks.
    ///
    /// The unit square is refined `k` times into a `2^k x 2^k` grid and cell
    /// `(ix, iy)` goes to rank `iy * 2^k + ix`, so every rank gets one cell.
    pub fn create(rank: usize, nprocs: usize) -> Result<UnitCubePatch, MeshGateError> {
        let Some(level) = ilog4(nprocs) else {
            return Err(MeshGateError::InvalidProcessCount {
                size: nprocs,
                reason: "unit cube patches need a power of 4".into(),
            });
        };
        if rank >= nprocs {
            return Err(MeshGateError::InvalidArgument(format!(
                "rank {rank} out of range for {nprocs} processes"
            )));
        }
        let level = level as usize;
        let mut base = RootMeshNode::unit_square();
        for _ in 0..level {
            base = base.refine(AdaptMode::None);
        }
        let m = 1usize << level;
        let mesh = base.mesh();
        let mut lists = vec![Vec::new(); nprocs];
        for c in 0..mesh.num_cells() {
            let [x, y] = mesh.centroid(c);
            let ix = ((x * m as f64) as usize).min(m - 1);
            let iy = ((y * m as f64) as usize).min(m - 1);
            lists[iy * m + ix].push(c);
        }
        let elems_at_rank = Graph::from_lists(mesh.num_cells(), lists);
        let PatchExtraction {
            node,
            neighbour_ranks,
        } = base.extract_patch(&elems_at_rank, rank)?;
        Ok(UnitCubePatch {
            node,
            neighbour_ranks,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilog4_accepts_powers_of_four_only() {
        assert_eq!(ilog4(1), Some(0));
        assert_eq!(ilog4(4), Some(1));
        assert_eq!(ilog4(64), Some(3));
        assert_eq!(ilog4(0), None);
        assert_eq!(ilog4(2), None);
        assert_eq!(ilog4(8), None);
        assert_eq!(ilog4(12), None);
    }

    #[test]
    fn sixteen_ranks() {
        // interior rank 5 = (1, 1) touches all 8 surrounding cells
        let p = UnitCubePatchGenerator::create(5, 16).unwrap();
        assert_eq!(p.level, 2);
        assert_eq!(p.node.mesh().num_cells(), 1);
        assert_eq!(p.neighbour_ranks, vec![0, 1, 2, 4, 6, 8, 9, 10]);
        let [x, y] = p.node.mesh().centroid(0);
        assert_eq!((x, y), (0.375, 0.375));
        // corner rank
        let q = UnitCubePatchGenerator::create(0, 16).unwrap();
        assert_eq!(q.neighbour_ranks, vec![1, 4, 5]);
        assert_eq!(q.node.halo(5).unwrap().num_vertices(), 1);
        assert_eq!(q.node.halo(1).unwrap().num_edges(), 1);
    }

    #[test]
    fn single_rank_owns_everything() {
        let p = UnitCubePatchGenerator::create(0, 1).unwrap();
        assert!(p.neighbour_ranks.is_empty());
        assert_eq!(p.node.mesh().num_vertices(), 4);
        assert!(p.node.find_mesh_part("bnd").is_some());
    }

    #[test]
    fn bad_process_count() {
        assert!(matches!(
            UnitCubePatchGenerator::create(0, 8),
            Err(MeshGateError::InvalidProcessCount { size: 8, .. })
        ));
    }
}
