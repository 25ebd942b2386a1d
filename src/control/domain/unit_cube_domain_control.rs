//! Synthetic unit-square domains for power-of-4 process counts, flat and
//! hierarchical.

use super::domain_control::DomainControl;
use super::domain_level::{DomainLayer, DomainLevel};
use super::clamp_levels;
use crate::algs::communicator::Communicator;
use crate::geometry::mesh::{CHILD_EDGES, CHILD_VERTS};
use crate::geometry::{AdaptMode, MeshPart, RootMeshNode, UnitCubePatchGenerator};
use crate::mesh_error::MeshGateError;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use crate::geometry::unit_cube::ilog4;

fn log4_or_err(size: usize) -> Result<u32, MeshGateError> {
    ilog4(size).ok_or_else(|| MeshGateError::InvalidProcessCount {
        size,
        reason: "number of processes must be a power of 4".into(),
    })
}

fn log4_of(size: usize) -> u32 {
    match ilog4(size) {
        Some(l) => l,
        None => panic!("{size} is not a power of 4"),
    }
}

/// Rank in 2-level (quad-tree) order → lexicographic rank on the
/// `2^k x 2^k` grid of `size = 4^k` patches.
///
/// Bit `2i` of the 2-level rank is bit `i` of the x index and bit `2i+1`
/// is bit `i` of the y index, so ranks `4g..4g+3` form a 2x2 block.
pub fn two_level_to_lexi(rank: usize, size: usize) -> usize {
    let ls = log4_of(size);
    let (mut ix, mut iy) = (0, 0);
    for i in 0..ls {
        ix |= (rank >> i) & (1 << i);
        iy |= (rank >> (i + 1)) & (1 << i);
    }
    (iy << ls) | ix
}

/// Inverse of [`two_level_to_lexi`].
pub fn lexi_to_two_level(rank: usize, size: usize) -> usize {
    let ls = log4_of(size);
    let ix = rank & ((1 << ls) - 1);
    let iy = rank >> ls;
    let mut rr = 0;
    for i in 0..ls {
        rr |= (ix & (1 << i)) << i;
        rr |= (iy & (1 << i)) << (i + 1);
    }
    rr
}

/// Single-layer unit-square domain, levels `lvl_min..=lvl_max`.
pub struct UnitCubeDomainControl<C: Communicator> {
    domain: DomainControl<C>,
}

impl<C: Communicator> UnitCubeDomainControl<C> {
    /// `lvl_min < 0` counts down from `lvl_max` (`-1` keeps only the finest
    /// level). The patch generator's level is the lower bound of the result.
    pub fn new(comm: Arc<C>, lvl_max: i32, lvl_min: i32) -> Result<Self, MeshGateError> {
        log4_or_err(comm.size())?;
        let patch = UnitCubePatchGenerator::create(comm.rank(), comm.size())?;
        let mut domain = DomainControl::new(comm.clone());
        let mut layer = DomainLayer::new(Arc::new(comm.dup()), 0);
        layer.set_neighbour_ranks(patch.neighbour_ranks);
        domain.push_layer(layer);

        let (lvl_max, lvl_min) = clamp_levels(lvl_max, lvl_min);
        let mut lvl = patch.level;
        let mut node = patch.node;
        while lvl < lvl_min {
            node = node.refine(AdaptMode::None);
            lvl += 1;
        }
        domain.push_level_front(0, DomainLevel::new(lvl, node.clone()));
        while lvl < lvl_max {
            node = node.refine(AdaptMode::None);
            lvl += 1;
            domain.push_level_front(0, DomainLevel::new(lvl, node.clone()));
        }
        domain.compile_virtual_levels();
        Ok(Self { domain })
    }

    pub fn domain(&self) -> &DomainControl<C> {
        &self.domain
    }

    pub fn into_domain(self) -> DomainControl<C> {
        self.domain
    }
}

/// Unit-square domain over a tree of communicator layers.
///
/// Layer `i` runs on every `4^i`-th rank of the world; ranks are numbered in
/// 2-level order on every layer, so each group of 4 consecutive ranks are
/// siblings whose first rank also lives on the next layer. The finest level
/// of every layer above the first carries the patch parts `0..4` of its
/// children.
pub struct HierarchUnitCubeDomainControl<C: Communicator> {
    domain: DomainControl<C>,
}

impl<C: Communicator> HierarchUnitCubeDomainControl<C> {
    /// `lvls[i]` is the finest and `lvls[i + 1]` the coarsest level of layer
    /// `i`, so `lvls.len() - 1` layers are requested.
    pub fn new(comm: Arc<C>, lvls: &[usize]) -> Result<Self, MeshGateError> {
        let log4n = log4_or_err(comm.size())? as usize;
        if lvls.len() < 2 {
            return Err(MeshGateError::InvalidLevels(
                "need a fine and a coarse level".into(),
            ));
        }
        if lvls.windows(2).any(|w| w[0] < w[1]) {
            return Err(MeshGateError::InvalidLevels(format!(
                "levels must not increase towards coarser layers: {lvls:?}"
            )));
        }
        let nlayers = lvls.len() - 1;
        if nlayers > log4n + 1 {
            return Err(MeshGateError::InvalidLevels(format!(
                "{nlayers} layers requested, {} processes allow at most {}",
                comm.size(),
                log4n + 1
            )));
        }

        let mut domain = DomainControl::new(comm.clone());
        Self::create_layers(&mut domain, &comm, nlayers);

        for i in 0..domain.num_layers() {
            let layer_comm = domain.layer(i).comm_arc().clone();
            let csize = layer_comm.size();
            let crank = two_level_to_lexi(layer_comm.rank(), csize);
            let patch = UnitCubePatchGenerator::create(crank, csize)?;

            let reranks: BTreeMap<usize, usize> = patch
                .neighbour_ranks
                .iter()
                .map(|&r| (r, lexi_to_two_level(r, csize)))
                .collect();
            let mut node = patch.node;
            node.rename_halos(&reranks);
            let mut ranks: Vec<usize> = reranks.values().copied().collect();
            ranks.sort_unstable();
            match domain.layer_mut(i) {
                Some(layer) => layer.set_neighbour_ranks(ranks),
                None => panic!("layer {i} already shared"),
            }

            let base_lvl = patch.level;
            domain.push_level_front(i, DomainLevel::new(base_lvl, node.clone()));
            let mut head = base_lvl;
            if i > 0 {
                node = node.refine(AdaptMode::None);
                Self::create_child_meshparts(&mut node)?;
                head += 1;
                domain.push_level_front(i, DomainLevel::new(head, node.clone()));
            }
            let (fin_lvl, crs_lvl) = (lvls[i], lvls[i + 1]);
            while head < fin_lvl {
                node = node.refine(AdaptMode::None);
                head += 1;
                domain.push_level_front(i, DomainLevel::new(head, node.clone()));
            }
            for _ in base_lvl..crs_lvl {
                domain.pop_level_back(i);
            }
        }
        domain.compile_virtual_levels();
        Ok(Self { domain })
    }

    /// Parse level arguments; a single level gets coarse level 0.
    pub fn from_level_strings(comm: Arc<C>, lvls: &[String]) -> Result<Self, MeshGateError> {
        let mut ilvls = lvls
            .iter()
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|_| MeshGateError::InvalidLevels(format!("failed to parse '{s}' as level")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ilvls.is_empty() {
            return Err(MeshGateError::InvalidLevels("no levels given".into()));
        }
        if ilvls.len() < 2 {
            ilvls.push(0);
        }
        Self::new(comm, &ilvls)
    }

    /// Layer 0 on a duplicate of `comm`; every further layer on the first
    /// rank of each sibling group, until a layer has fewer than 4 ranks or
    /// `nlayers` exist.
    fn create_layers(domain: &mut DomainControl<C>, comm: &C, nlayers: usize) {
        let mut layers = vec![DomainLayer::new(Arc::new(comm.dup()), 0)];
        for i in 0..nlayers.saturating_sub(1) {
            let Some(child) = layers.last_mut() else { break };
            let comm_c = child.comm_arc().clone();
            let Some(comm_s) = comm_c.create_range_incl(4, comm_c.rank() & !3, 1) else {
                panic!("rank {} outside its own sibling group", comm_c.rank());
            };
            child.set_parent(Arc::new(comm_s), 0);
            let Some(comm_p) = comm_c.create_range_incl(comm_c.size() / 4, 0, 4) else {
                break;
            };
            layers.push(DomainLayer::new(Arc::new(comm_p), i + 1));
        }
        for layer in layers {
            domain.push_layer(layer);
        }
    }

    /// Patch part `j` of the once-refined single-cell patch is child cell `j`,
    /// the patch of sibling rank `j`.
    fn create_child_meshparts(node: &mut RootMeshNode) -> Result<(), MeshGateError> {
        if node.mesh().num_cells() != 4 {
            return Err(MeshGateError::InvalidTopology(format!(
                "child parts need a once-refined single cell, got {} cells",
                node.mesh().num_cells()
            )));
        }
        for (j, (verts, edges)) in CHILD_VERTS.iter().zip(&CHILD_EDGES).enumerate() {
            node.add_patch(j, MeshPart::new(verts.to_vec(), edges.to_vec(), vec![j]));
        }
        Ok(())
    }

    pub fn domain(&self) -> &DomainControl<C> {
        &self.domain
    }

    pub fn into_domain(self) -> DomainControl<C> {
        self.domain
    }
}
