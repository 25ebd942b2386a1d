//! Domain control for a mesh read from mesh files and partitioned at runtime.
//!
//! The control moves through [`PartiState`]: read a mesh, partition it, then
//! build the level hierarchy. Partitioning tries the enabled strategies in a
//! fixed order (single patch on one process, then a manual partition from the
//! mesh files, then METIS, then the fallback partitioner) and keeps the first
//! one that succeeds. Every decision is made identically on all ranks.

use super::clamp_levels;
use super::domain_control::DomainControl;
use super::domain_level::{DomainLayer, DomainLevel};
use crate::adjacency::Graph;
use crate::algs::communicator::Communicator;
use crate::control::config::PartiConfig;
use crate::geometry::{MeshFileReader, MeshPart, PartitionSet, PatchExtraction, RootMeshNode};
use crate::mesh_error::MeshGateError;
use crate::partitioning::{Partitioner, dual_graph, synchronized_partition};
use crate::util::RankLogger;
use crate::util::dist_file_io::read_common;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartiState {
    Empty,
    MeshRead,
    Partitioned,
    HierarchyBuilt,
}

/// Ways to obtain the rank's patch, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartiStrategy {
    SinglePatch,
    Manual,
    Metis,
    Fallback,
}

impl PartiStrategy {
    pub fn name(self) -> &'static str {
        match self {
            PartiStrategy::SinglePatch => "single-patch",
            PartiStrategy::Manual => "manual",
            PartiStrategy::Metis => "metis",
            PartiStrategy::Fallback => "fallback",
        }
    }
}

impl fmt::Display for PartiStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct PartiDomainControl<C: Communicator> {
    comm: Arc<C>,
    config: PartiConfig,
    logger: RankLogger,
    state: PartiState,
    base_node: Option<RootMeshNode>,
    base_mesh_level: usize,
    patch_node: Option<RootMeshNode>,
    partitions: PartitionSet,
    attempted: Vec<PartiStrategy>,
    chosen: Option<PartiStrategy>,
    domain: DomainControl<C>,
}

impl<C: Communicator> PartiDomainControl<C> {
    pub fn new(comm: Arc<C>) -> Self {
        Self::with_config(comm, PartiConfig::default())
    }

    pub fn with_config(comm: Arc<C>, config: PartiConfig) -> Self {
        Self {
            logger: RankLogger::for_comm(&*comm),
            domain: DomainControl::new(comm.clone()),
            comm,
            config,
            state: PartiState::Empty,
            base_node: None,
            base_mesh_level: 0,
            patch_node: None,
            partitions: PartitionSet::new(),
            attempted: Vec::new(),
            chosen: None,
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &PartiConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PartiConfig {
        assert!(
            matches!(self.state, PartiState::Empty | PartiState::MeshRead),
            "partitioner options are fixed once the domain is partitioned"
        );
        &mut self.config
    }

    /// Apply `--parti-*` command line options.
    pub fn parse_args(&mut self, args: &[String]) -> Result<(), MeshGateError> {
        self.config_mut().parse_args(args)
    }

    pub fn state(&self) -> PartiState {
        self.state
    }

    pub fn logger(&self) -> &RankLogger {
        &self.logger
    }

    /// Take the base mesh and manual partitions from parsed mesh file streams.
    pub fn read_mesh(&mut self, reader: &MeshFileReader) -> Result<(), MeshGateError> {
        assert_eq!(self.state, PartiState::Empty, "domain control has already read a mesh");
        let contents = reader.parse()?;
        self.logger.info(format!(
            "Base mesh: {} vertices, {} cells, {} manual partition(s)",
            contents.node.mesh().num_vertices(),
            contents.node.mesh().num_cells(),
            contents.partitions.len()
        ));
        self.base_node = Some(contents.node);
        self.partitions = contents.partitions;
        self.state = PartiState::MeshRead;
        Ok(())
    }

    pub fn read_mesh_streams(&mut self, streams: &[&str]) -> Result<(), MeshGateError> {
        let mut reader = MeshFileReader::new();
        for s in streams {
            reader.add_stream(s)?;
        }
        self.read_mesh(&reader)
    }

    /// Collective: rank 0 reads each file and broadcasts its contents.
    pub fn read_mesh_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), MeshGateError> {
        let mut reader = MeshFileReader::new();
        for p in paths {
            let bytes = read_common(&*self.comm, p)?;
            reader.add_bytes(&bytes)?;
        }
        self.read_mesh(&reader)
    }

    /// Collective: find this rank's patch with the first strategy that works.
    ///
    /// Fails with `PartitionExhausted` on every rank when no enabled strategy
    /// produced a partition.
    pub fn create_partition(&mut self) -> Result<(), MeshGateError> {
        assert_eq!(
            self.state,
            PartiState::MeshRead,
            "domain control needs a mesh and no partition yet"
        );
        let size = self.comm.size();
        let chain = [
            (PartiStrategy::SinglePatch, size == 1),
            (PartiStrategy::Manual, self.config.allow_manual),
            (PartiStrategy::Metis, self.config.allow_metis),
            (PartiStrategy::Fallback, self.config.allow_fallback),
        ];
        for (strategy, enabled) in chain {
            if !enabled {
                continue;
            }
            self.attempted.push(strategy);
            let found = match strategy {
                PartiStrategy::SinglePatch => Some(self.single_patch_graph()),
                PartiStrategy::Manual => self.manual_graph(),
                PartiStrategy::Metis => self.auto_graph(Partitioner::Metis)?,
                PartiStrategy::Fallback => self.auto_graph(Partitioner::Fallback)?,
            };
            if let Some(elems_at_rank) = found {
                return self.install_patch(strategy, &elems_at_rank);
            }
        }
        let tried: Vec<&str> = self.attempted.iter().map(|s| s.name()).collect();
        self.logger.error(format!(
            "No partitioning strategy succeeded for {size} processes (tried {tried:?})"
        ));
        Err(MeshGateError::PartitionExhausted(format!(
            "no partition for {size} processes; tried {tried:?}"
        )))
    }

    /// Collective: refine the patch and keep the levels `lvl_min..=lvl_max`.
    ///
    /// Negative `lvl_min` counts down from `lvl_max`. Levels below the level
    /// the base mesh was partitioned on are not available; the hierarchy then
    /// starts at that level.
    pub fn create_hierarchy(&mut self, lvl_max: i32, lvl_min: i32) -> Result<(), MeshGateError> {
        assert_eq!(
            self.state,
            PartiState::Partitioned,
            "domain must be partitioned before creating a hierarchy"
        );
        let (lvl_max, lvl_min) = clamp_levels(lvl_max, lvl_min);
        if lvl_max < self.base_mesh_level {
            return Err(MeshGateError::InvalidLevels(format!(
                "maximum level {lvl_max} is below the partitioning level {}",
                self.base_mesh_level
            )));
        }
        if lvl_min < self.base_mesh_level {
            self.logger.info(format!(
                "Partitioned on level {}; coarsest level raised from {lvl_min}",
                self.base_mesh_level
            ));
        }
        let Some(mut node) = self.patch_node.take() else {
            return Err(MeshGateError::MissingMeshPart("partitioned patch".into()));
        };
        let mode = self.config.adapt_mode;
        let mut base = if self.config.keep_base_levels {
            self.base_node.clone()
        } else {
            None
        };

        let mut lvl = self.base_mesh_level;
        while lvl < lvl_min {
            node = node.refine(mode);
            base = base.map(|b| b.refine(mode));
            lvl += 1;
        }
        self.push_level(lvl, &node, base.as_ref());
        while lvl < lvl_max {
            node = node.refine(mode);
            base = base.map(|b| b.refine(mode));
            lvl += 1;
            self.push_level(lvl, &node, base.as_ref());
        }
        self.domain.compile_virtual_levels();
        self.logger.info(format!(
            "Hierarchy on levels {}..={lvl_max}: {} cells per patch on rank 0",
            self.domain.min_level_index(),
            node.mesh().num_cells()
        ));
        self.state = PartiState::HierarchyBuilt;
        Ok(())
    }

    /// `["max"]` or `["max", "min"]` as given on a command line.
    pub fn create_hierarchy_from_strings(&mut self, lvls: &[String]) -> Result<(), MeshGateError> {
        let parse = |s: &String| {
            s.trim()
                .parse::<i32>()
                .map_err(|e| MeshGateError::InvalidLevels(format!("level '{s}': {e}")))
        };
        match lvls {
            [max] => self.create_hierarchy(parse(max)?, 0),
            [max, min] => self.create_hierarchy(parse(max)?, parse(min)?),
            _ => Err(MeshGateError::InvalidLevels(format!(
                "expected one or two levels, got {}",
                lvls.len()
            ))),
        }
    }

    /// Strategies run by `create_partition`, in order.
    pub fn attempted_strategies(&self) -> &[PartiStrategy] {
        &self.attempted
    }

    pub fn chosen_strategy(&self) -> Option<PartiStrategy> {
        self.chosen
    }

    /// Refinement level of the base mesh the partition was computed on.
    pub fn base_mesh_level(&self) -> usize {
        self.base_mesh_level
    }

    /// Present before partitioning, and afterwards with `keep_base_levels`.
    pub fn base_mesh_node(&self) -> Option<&RootMeshNode> {
        self.base_node.as_ref()
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    pub fn neighbour_ranks(&self) -> &[usize] {
        self.domain.front_layer().neighbour_ranks()
    }

    pub fn domain(&self) -> &DomainControl<C> {
        &self.domain
    }

    /// Levels of the hierarchy, coarsest first.
    pub fn levels(&self) -> Vec<&DomainLevel> {
        if self.domain.num_layers() == 0 {
            return Vec::new();
        }
        self.domain.layer_levels(0).iter().rev().map(|l| &**l).collect()
    }

    pub fn level_indices(&self) -> Vec<usize> {
        self.levels().iter().map(|l| l.level_index()).collect()
    }

    fn base(&self) -> &RootMeshNode {
        match &self.base_node {
            Some(b) => b,
            None => panic!("base mesh not available"),
        }
    }

    fn single_patch_graph(&self) -> Graph {
        let n = self.base().mesh().num_cells();
        Graph::from_lists(n, [(0..n).collect::<Vec<_>>()])
    }

    fn manual_graph(&mut self) -> Option<Graph> {
        let size = self.comm.size();
        let Some(part) = self.partitions.find_partition(size, &self.config.partition_name) else {
            if self.config.partition_name.is_empty() {
                self.logger.info(format!("No manual partition for {size} processes"));
            } else {
                self.logger.info(format!(
                    "No manual partition '{}' for {size} processes",
                    self.config.partition_name
                ));
            }
            return None;
        };
        let elems_at_rank = part.elems_at_rank();
        if let Some(r) = (0..size).find(|&r| elems_at_rank.image(r).is_empty()) {
            self.logger.warn(format!(
                "Manual partition '{}' leaves rank {r} without cells",
                part.name()
            ));
            return None;
        }
        let (name, level, graph) = (part.name().to_string(), part.level(), elems_at_rank.clone());
        if level < self.base_mesh_level {
            self.logger.warn(format!(
                "Manual partition '{name}' is for level {level}, base mesh is already on level {}",
                self.base_mesh_level
            ));
            return None;
        }
        self.logger.info(format!("Using manual partition '{name}' on level {level}"));
        self.refine_base_to_level(level);
        Some(graph)
    }

    fn auto_graph(&mut self, partitioner: Partitioner) -> Result<Option<Graph>, MeshGateError> {
        if !partitioner.is_available() {
            self.logger
                .info(format!("{} partitioner not available in this build", partitioner.name()));
            return Ok(None);
        }
        let size = self.comm.size();
        self.refine_base_to_min_cells(self.config.min_elems_per_rank * size);
        let graph = dual_graph(self.base().mesh());
        self.logger.info(format!(
            "Running {} partitioner on level {} ({} cells)",
            partitioner.name(),
            self.base_mesh_level,
            graph.num_domain()
        ));
        match synchronized_partition(&*self.comm, partitioner, &graph) {
            Ok(assignment) => Ok(Some(assignment.elems_at_rank())),
            Err(MeshGateError::PartitionerFailed { strategy, reason }) => {
                self.logger.warn(format!("{strategy} partitioner failed: {reason}"));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn refine_base_to_level(&mut self, level: usize) {
        let mode = self.config.adapt_mode;
        while self.base_mesh_level < level {
            let refined = self.base().refine(mode);
            self.base_node = Some(refined);
            self.base_mesh_level += 1;
        }
    }

    fn refine_base_to_min_cells(&mut self, min_cells: usize) {
        let mode = self.config.adapt_mode;
        let before = self.base_mesh_level;
        while (1..min_cells).contains(&self.base().mesh().num_cells()) {
            let refined = self.base().refine(mode);
            self.base_node = Some(refined);
            self.base_mesh_level += 1;
        }
        if self.base_mesh_level > before {
            self.logger.info(format!(
                "Refined base mesh to level {} for at least {min_cells} cells",
                self.base_mesh_level
            ));
        }
    }

    fn install_patch(&mut self, strategy: PartiStrategy, elems_at_rank: &Graph) -> Result<(), MeshGateError> {
        let rank = self.comm.rank();
        let keep = self.config.keep_base_levels;
        let Some(base) = self.base_node.as_mut() else {
            return Err(MeshGateError::MissingMeshPart("base mesh".into()));
        };
        let (node, neighbour_ranks) = if strategy == PartiStrategy::SinglePatch {
            let mesh = base.mesh();
            let identity = MeshPart::new(
                (0..mesh.num_vertices()).collect(),
                (0..mesh.num_edges()).collect(),
                (0..mesh.num_cells()).collect(),
            );
            let mut node = base.clone();
            if keep {
                base.add_patch(0, identity);
            }
            node.clear_patches();
            (node, Vec::new())
        } else {
            if keep {
                base.create_patch_meshparts(elems_at_rank)?;
            }
            let PatchExtraction {
                node,
                neighbour_ranks,
            } = base.extract_patch(elems_at_rank, rank)?;
            (node, neighbour_ranks)
        };
        self.logger.debug_all(format!(
            "{strategy} patch: {} cells, neighbours {neighbour_ranks:?}",
            node.mesh().num_cells()
        ));

        let mut layer = DomainLayer::new(Arc::new(self.comm.dup()), 0);
        layer.set_neighbour_ranks(neighbour_ranks);
        self.domain.push_layer(layer);
        self.patch_node = Some(node);
        if !keep {
            self.base_node = None;
        }
        self.chosen = Some(strategy);
        self.state = PartiState::Partitioned;
        self.logger
            .info(format!("Partitioned with {strategy} strategy on level {}", self.base_mesh_level));
        Ok(())
    }

    fn push_level(&mut self, lvl: usize, node: &RootMeshNode, base: Option<&RootMeshNode>) {
        let mut level = DomainLevel::new(lvl, node.clone());
        if let Some(b) = base {
            level = level.with_base_mesh_node(b.clone());
        }
        self.domain.push_level_front(0, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalUniverse, NoComm};

    const SQUARE: &str = r#"{
        "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
        "meshparts": { "bnd": { "vertices": [0,1,2,3], "edges": [[0,1],[2,3],[0,2],[1,3]] } }
    }"#;

    const QUAD_PARTITION: &str =
        r#"{ "partitions": [ { "name": "quad", "level": 1, "patches": [[0],[1],[2],[3]] } ] }"#;

    fn serial() -> PartiDomainControl<NoComm> {
        let mut ctrl = PartiDomainControl::new(Arc::new(NoComm));
        ctrl.read_mesh_streams(&[SQUARE]).unwrap();
        ctrl
    }

    #[test]
    fn single_process_takes_the_whole_mesh() {
        let mut ctrl = serial();
        assert_eq!(ctrl.state(), PartiState::MeshRead);
        ctrl.create_partition().unwrap();
        assert_eq!(ctrl.attempted_strategies(), &[PartiStrategy::SinglePatch]);
        assert_eq!(ctrl.chosen_strategy(), Some(PartiStrategy::SinglePatch));
        assert!(ctrl.neighbour_ranks().is_empty());
        assert_eq!(ctrl.base_mesh_level(), 0);
    }

    #[test]
    fn single_process_ignores_disabled_strategies() {
        let mut ctrl = serial();
        ctrl.parse_args(&["--parti-type".to_string(), "manual".to_string()])
            .unwrap();
        ctrl.config_mut().allow_manual = false;
        ctrl.create_partition().unwrap();
        assert_eq!(ctrl.chosen_strategy(), Some(PartiStrategy::SinglePatch));
    }

    #[test]
    fn hierarchy_with_negative_min_level() {
        let mut ctrl = serial();
        ctrl.create_partition().unwrap();
        ctrl.create_hierarchy(5, -2).unwrap();
        assert_eq!(ctrl.state(), PartiState::HierarchyBuilt);
        assert_eq!(ctrl.level_indices(), vec![4, 5]);
        assert_eq!(ctrl.domain().level_indices(), vec![5, 4]);
        assert_eq!(ctrl.levels()[1].mesh().num_cells(), 1 << 10);
        assert!(ctrl.levels()[0].mesh_node().find_mesh_part("bnd").is_some());
    }

    #[test]
    fn hierarchy_from_strings() {
        let mut ctrl = serial();
        ctrl.create_partition().unwrap();
        ctrl.create_hierarchy_from_strings(&["2".to_string()]).unwrap();
        assert_eq!(ctrl.level_indices(), vec![0, 1, 2]);

        let mut bad = serial();
        bad.create_partition().unwrap();
        assert!(matches!(
            bad.create_hierarchy_from_strings(&["two".to_string()]),
            Err(MeshGateError::InvalidLevels(_))
        ));
        assert!(bad.create_hierarchy_from_strings(&[]).is_err());
    }

    #[test]
    #[should_panic(expected = "partitioned before")]
    fn hierarchy_requires_partition() {
        let mut ctrl = serial();
        let _ = ctrl.create_hierarchy(1, 0);
    }

    #[test]
    fn manual_partition_wins_over_automatic() {
        let out = LocalUniverse::run(4, |comm| {
            let mut ctrl = PartiDomainControl::new(Arc::new(comm));
            ctrl.read_mesh_streams(&[SQUARE, QUAD_PARTITION]).unwrap();
            ctrl.create_partition().unwrap();
            ctrl.create_hierarchy(2, 0).unwrap();
            (
                ctrl.attempted_strategies().to_vec(),
                ctrl.base_mesh_level(),
                ctrl.neighbour_ranks().to_vec(),
                ctrl.level_indices(),
            )
        });
        for (rank, (attempted, base_level, neighbours, levels)) in out.into_iter().enumerate() {
            assert_eq!(attempted, vec![PartiStrategy::Manual]);
            assert_eq!(base_level, 1);
            assert_eq!(neighbours.len(), 3);
            assert!(!neighbours.contains(&rank));
            assert_eq!(levels, vec![1, 2]);
        }
    }

    #[test]
    fn fallback_runs_when_manual_is_missing() {
        let out = LocalUniverse::run(2, |comm| {
            let mut ctrl = PartiDomainControl::new(Arc::new(comm));
            ctrl.read_mesh_streams(&[SQUARE, QUAD_PARTITION]).unwrap();
            ctrl.config_mut().allow_metis = false;
            ctrl.create_partition().unwrap();
            (ctrl.attempted_strategies().to_vec(), ctrl.base_mesh_level(), ctrl.neighbour_ranks().to_vec())
        });
        for (rank, (attempted, base_level, neighbours)) in out.into_iter().enumerate() {
            assert_eq!(attempted, vec![PartiStrategy::Manual, PartiStrategy::Fallback]);
            // 2 ranks * 4 cells each
            assert_eq!(base_level, 2);
            assert_eq!(neighbours, vec![1 - rank]);
        }
    }

    #[test]
    fn cell_less_base_mesh_exhausts_instead_of_refining_forever() {
        use crate::geometry::{MeshAtlas, QuadMesh};
        let out = LocalUniverse::run(2, |comm| {
            let mut ctrl = PartiDomainControl::new(Arc::new(comm));
            let empty = QuadMesh::new(Vec::new(), Vec::new()).unwrap();
            ctrl.base_node = Some(RootMeshNode::new(empty, Arc::new(MeshAtlas::new())));
            ctrl.state = PartiState::MeshRead;
            let res = ctrl.create_partition();
            (res, ctrl.base_mesh_level())
        });
        for (res, level) in out {
            assert!(matches!(res, Err(MeshGateError::PartitionExhausted(_))));
            assert_eq!(level, 0);
        }
    }

    #[test]
    fn exhaustion_is_reported_everywhere() {
        let out = LocalUniverse::run(3, |comm| {
            let mut ctrl = PartiDomainControl::new(Arc::new(comm));
            ctrl.read_mesh_streams(&[SQUARE]).unwrap();
            ctrl.config_mut().allow_metis = false;
            ctrl.config_mut().allow_fallback = false;
            let res = ctrl.create_partition();
            (res, ctrl.attempted_strategies().to_vec())
        });
        for (res, attempted) in out {
            assert!(matches!(res, Err(MeshGateError::PartitionExhausted(_))));
            assert_eq!(attempted, vec![PartiStrategy::Manual]);
        }
    }

    #[test]
    fn kept_base_levels_carry_patch_parts() {
        let out = LocalUniverse::run(4, |comm| {
            let cfg = PartiConfig {
                keep_base_levels: true,
                ..PartiConfig::default()
            };
            let mut ctrl = PartiDomainControl::with_config(Arc::new(comm), cfg);
            ctrl.read_mesh_streams(&[SQUARE, QUAD_PARTITION]).unwrap();
            ctrl.create_partition().unwrap();
            ctrl.create_hierarchy(2, 1).unwrap();
            let fine = ctrl.levels()[1];
            let base = fine.base_mesh_node().unwrap();
            (base.mesh().num_cells(), base.patches().len(), fine.mesh().num_cells())
        });
        assert!(out.iter().all(|&o| o == (16, 4, 4)));
    }
}
