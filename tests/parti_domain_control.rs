use mesh_gate::algs::communicator::{LocalUniverse, NoComm};
use mesh_gate::control::system::assemble_vertex_gate;
use mesh_gate::control::{PartiDomainControl, PartiState, PartiStrategy};
use mesh_gate::lafem::DenseVector;
use mesh_gate::mesh_error::MeshGateError;
use std::path::PathBuf;
use std::sync::Arc;

const MESH: &str = r#"{
    "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
    "meshparts": { "bnd": { "vertices": [0,1,2,3], "edges": [[0,1],[2,3],[0,2],[1,3]] } }
}"#;

const PARTITIONS: &str = r#"{ "partitions": [
    { "name": "strips", "priority": 1, "level": 2,
      "patches": [[0,1,2,3,4,5,6,7],[8,9,10,11,12,13,14,15]] },
    { "name": "quad", "priority": 2, "level": 1, "patches": [[0],[1],[2],[3]] }
] }"#;

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mesh-gate-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

fn args(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

#[test]
fn files_to_global_vertex_count() {
    let mesh = temp_file("mesh.json", MESH);
    let parts = temp_file("parts.json", PARTITIONS);
    let out = LocalUniverse::run(4, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        ctrl.read_mesh_files(&[&mesh, &parts]).unwrap();
        ctrl.create_partition().unwrap();
        ctrl.create_hierarchy(3, 0).unwrap();
        assert_eq!(ctrl.state(), PartiState::HierarchyBuilt);

        let virt = ctrl.domain().front();
        let gate = assemble_vertex_gate::<f64, _>(virt.layer(), virt.level()).unwrap();
        let ones = DenseVector::from_elem(virt.level().mesh().num_vertices(), 1.0);
        (ctrl.chosen_strategy(), ctrl.level_indices(), gate.dot(&ones, &ones))
    });
    std::fs::remove_file(&mesh).ok();
    std::fs::remove_file(&parts).ok();
    for (chosen, levels, count) in out {
        assert_eq!(chosen, Some(PartiStrategy::Manual));
        assert_eq!(levels, vec![1, 2, 3]);
        assert!((count - 81.0).abs() < 1e-9);
    }
}

#[test]
fn manual_partition_is_chosen_by_process_count() {
    let out = LocalUniverse::run(2, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        ctrl.read_mesh_streams(&[MESH, PARTITIONS]).unwrap();
        ctrl.create_partition().unwrap();
        (ctrl.base_mesh_level(), ctrl.neighbour_ranks().to_vec())
    });
    assert_eq!(out, vec![(2, vec![1]), (2, vec![0])]);
}

#[test]
fn parti_type_skips_manual_partitions() {
    let out = LocalUniverse::run(4, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        ctrl.parse_args(&args("--parti-type fallback --parti-rank-elems 2"))
            .unwrap();
        ctrl.read_mesh_streams(&[MESH, PARTITIONS]).unwrap();
        ctrl.create_partition().unwrap();
        (ctrl.attempted_strategies().to_vec(), ctrl.base_mesh_level())
    });
    for (attempted, level) in out {
        assert_eq!(attempted, vec![PartiStrategy::Fallback]);
        // 4 ranks * 2 cells need level 2
        assert_eq!(level, 2);
    }
}

#[test]
fn unknown_partition_name_falls_through() {
    let out = LocalUniverse::run(4, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        ctrl.parse_args(&args("--parti-type manual --parti-name hex")).unwrap();
        ctrl.read_mesh_streams(&[MESH, PARTITIONS]).unwrap();
        ctrl.create_partition()
    });
    assert!(
        out.iter()
            .all(|r| matches!(r, Err(MeshGateError::PartitionExhausted(_))))
    );
}

#[test]
fn missing_mesh_file_is_reported_on_every_rank() {
    let out = LocalUniverse::run(3, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        ctrl.read_mesh_files(&["/nonexistent/mesh-gate/mesh.json"])
    });
    assert!(out.iter().all(|r| matches!(r, Err(MeshGateError::Io { .. }))));
}

#[test]
fn serial_run_never_partitions() {
    let mut ctrl = PartiDomainControl::new(Arc::new(NoComm));
    ctrl.read_mesh_streams(&[MESH, PARTITIONS]).unwrap();
    ctrl.create_partition().unwrap();
    ctrl.create_hierarchy(2, -3).unwrap();
    assert_eq!(ctrl.attempted_strategies(), &[PartiStrategy::SinglePatch]);
    assert_eq!(ctrl.level_indices(), vec![0, 1, 2]);
    assert_eq!(ctrl.levels()[2].mesh().num_cells(), 16);
}

#[test]
fn empty_mesh_is_refused_on_every_rank() {
    let out = LocalUniverse::run(2, |comm| {
        let mut ctrl = PartiDomainControl::new(Arc::new(comm));
        let res = ctrl.read_mesh_streams(&[r#"{ "mesh": { "vertices": [], "cells": [] } }"#]);
        (res, ctrl.state())
    });
    for (res, state) in out {
        assert!(matches!(res, Err(MeshGateError::MeshParse(_))));
        assert_eq!(state, PartiState::Empty);
    }
}
