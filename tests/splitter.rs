mod util;

use mesh_gate::algs::communicator::LocalUniverse;
use mesh_gate::control::system::{assemble_vertex_gate, assemble_vertex_splitter};
use mesh_gate::control::{PartiConfig, PartiDomainControl};
use mesh_gate::lafem::DenseVector;
use std::sync::Arc;
use util::assert_close;

const SQUARE: &str = r#"{
    "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
    "partitions": [ { "name": "quad", "level": 1, "patches": [[0],[1],[2],[3]] } ]
}"#;

fn coord_signature(mesh: &mesh_gate::geometry::QuadMesh) -> Vec<f64> {
    mesh.coords().iter().map(|p| p[0] + 2.0 * p[1]).collect()
}

#[test]
fn join_gathers_and_split_scatters_the_base_vector() {
    let out = LocalUniverse::run(4, |comm| {
        let cfg = PartiConfig {
            keep_base_levels: true,
            ..PartiConfig::default()
        };
        let mut ctrl = PartiDomainControl::with_config(Arc::new(comm), cfg);
        ctrl.read_mesh_streams(&[SQUARE]).unwrap();
        ctrl.create_partition().unwrap();
        ctrl.create_hierarchy(3, -1).unwrap();

        let layer = ctrl.domain().front_layer();
        let level = ctrl.domain().front().level();
        let gate = assemble_vertex_gate::<f64, _>(layer, level).unwrap();
        let splitter = assemble_vertex_splitter::<f64, _>(layer.comm_arc().clone(), level).unwrap();

        let local = DenseVector::from_vec(coord_signature(level.mesh()));
        let joined = splitter.join(&gate, &local).map(|b| b.to_vec());
        let expected = level.base_mesh_node().map(|b| coord_signature(b.mesh()));

        let back = DenseVector::new(local.size());
        let base = joined.clone().map(DenseVector::from_vec);
        splitter.split(&back, base.as_ref());
        let again = splitter.split_as_global(base.as_ref());
        assert_eq!(again.to_vec(), back.to_vec());
        let rejoined = splitter.join(&gate, &again).map(|b| b.to_vec());
        assert_eq!(rejoined.is_some(), joined.is_some());
        (joined, expected, local.to_vec(), back.to_vec())
    });
    let (joined, expected, _, _) = &out[0];
    assert_close(joined.as_ref().unwrap(), expected.as_ref().unwrap());
    assert_eq!(joined.as_ref().unwrap().len(), 81);
    for (rank, (joined, _, local, back)) in out.iter().enumerate() {
        assert_eq!(joined.is_some(), rank == 0);
        assert_close(back, local);
    }
}
