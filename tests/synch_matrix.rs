use mesh_gate::algs::communicator::LocalUniverse;
use mesh_gate::control::UnitCubeDomainControl;
use mesh_gate::control::system::{assemble_vertex_gate, assemble_vertex_matrix};
use mesh_gate::global::SynchMatrix;
use std::sync::Arc;

/// Cells of the `n x n` unit-square grid around the vertex at `p`.
fn global_cells_at(p: [f64; 2], n: usize) -> f64 {
    let touching = |c: f64| {
        let i = (c * n as f64).round() as usize;
        if i == 0 || i == n { 1.0 } else { 2.0 }
    };
    touching(p[0]) * touching(p[1])
}

#[test]
fn synchronised_diagonal_counts_global_cells() {
    let out = LocalUniverse::run(4, |comm| {
        let ctrl = UnitCubeDomainControl::new(Arc::new(comm), 2, -1).unwrap();
        let domain = ctrl.domain();
        let layer = domain.front_layer();
        let level = domain.front().level();
        let gate = assemble_vertex_gate::<f64, _>(layer, level).unwrap();
        let matrix = assemble_vertex_matrix::<f64>(level);
        let mut synch = SynchMatrix::from_gates(&gate, &gate, layer.comm_arc().clone());
        synch.init(&matrix).unwrap();
        synch.exec(&matrix).unwrap();
        let mesh = level.mesh();
        (0..mesh.num_vertices())
            .map(|v| (mesh.vertex(v), matrix.value(v, v)))
            .collect::<Vec<_>>()
    });
    for rank_diag in out {
        for (p, d) in rank_diag {
            assert_eq!(d, global_cells_at(p, 4), "vertex at {p:?}");
        }
    }
}

#[test]
fn exec_reuses_the_exchange_pattern() {
    let out = LocalUniverse::run(4, |comm| {
        let ctrl = UnitCubeDomainControl::new(Arc::new(comm), 1, -1).unwrap();
        let domain = ctrl.domain();
        let layer = domain.front_layer();
        let level = domain.front().level();
        let gate = assemble_vertex_gate::<f64, _>(layer, level).unwrap();
        let first = assemble_vertex_matrix::<f64>(level);
        let mut synch = SynchMatrix::from_gates(&gate, &gate, layer.comm_arc().clone());
        synch.init(&first).unwrap();
        synch.exec(&first).unwrap();

        let second = assemble_vertex_matrix::<f64>(level);
        assert!(synch.is_compatible(&second));
        synch.exec(&second).unwrap();
        (first.values().to_vec(), second.values().to_vec())
    });
    for (first, second) in out {
        assert_eq!(first, second);
    }
}
