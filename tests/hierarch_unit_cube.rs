use mesh_gate::algs::communicator::{Communicator, LocalUniverse};
use mesh_gate::control::HierarchUnitCubeDomainControl;
use mesh_gate::control::system::{assemble_layer_muxer, assemble_vertex_gate};
use mesh_gate::lafem::DenseVector;
use std::sync::Arc;

#[test]
fn sixteen_ranks_two_layers() {
    let out = LocalUniverse::run(16, |comm| {
        let ctrl = HierarchUnitCubeDomainControl::new(Arc::new(comm), &[3, 2, 0]).unwrap();
        let d = ctrl.domain();
        let back = d.back();
        (d.num_layers(), d.level_indices(), back.is_child(), back.is_parent())
    });
    for (rank, (layers, levels, child, parent)) in out.into_iter().enumerate() {
        if rank % 4 == 0 {
            assert_eq!(layers, 2, "rank {rank}");
            assert_eq!(levels, vec![3, 2, 1]);
            assert!(!child && !parent);
        } else {
            assert_eq!(layers, 1, "rank {rank}");
            assert_eq!(levels, vec![3, 2]);
            assert!(child && !parent);
        }
    }
}

#[test]
fn finest_layer_sees_the_whole_square() {
    let out = LocalUniverse::run(16, |comm| {
        let ctrl = HierarchUnitCubeDomainControl::new(Arc::new(comm), &[3, 2, 0]).unwrap();
        let d = ctrl.domain();
        let front = d.front();
        let gate = assemble_vertex_gate::<f64, _>(front.layer(), front.level()).unwrap();
        let ones = DenseVector::from_elem(front.level().mesh().num_vertices(), 1.0);
        gate.dot(&ones, &ones)
    });
    // (2^3 + 1)^2 vertices on level 3
    assert!(out.iter().all(|&n| (n - 81.0).abs() < 1e-9));
}

#[test]
fn parent_patches_line_up_with_children() {
    let out = LocalUniverse::run(16, |comm| {
        let ctrl = HierarchUnitCubeDomainControl::new(Arc::new(comm), &[2, 2, 0]).unwrap();
        let d = ctrl.domain();
        let virt = d
            .virtual_levels()
            .iter()
            .find(|v| v.is_child())
            .expect("every rank has a child level");
        let muxer = assemble_layer_muxer::<f64, _>(virt).unwrap().unwrap();
        let mesh = virt.level().mesh();
        let local = DenseVector::new(mesh.num_vertices());
        match virt.level_p() {
            Some(level_p) => {
                // parent: hand every child the x + 2y signature of its vertices
                let coords = level_p.mesh().coords();
                let parent = DenseVector::from_vec(coords.iter().map(|p| p[0] + 2.0 * p[1]).collect());
                muxer.split(&local, &parent);
            }
            None => muxer.split_recv(&local),
        }
        let own: Vec<f64> = mesh.coords().iter().map(|p| p[0] + 2.0 * p[1]).collect();
        (own, local.to_vec())
    });
    for (rank, (own, received)) in out.into_iter().enumerate() {
        assert_eq!(own.len(), received.len());
        for (a, b) in own.iter().zip(&received) {
            assert!((a - b).abs() < 1e-12, "rank {rank}: {own:?} vs {received:?}");
        }
    }
}

#[test]
fn muxer_join_sums_over_shared_vertices() {
    let out = LocalUniverse::run(4, |comm| {
        let ctrl = HierarchUnitCubeDomainControl::new(Arc::new(comm), &[1, 1, 0]).unwrap();
        let d = ctrl.domain();
        let virt = d.front();
        let muxer = assemble_layer_muxer::<f64, _>(virt).unwrap().unwrap();
        let local = DenseVector::from_elem(virt.level().mesh().num_vertices(), 1.0);
        match virt.level_p() {
            Some(level_p) => {
                let parent = DenseVector::new(level_p.mesh().num_vertices());
                muxer.join(&local, &parent);
                Some(parent.to_vec())
            }
            None => {
                muxer.join_send(&local);
                None
            }
        }
    });
    // corners touch one child, edge midpoints two, the centre four
    assert_eq!(out[0], Some(vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 4.0]));
    assert!(out[1..].iter().all(Option::is_none));
}

#[test]
fn invalid_process_count_fails_on_every_rank() {
    let out = LocalUniverse::run(2, |comm| {
        let rank = comm.rank();
        (rank, HierarchUnitCubeDomainControl::new(Arc::new(comm), &[2, 0]).is_err())
    });
    assert!(out.iter().all(|&(_, failed)| failed));
}
