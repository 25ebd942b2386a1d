use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mesh_gate::algs::communicator::{Communicator, LocalUniverse};
use mesh_gate::control::UnitCubeDomainControl;
use mesh_gate::control::system::{assemble_vertex_gate, assemble_vertex_matrix};
use mesh_gate::global::SynchMatrix;
use mesh_gate::lafem::DenseVector;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const RANKS: usize = 4;
const ROUNDS: usize = 20;

fn bench_vector_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_sync_1");
    for level in [4usize, 6] {
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, &level| {
            b.iter(|| {
                LocalUniverse::run(RANKS, |comm| {
                    let mut rng = SmallRng::seed_from_u64(comm.rank() as u64);
                    let ctrl = UnitCubeDomainControl::new(Arc::new(comm), level as i32, -1).unwrap();
                    let virt = ctrl.domain().front();
                    let gate = assemble_vertex_gate::<f64, _>(virt.layer(), virt.level()).unwrap();
                    let n = virt.level().mesh().num_vertices();
                    let mut v = DenseVector::from_vec((0..n).map(|_| rng.gen_range(0.0..1.0)).collect());
                    for _ in 0..ROUNDS {
                        gate.sync_1(&mut v);
                    }
                    gate.dot(&v, &v)
                })
            })
        });
    }
    group.finish();
}

fn bench_matrix_sync(c: &mut Criterion) {
    c.bench_function("synch_matrix_exec_level5", |b| {
        b.iter(|| {
            LocalUniverse::run(RANKS, |comm| {
                let ctrl = UnitCubeDomainControl::new(Arc::new(comm), 5, -1).unwrap();
                let virt = ctrl.domain().front();
                let gate = assemble_vertex_gate::<f64, _>(virt.layer(), virt.level()).unwrap();
                let matrix = assemble_vertex_matrix::<f64>(virt.level());
                let mut synch = SynchMatrix::from_gates(&gate, &gate, virt.layer().comm_arc().clone());
                synch.init(&matrix).unwrap();
                for _ in 0..ROUNDS {
                    synch.exec(&matrix).unwrap();
                }
                matrix.used_elements()
            })
        })
    });
}

criterion_group!(benches, bench_vector_sync, bench_matrix_sync);
criterion_main!(benches);
