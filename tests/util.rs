#![allow(dead_code)]
use mesh_gate::algs::communicator::{Communicator, LocalComm};
use mesh_gate::global::Gate;
use mesh_gate::lafem::{DenseVector, VectorMirror};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Local size of every rank in [`chain_gate`].
pub const CHAIN_LEN: usize = 3;

/// 1-D chain: rank `r` owns global entries `2r..=2r+2`, so neighbouring
/// ranks share one entry.
pub fn chain_gate(comm: LocalComm) -> Gate<f64, LocalComm> {
    let (rank, size) = (comm.rank(), comm.size());
    let mut gate = Gate::new(Some(Arc::new(comm)));
    if rank > 0 {
        gate.push(rank - 1, VectorMirror::new(CHAIN_LEN, vec![0]));
    }
    if rank + 1 < size {
        gate.push(rank + 1, VectorMirror::new(CHAIN_LEN, vec![CHAIN_LEN - 1]));
    }
    gate.compile(DenseVector::new(CHAIN_LEN));
    gate
}

pub fn chain_global_len(size: usize) -> usize {
    2 * size + 1
}

/// Local slice of a global chain vector.
pub fn chain_local(rank: usize, global: &[f64]) -> DenseVector<f64> {
    DenseVector::from_vec(global[2 * rank..2 * rank + CHAIN_LEN].to_vec())
}

/// Same seed on every rank, so every rank sees the same global vector.
pub fn random_global(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

pub fn assert_close(got: &[f64], want: &[f64]) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() < 1e-12, "entry {i}: got {g}, want {w}");
    }
}
