//! Type-0 → type-1 conversion of patch-local sparse matrices.
//!
//! `init` agrees on the buffer pattern with every neighbour in three phases
//! (dimensions, row pointers, column indices); `exec` then only ships values.

use super::gate::Gate;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::request::RequestVector;
use crate::algs::wire::{WireDims, cast_slice, decode_indices, encode_indices, pod_vec_from};
use crate::lafem::{CloneMode, CsrMatrix, MatrixMirror, Scalar, VectorMirror};
use crate::mesh_error::{CommErrorKind, MeshGateError};
use crate::util::statistics::SyncStatistics;
use std::mem::size_of;
use std::sync::Arc;

const MATRIX_TAG: CommTag = CommTag::new(0x5200);

pub struct SynchMatrix<T: Scalar, C: Communicator> {
    comm: Arc<C>,
    ranks: Vec<usize>,
    mirrors: Vec<MatrixMirror>,
    send_bufs: Vec<CsrMatrix<T>>,
    recv_bufs: Vec<CsrMatrix<T>>,
    layout: Option<CsrMatrix<T>>,
    stats: Option<Arc<SyncStatistics>>,
}

impl<T: Scalar, C: Communicator> SynchMatrix<T, C> {
    pub fn new(
        comm: Arc<C>,
        ranks: Vec<usize>,
        row_mirrors: Vec<VectorMirror>,
        col_mirrors: Vec<VectorMirror>,
    ) -> Self {
        assert!(
            ranks.len() == row_mirrors.len() && ranks.len() == col_mirrors.len(),
            "ranks and mirrors not co-indexed"
        );
        let mirrors = row_mirrors
            .into_iter()
            .zip(col_mirrors)
            .map(|(r, c)| MatrixMirror::new(r, c))
            .collect();
        Self {
            comm,
            ranks,
            mirrors,
            send_bufs: Vec::new(),
            recv_bufs: Vec::new(),
            layout: None,
            stats: None,
        }
    }

    /// Take neighbours and mirrors from the row and column gates of a level.
    pub fn from_gates(row_gate: &Gate<T, C>, col_gate: &Gate<T, C>, comm: Arc<C>) -> Self {
        assert_eq!(row_gate.ranks(), col_gate.ranks(), "gates disagree on neighbours");
        Self::new(
            comm,
            row_gate.ranks().to_vec(),
            row_gate.mirrors().to_vec(),
            col_gate.mirrors().to_vec(),
        )
    }

    pub fn set_statistics(&mut self, stats: Arc<SyncStatistics>) {
        self.stats = Some(stats);
    }

    pub fn is_initialized(&self) -> bool {
        self.layout.is_some()
    }

    /// `true` if `matrix` has the layout seen by `init`.
    pub fn is_compatible(&self, matrix: &CsrMatrix<T>) -> bool {
        self.layout
            .as_ref()
            .is_some_and(|l| l.same_layout(matrix))
    }

    /// Agree on buffer patterns with every neighbour. Call once per structure.
    pub fn init(&mut self, matrix: &CsrMatrix<T>) -> Result<(), MeshGateError> {
        assert!(!self.is_initialized(), "SynchMatrix::init called twice");
        let comm = &*self.comm;
        let n = self.ranks.len();
        self.send_bufs = self.mirrors.iter().map(|m| m.create_buffer(matrix)).collect();

        // phase 1: dimensions
        let payloads: Vec<Vec<u8>> = self
            .send_bufs
            .iter()
            .map(|b| cast_slice(&[WireDims::new(b.rows(), b.columns(), b.used_elements())]).to_vec())
            .collect();
        let lens = vec![WireDims::SIZE; n];
        let dims = exchange(comm, &self.ranks, MATRIX_TAG.offset(0), &lens, &payloads)?;
        let dims: Vec<(usize, usize, usize)> = dims
            .iter()
            .zip(&self.ranks)
            .map(|(b, &r)| {
                WireDims::decode(b).map(|d| d.get()).ok_or_else(|| malformed(r, "dims"))
            })
            .collect::<Result<_, _>>()?;

        // phase 2: row pointers
        let payloads: Vec<Vec<u8>> = self
            .send_bufs
            .iter()
            .map(|b| encode_indices(b.row_ptr()))
            .collect();
        let lens: Vec<usize> = dims.iter().map(|&(rows, _, _)| 8 * (rows + 1)).collect();
        let row_ptrs = exchange(comm, &self.ranks, MATRIX_TAG.offset(1), &lens, &payloads)?;

        // phase 3: column indices
        let payloads: Vec<Vec<u8>> = self
            .send_bufs
            .iter()
            .map(|b| encode_indices(b.col_ind()))
            .collect();
        let lens: Vec<usize> = dims.iter().map(|&(_, _, nnz)| 8 * nnz).collect();
        let col_inds = exchange(comm, &self.ranks, MATRIX_TAG.offset(2), &lens, &payloads)?;

        let mut recv_bufs = Vec::with_capacity(n);
        for (i, &(rows, cols, nnz)) in dims.iter().enumerate() {
            let rank = self.ranks[i];
            let row_ptr = decode_indices(&row_ptrs[i]);
            let col_ind = decode_indices(&col_inds[i]);
            let mine = &self.mirrors[i];
            if rows != mine.row_mirror().num_indices() || cols != mine.col_mirror().num_indices() {
                return Err(malformed(rank, "buffer dimensions do not match the mirrors"));
            }
            let consistent = row_ptr.len() == rows + 1
                && row_ptr.first() == Some(&0)
                && row_ptr.last() == Some(&nnz)
                && row_ptr.windows(2).all(|w| w[0] <= w[1])
                && col_ind.len() == nnz
                && col_ind.iter().all(|&c| c < cols)
                && (0..rows).all(|r| {
                    col_ind[row_ptr[r]..row_ptr[r + 1]]
                        .windows(2)
                        .all(|w| w[0] < w[1])
                });
            if !consistent {
                return Err(malformed(rank, "inconsistent buffer structure"));
            }
            recv_bufs.push(CsrMatrix::from_parts(
                rows,
                cols,
                row_ptr,
                col_ind,
                vec![T::zero(); nnz],
            ));
        }
        self.recv_bufs = recv_bufs;
        self.layout = Some(matrix.clone_with(CloneMode::Layout));
        Ok(())
    }

    /// Add every neighbour's contribution to `matrix` (type-0 → type-1).
    pub fn exec(&mut self, matrix: &CsrMatrix<T>) -> Result<(), MeshGateError> {
        assert!(self.is_initialized(), "SynchMatrix::exec before init");
        debug_assert!(
            self.is_compatible(matrix),
            "matrix layout changed since SynchMatrix::init"
        );
        let comm = &*self.comm;
        let tag = MATRIX_TAG.offset(3).as_u16();
        let mut recv_reqs = RequestVector::with_capacity(self.ranks.len());
        for (&rank, buf) in self.ranks.iter().zip(&self.recv_bufs) {
            let mut bytes = vec![0u8; buf.used_elements() * size_of::<T>()];
            recv_reqs.push(comm.irecv(rank, tag, &mut bytes));
        }
        let mut send_reqs = RequestVector::with_capacity(self.ranks.len());
        let mut sent = 0;
        for ((&rank, mirror), buf) in self.ranks.iter().zip(&self.mirrors).zip(&self.send_bufs) {
            mirror.gather(buf, matrix);
            let vals = buf.values();
            let bytes = cast_slice(vals.as_slice());
            sent += bytes.len();
            send_reqs.push(comm.isend(rank, tag, bytes));
        }
        let mut received = 0;
        let mut first_err = None;
        while let Some((i, data)) = recv_reqs.wait_any() {
            let rank = self.ranks[i];
            let buf = &self.recv_bufs[i];
            let expected = buf.used_elements() * size_of::<T>();
            match data {
                Some(bytes) if bytes.len() == expected => {
                    received += bytes.len();
                    buf.values_mut().copy_from_slice(&pod_vec_from::<T>(&bytes));
                    self.mirrors[i].scatter_axpy(matrix, buf, T::one());
                }
                Some(bytes) => {
                    first_err.get_or_insert(MeshGateError::BufferSizeMismatch {
                        neighbor: rank,
                        expected,
                        got: bytes.len(),
                    });
                }
                None => {
                    first_err.get_or_insert(MeshGateError::CommError {
                        neighbor: rank,
                        source: CommErrorKind::NoPayload,
                    });
                }
            }
        }
        // always drain sends
        send_reqs.wait_all();
        if let Some(stats) = &self.stats {
            stats.record_matrix_sync(sent, received);
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn malformed(rank: usize, what: &str) -> MeshGateError {
    MeshGateError::CommError {
        neighbor: rank,
        source: CommErrorKind::Malformed(what.to_string()),
    }
}

/// Post all receives, then all sends, then wait; returns one payload per neighbour.
fn exchange<C: Communicator>(
    comm: &C,
    ranks: &[usize],
    tag: CommTag,
    recv_lens: &[usize],
    payloads: &[Vec<u8>],
) -> Result<Vec<Vec<u8>>, MeshGateError> {
    let tag = tag.as_u16();
    let mut recvs = Vec::with_capacity(ranks.len());
    for (&rank, &len) in ranks.iter().zip(recv_lens) {
        let mut buf = vec![0u8; len];
        recvs.push(comm.irecv(rank, tag, &mut buf));
    }
    let mut sends = Vec::with_capacity(ranks.len());
    for (&rank, p) in ranks.iter().zip(payloads) {
        sends.push(comm.isend(rank, tag, p));
    }
    let mut out = Vec::with_capacity(ranks.len());
    let mut first_err = None;
    for ((h, &rank), &len) in recvs.into_iter().zip(ranks).zip(recv_lens) {
        match h.wait() {
            Some(b) if b.len() == len => out.push(b),
            Some(b) => {
                first_err.get_or_insert(MeshGateError::BufferSizeMismatch {
                    neighbor: rank,
                    expected: len,
                    got: b.len(),
                });
                out.push(Vec::new());
            }
            None => {
                first_err.get_or_insert(MeshGateError::CommError {
                    neighbor: rank,
                    source: CommErrorKind::NoPayload,
                });
                out.push(Vec::new());
            }
        }
    }
    for s in sends {
        let _ = s.wait();
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::Graph;
    use crate::algs::communicator::LocalUniverse;

    /// 1D chain of 4 local dofs per rank, rank 0 dof 3 == rank 1 dof 0.
    fn chain_matrix(values: f64) -> CsrMatrix<f64> {
        let lists = (0..4).map(|i: usize| (i.saturating_sub(1)..=(i + 1).min(3)).collect::<Vec<_>>());
        let a = CsrMatrix::from_graph(&Graph::from_lists(4, lists));
        a.format(values);
        a
    }

    #[test]
    fn exec_twice_adds_shared_block() {
        let out = LocalUniverse::run(2, |comm| {
            let rank = comm.rank();
            let shared = if rank == 0 { 3 } else { 0 };
            let m = VectorMirror::new(4, vec![shared]);
            let mut sm = SynchMatrix::<f64, _>::new(
                Arc::new(comm),
                vec![1 - rank],
                vec![m.clone()],
                vec![m],
            );
            let a = chain_matrix(1.0);
            sm.init(&a).unwrap();
            sm.exec(&a).unwrap();
            let first = a.value(shared, shared);
            a.format(2.0);
            assert!(sm.is_compatible(&a));
            sm.exec(&a).unwrap();
            (first, a.value(shared, shared), a.value(1, 1))
        });
        for (first, second, interior) in out {
            assert_eq!(first, 2.0);
            assert_eq!(second, 4.0);
            assert_eq!(interior, 2.0);
        }
    }
}
