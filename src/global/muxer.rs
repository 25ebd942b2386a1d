//! Many-to-one transfer between sibling ranks and their parent.
//!
//! Every member of a sibling communicator is a child; the one whose sibling rank
//! equals `parent_rank` is also the parent and owns one mirror per child
//! (indexed by sibling rank) into its own, coarser vector.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::request::RequestVector;
use crate::algs::wire::{cast_slice, pod_vec_from};
use crate::lafem::{DenseVector, Scalar, VectorMirror};
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::Arc;

const JOIN_TAG: CommTag = CommTag::new(0x5300);
const SPLIT_TAG: CommTag = CommTag::new(0x5301);

pub struct Muxer<T: Scalar, C: Communicator> {
    sibling_comm: Option<Arc<C>>,
    parent_rank: usize,
    parent_mirror: Option<VectorMirror>,
    child_mirrors: Vec<VectorMirror>,
    _t: PhantomData<T>,
}

impl<T: Scalar, C: Communicator> Default for Muxer<T, C> {
    fn default() -> Self {
        Self {
            sibling_comm: None,
            parent_rank: 0,
            parent_mirror: None,
            child_mirrors: Vec::new(),
            _t: PhantomData,
        }
    }
}

impl<T: Scalar, C: Communicator> Muxer<T, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a sibling group; `mirror` maps the local vector onto the buffer sent upwards.
    pub fn set_parent(&mut self, sibling_comm: Arc<C>, parent_rank: usize, mirror: VectorMirror) {
        assert!(parent_rank < sibling_comm.size(), "parent rank outside sibling group");
        self.sibling_comm = Some(sibling_comm);
        self.parent_rank = parent_rank;
        self.parent_mirror = Some(mirror);
    }

    /// On the parent: mirror from the parent vector to the child with the next sibling rank.
    pub fn push_child(&mut self, mirror: VectorMirror) {
        assert!(self.is_parent(), "only the parent registers child mirrors");
        self.child_mirrors.push(mirror);
    }

    pub fn sibling_comm(&self) -> Option<&C> {
        self.sibling_comm.as_deref()
    }

    pub fn is_child(&self) -> bool {
        self.sibling_comm.is_some()
    }

    pub fn is_parent(&self) -> bool {
        self.sibling_comm
            .as_ref()
            .is_some_and(|c| c.rank() == self.parent_rank)
    }

    pub fn parent_rank(&self) -> usize {
        self.parent_rank
    }

    pub fn num_children(&self) -> usize {
        self.child_mirrors.len()
    }

    pub fn child_mirrors(&self) -> &[VectorMirror] {
        &self.child_mirrors
    }

    pub fn parent_mirror(&self) -> Option<&VectorMirror> {
        self.parent_mirror.as_ref()
    }

    fn parts(&self) -> (&C, &VectorMirror) {
        match (self.sibling_comm.as_deref(), self.parent_mirror.as_ref()) {
            (Some(c), Some(m)) => (c, m),
            _ => panic!("muxer used without a sibling communicator"),
        }
    }

    fn check_parent(&self, comm: &C) {
        assert!(self.is_parent(), "operation only valid on the parent");
        assert_eq!(
            self.child_mirrors.len(),
            comm.size(),
            "parent needs one child mirror per sibling"
        );
    }

    /// Parent side of `join`: `parent = sum_children scatter(child buffer)`.
    pub fn join(&self, local: &DenseVector<T>, parent: &DenseVector<T>) {
        let (comm, own) = self.parts();
        self.check_parent(comm);
        let me = comm.rank();
        let tag = JOIN_TAG.as_u16();
        let mut recvs = RequestVector::with_capacity(comm.size());
        let mut senders = Vec::with_capacity(comm.size());
        for (r, m) in self.child_mirrors.iter().enumerate().filter(|&(r, _)| r != me) {
            let mut buf = vec![0u8; m.num_indices() * size_of::<T>()];
            recvs.push(comm.irecv(r, tag, &mut buf));
            senders.push(r);
        }
        parent.format(T::zero());
        let mine = own.gather_vec(local);
        self.child_mirrors[me].scatter_axpy_vec(parent, &mine, T::one());
        while let Some((i, data)) = recvs.wait_any() {
            let r = senders[i];
            let Some(bytes) = data else {
                panic!("muxer join: no payload from sibling {r}");
            };
            let expected = self.child_mirrors[r].num_indices() * size_of::<T>();
            assert_eq!(bytes.len(), expected, "muxer join: sibling {r} sent a wrong size");
            self.child_mirrors[r].scatter_axpy_vec(parent, &pod_vec_from::<T>(&bytes), T::one());
        }
    }

    /// Child side of `join`.
    pub fn join_send(&self, local: &DenseVector<T>) {
        let (comm, own) = self.parts();
        assert!(!self.is_parent(), "the parent calls join, not join_send");
        let buf = own.gather_vec(local);
        comm.isend(self.parent_rank, JOIN_TAG.as_u16(), cast_slice(&buf))
            .wait();
    }

    /// Parent side of `split`: every child receives its part of `parent`.
    pub fn split(&self, local: &DenseVector<T>, parent: &DenseVector<T>) {
        let (comm, own) = self.parts();
        self.check_parent(comm);
        let me = comm.rank();
        let tag = SPLIT_TAG.as_u16();
        let mut sends = RequestVector::with_capacity(comm.size());
        for (r, m) in self.child_mirrors.iter().enumerate().filter(|&(r, _)| r != me) {
            let buf = m.gather_vec(parent);
            sends.push(comm.isend(r, tag, cast_slice(&buf)));
        }
        let mine = self.child_mirrors[me].gather_vec(parent);
        local.format(T::zero());
        own.scatter_axpy_vec(local, &mine, T::one());
        sends.wait_all();
    }

    /// Child side of `split`.
    pub fn split_recv(&self, local: &DenseVector<T>) {
        let (comm, own) = self.parts();
        assert!(!self.is_parent(), "the parent calls split, not split_recv");
        let mut buf = vec![0u8; own.num_indices() * size_of::<T>()];
        let Some(bytes) = comm
            .irecv(self.parent_rank, SPLIT_TAG.as_u16(), &mut buf)
            .wait()
        else {
            panic!("muxer split: no payload from parent {}", self.parent_rank);
        };
        assert_eq!(bytes.len(), buf.len(), "muxer split: parent sent a wrong size");
        local.format(T::zero());
        own.scatter_axpy_vec(local, &pod_vec_from::<T>(&bytes), T::one());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalUniverse;

    // 3 ranks, each owns 2 consecutive entries of a length-6 parent vector
    #[test]
    fn join_then_split_three_children() {
        let out = LocalUniverse::run(3, |comm| {
            let rank = comm.rank();
            let comm = Arc::new(comm);
            let mut mux = Muxer::<f64, _>::new();
            mux.set_parent(comm.clone(), 0, VectorMirror::make_identity(2));
            if rank == 0 {
                for r in 0..3 {
                    mux.push_child(VectorMirror::new(6, vec![2 * r, 2 * r + 1]));
                }
            }
            let local = DenseVector::from_vec(vec![10.0 * rank as f64, 10.0 * rank as f64 + 1.0]);
            let parent = DenseVector::new(6);
            if mux.is_parent() {
                mux.join(&local, &parent);
            } else {
                mux.join_send(&local);
            }
            let back = DenseVector::new(2);
            if mux.is_parent() {
                parent.scale(2.0);
                mux.split(&back, &parent);
            } else {
                mux.split_recv(&back);
            }
            (parent.to_vec(), back.to_vec())
        });
        assert_eq!(out[0].0, vec![0.0, 2.0, 20.0, 22.0, 40.0, 42.0]);
        assert_eq!(out[2].1, vec![40.0, 42.0]);
        assert_eq!(out[1].1, vec![20.0, 22.0]);
    }
}
