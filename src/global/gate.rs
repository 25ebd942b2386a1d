//! Gate: neighbour mirrors plus frequency vector for one mesh level.
//!
//! A *type-1* vector holds identical values for a shared DOF on every owning
//! rank; a *type-0* vector holds a partition of unity of that value. The gate
//! converts between both (`from_1_to_0`, `sync_0`, `sync_1`) and provides
//! reductions over the whole communicator.

use super::synch_scal::SynchScalarTicket;
use super::synch_vec::SynchVectorTicket;
use crate::algs::communicator::{Communicator, ReduceOp};
use crate::lafem::{CloneMode, DenseVector, Scalar, VectorMirror};
use crate::util::statistics::SyncStatistics;
use std::sync::Arc;

pub struct Gate<T: Scalar, C: Communicator> {
    comm: Option<Arc<C>>,
    ranks: Vec<usize>,
    mirrors: Vec<VectorMirror>,
    freqs: DenseVector<T>,
    compiled: bool,
    stats: Option<Arc<SyncStatistics>>,
}

impl<T: Scalar, C: Communicator> Gate<T, C> {
    pub fn new(comm: Option<Arc<C>>) -> Self {
        Self {
            comm,
            ranks: Vec::new(),
            mirrors: Vec::new(),
            freqs: DenseVector::default(),
            compiled: false,
            stats: None,
        }
    }

    pub fn with_comm(comm: Arc<C>) -> Self {
        Self::new(Some(comm))
    }

    pub fn comm(&self) -> Option<&C> {
        self.comm.as_deref()
    }

    pub fn comm_arc(&self) -> Option<&Arc<C>> {
        self.comm.as_ref()
    }

    pub fn set_statistics(&mut self, stats: Arc<SyncStatistics>) {
        self.stats = Some(stats);
    }

    /// Register a neighbour relation; only allowed before `compile`.
    pub fn push(&mut self, rank: usize, mirror: VectorMirror) {
        assert!(!self.compiled, "Gate::push after compile");
        self.ranks.push(rank);
        self.mirrors.push(mirror);
    }

    /// Compute the frequency vector in fresh storage laid out like `template`.
    ///
    /// The template's values are left untouched, so a shallow clone of a
    /// live vector may be passed.
    pub fn compile(&mut self, template: DenseVector<T>) {
        assert!(!self.compiled, "Gate::compile called twice");
        let freqs = template.clone_with(CloneMode::Layout);
        let n = freqs.size();
        freqs.format(T::one());
        for mirror in &self.mirrors {
            assert_eq!(mirror.size(), n, "mirror does not match the template size");
            let ones = vec![T::one(); mirror.num_indices()];
            mirror.scatter_axpy_vec(&freqs, &ones, T::one());
        }
        freqs.component_invert(T::one());
        self.freqs = freqs;
        self.compiled = true;
        log::trace!(
            "gate compiled: size {n}, {} neighbour(s) {:?}",
            self.ranks.len(),
            self.ranks
        );
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Local vector size this gate works on.
    pub fn size(&self) -> usize {
        self.freqs.size()
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    pub fn mirrors(&self) -> &[VectorMirror] {
        &self.mirrors
    }

    /// `1 / multiplicity` per local DOF.
    pub fn freqs(&self) -> &DenseVector<T> {
        &self.freqs
    }

    fn check(&self, v: &DenseVector<T>) {
        assert!(self.compiled, "gate used before compile");
        assert_eq!(v.size(), self.size(), "vector size does not match the gate");
    }

    /// Type-1 → type-0: multiply by the frequencies.
    pub fn from_1_to_0(&self, v: &mut DenseVector<T>) {
        self.check(v);
        if !self.ranks.is_empty() {
            v.component_product(&self.freqs);
        }
    }

    /// Sum type-0 contributions across all owners; result is type-1.
    pub fn sync_0(&self, v: &mut DenseVector<T>) {
        self.sync_0_async(v).wait();
    }

    pub fn sync_0_async<'a>(&'a self, v: &'a mut DenseVector<T>) -> SynchVectorTicket<'a, T, C> {
        self.check(v);
        SynchVectorTicket::new(
            v,
            self.comm.as_deref(),
            &self.ranks,
            &self.mirrors,
            self.stats.as_deref(),
        )
    }

    /// Re-synchronise a type-1 vector (`from_1_to_0` then `sync_0`).
    pub fn sync_1(&self, v: &mut DenseVector<T>) {
        self.sync_1_async(v).wait();
    }

    pub fn sync_1_async<'a>(&'a self, v: &'a mut DenseVector<T>) -> SynchVectorTicket<'a, T, C> {
        self.from_1_to_0(v);
        self.sync_0_async(v)
    }

    fn reduce(&self, x: T, op: ReduceOp, sqrt: bool) -> SynchScalarTicket<T, C> {
        if let Some(stats) = &self.stats {
            stats.record_reduction();
        }
        SynchScalarTicket::new(self.comm.as_deref(), x, op, sqrt)
    }

    pub fn sum_async(&self, x: T) -> SynchScalarTicket<T, C> {
        self.reduce(x, ReduceOp::Sum, false)
    }

    pub fn sum(&self, x: T) -> T {
        self.sum_async(x).wait()
    }

    pub fn min_async(&self, x: T) -> SynchScalarTicket<T, C> {
        self.reduce(x, ReduceOp::Min, false)
    }

    pub fn min(&self, x: T) -> T {
        self.min_async(x).wait()
    }

    pub fn max_async(&self, x: T) -> SynchScalarTicket<T, C> {
        self.reduce(x, ReduceOp::Max, false)
    }

    pub fn max(&self, x: T) -> T {
        self.max_async(x).wait()
    }

    /// `sqrt(sum_r x_r^2)` for local norms `x_r`.
    pub fn norm2_async(&self, x: T) -> SynchScalarTicket<T, C> {
        self.reduce(x * x, ReduceOp::Sum, true)
    }

    pub fn norm2(&self, x: T) -> T {
        self.norm2_async(x).wait()
    }

    /// Global dot product of two type-1 vectors, counting shared DOFs once.
    pub fn dot_async(&self, x: &DenseVector<T>, y: &DenseVector<T>) -> SynchScalarTicket<T, C> {
        self.check(x);
        self.check(y);
        let local = if self.ranks.is_empty() {
            x.dot(y)
        } else {
            self.freqs.triple_dot(x, y)
        };
        self.sum_async(local)
    }

    pub fn dot(&self, x: &DenseVector<T>, y: &DenseVector<T>) -> T {
        self.dot_async(x, y).wait()
    }

    pub fn max_abs_element_async(&self, v: &DenseVector<T>) -> SynchScalarTicket<T, C> {
        self.check(v);
        self.max_async(v.max_abs_element())
    }

    pub fn max_abs_element(&self, v: &DenseVector<T>) -> T {
        self.max_abs_element_async(v).wait()
    }

    pub fn min_abs_element_async(&self, v: &DenseVector<T>) -> SynchScalarTicket<T, C> {
        self.check(v);
        self.min_async(v.min_abs_element())
    }

    pub fn min_abs_element(&self, v: &DenseVector<T>) -> T {
        self.min_abs_element_async(v).wait()
    }

    pub fn max_element_async(&self, v: &DenseVector<T>) -> SynchScalarTicket<T, C> {
        self.check(v);
        self.max_async(v.max_element())
    }

    pub fn max_element(&self, v: &DenseVector<T>) -> T {
        self.max_element_async(v).wait()
    }

    pub fn min_element_async(&self, v: &DenseVector<T>) -> SynchScalarTicket<T, C> {
        self.check(v);
        self.min_async(v.min_element())
    }

    pub fn min_element(&self, v: &DenseVector<T>) -> T {
        self.min_element_async(v).wait()
    }
}
