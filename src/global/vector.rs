//! Local vector bound to the gate of its level.

use super::gate::Gate;
use super::synch_vec::SynchVectorTicket;
use crate::algs::communicator::Communicator;
use crate::lafem::{CloneMode, DenseVector, Scalar};

pub struct GlobalVector<'g, T: Scalar, C: Communicator> {
    gate: &'g Gate<T, C>,
    local: DenseVector<T>,
}

impl<'g, T: Scalar, C: Communicator> GlobalVector<'g, T, C> {
    pub fn new(gate: &'g Gate<T, C>, local: DenseVector<T>) -> Self {
        assert_eq!(local.size(), gate.size(), "local vector does not match the gate");
        Self { gate, local }
    }

    /// Zero vector of the gate's size.
    pub fn zeros(gate: &'g Gate<T, C>) -> Self {
        Self::new(gate, DenseVector::new(gate.size()))
    }

    pub fn gate(&self) -> &'g Gate<T, C> {
        self.gate
    }

    pub fn local(&self) -> &DenseVector<T> {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut DenseVector<T> {
        &mut self.local
    }

    pub fn into_local(self) -> DenseVector<T> {
        self.local
    }

    pub fn clone_with(&self, mode: CloneMode) -> Self {
        Self {
            gate: self.gate,
            local: self.local.clone_with(mode),
        }
    }

    pub fn from_1_to_0(&mut self) {
        self.gate.from_1_to_0(&mut self.local);
    }

    pub fn sync_0(&mut self) {
        self.gate.sync_0(&mut self.local);
    }

    pub fn sync_0_async(&mut self) -> SynchVectorTicket<'_, T, C> {
        self.gate.sync_0_async(&mut self.local)
    }

    pub fn sync_1(&mut self) {
        self.gate.sync_1(&mut self.local);
    }

    pub fn sync_1_async(&mut self) -> SynchVectorTicket<'_, T, C> {
        self.gate.sync_1_async(&mut self.local)
    }

    /// Global dot product (both vectors type-1).
    pub fn dot(&self, other: &Self) -> T {
        self.gate.dot(&self.local, &other.local)
    }

    pub fn norm2(&self) -> T {
        self.dot(self).sqrt()
    }

    pub fn max_abs_element(&self) -> T {
        self.gate.max_abs_element(&self.local)
    }
}
