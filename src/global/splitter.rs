//! Join/split between the partitioned vectors of a level and one vector on
//! the unpartitioned base mesh held by the root rank.

use super::gate::Gate;
use super::muxer::Muxer;
use crate::algs::communicator::Communicator;
use crate::lafem::{CloneMode, DenseVector, FileMode, Scalar, VectorMirror};
use crate::mesh_error::MeshGateError;
use std::path::Path;
use std::sync::Arc;

pub struct Splitter<T: Scalar, C: Communicator> {
    muxer: Muxer<T, C>,
    base_template: Option<DenseVector<T>>,
    local_size: usize,
    compiled: bool,
}

impl<T: Scalar, C: Communicator> Default for Splitter<T, C> {
    fn default() -> Self {
        Self {
            muxer: Muxer::new(),
            base_template: None,
            local_size: 0,
            compiled: false,
        }
    }
}

impl<T: Scalar, C: Communicator> Splitter<T, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Designate `root_rank` of `comm` as the I/O rank; `root_mirror` maps this
    /// rank's local vector onto the buffer it contributes.
    pub fn set_root(&mut self, comm: Arc<C>, root_rank: usize, root_mirror: VectorMirror) {
        self.muxer.set_parent(comm, root_rank, root_mirror);
    }

    /// On the root: base → patch mirror of the child with the next rank.
    pub fn push_patch(&mut self, mirror: VectorMirror) {
        self.muxer.push_child(mirror);
    }

    pub fn set_base_vector_template(&mut self, template: DenseVector<T>) {
        self.base_template = Some(template);
    }

    pub fn base_vector_template(&self) -> Option<&DenseVector<T>> {
        self.base_template.as_ref()
    }

    /// Validate the setup against the local vector layout.
    pub fn compile(&mut self, local_template: &DenseVector<T>) {
        if let Some(m) = self.muxer.parent_mirror() {
            assert_eq!(m.size(), local_template.size(), "root mirror does not match the local vector");
        }
        if self.muxer.is_parent() {
            let base = match &self.base_template {
                Some(t) => t.size(),
                None => panic!("root needs a base vector template before compile"),
            };
            let n = self.muxer.sibling_comm().map_or(1, Communicator::size);
            assert_eq!(self.muxer.num_children(), n, "root needs one patch mirror per rank");
            assert!(
                self.muxer.child_mirrors().iter().all(|m| m.size() == base),
                "patch mirror does not match the base vector"
            );
        }
        self.local_size = local_template.size();
        self.compiled = true;
    }

    pub fn is_root(&self) -> bool {
        !self.muxer.is_child() || self.muxer.is_parent()
    }

    pub fn is_single(&self) -> bool {
        self.muxer.sibling_comm().is_none_or(|c| c.size() == 1)
    }

    /// Gather a type-1 vector onto the base mesh; `Some` on the root only.
    pub fn join(&self, gate: &Gate<T, C>, local: &DenseVector<T>) -> Option<DenseVector<T>> {
        assert!(self.compiled || self.is_single(), "Splitter used before compile");
        let mut tmp = local.clone_with(CloneMode::Deep);
        if self.is_single() {
            return Some(tmp);
        }
        gate.from_1_to_0(&mut tmp);
        if self.is_root() {
            let base = match &self.base_template {
                Some(t) => t.clone_with(CloneMode::Layout),
                None => panic!("Splitter::join on the root without a base vector template"),
            };
            self.muxer.join(&tmp, &base);
            Some(base)
        } else {
            self.muxer.join_send(&tmp);
            None
        }
    }

    /// Distribute a base vector (read on the root only) into `local`.
    pub fn split(&self, local: &DenseVector<T>, base: Option<&DenseVector<T>>) {
        if self.is_single() {
            match base {
                Some(b) => local.copy_from(b),
                None => panic!("Splitter::split on a single process needs the base vector"),
            }
            return;
        }
        assert!(self.compiled, "Splitter used before compile");
        if self.is_root() {
            match base {
                Some(b) => self.muxer.split(local, b),
                None => panic!("Splitter::split on the root needs the base vector"),
            }
        } else {
            self.muxer.split_recv(local);
        }
    }

    /// `split` into a fresh vector with the compiled local layout.
    pub fn split_as_global(&self, base: Option<&DenseVector<T>>) -> DenseVector<T> {
        let n = if self.compiled {
            self.local_size
        } else {
            base.map_or(0, DenseVector::size)
        };
        let local = DenseVector::new(n);
        self.split(&local, base);
        local
    }

    /// `join` followed by a write on the root.
    pub fn join_write_out(
        &self,
        gate: &Gate<T, C>,
        local: &DenseVector<T>,
        mode: FileMode,
        path: impl AsRef<Path>,
    ) -> Result<(), MeshGateError> {
        match self.join(gate, local) {
            Some(base) => base.write_out(mode, path),
            None => Ok(()),
        }
    }

    /// Read on the root followed by `split`.
    ///
    /// A read failure is reported on the root only; callers abort the run
    /// (see [`crate::util::runtime::or_abort`]) since the other ranks are
    /// already waiting for their part.
    pub fn split_read_from(
        &self,
        local: &DenseVector<T>,
        mode: FileMode,
        path: impl AsRef<Path>,
    ) -> Result<(), MeshGateError> {
        if self.is_root() {
            let base = DenseVector::<T>::read_from(mode, path)?;
            if let Some(t) = &self.base_template {
                if t.size() != base.size() {
                    return Err(MeshGateError::VectorFormat(format!(
                        "base vector has {} entries, expected {}",
                        base.size(),
                        t.size()
                    )));
                }
            }
            self.split(local, Some(&base));
        } else {
            self.split(local, None);
        }
        Ok(())
    }
}
