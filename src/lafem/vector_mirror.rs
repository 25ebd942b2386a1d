//! Gather/scatter index map between a local vector and a neighbour buffer.

use super::{CloneMode, DenseVector, Scalar};
use crate::adjacency::Graph;
use std::sync::Arc;

/// Buffer entry `i` corresponds to local entry `indices[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMirror {
    size: usize,
    indices: Arc<[usize]>,
}

impl VectorMirror {
    /// Mirror over a local vector of length `size`.
    pub fn new(size: usize, indices: Vec<usize>) -> Self {
        assert!(
            indices.iter().all(|&i| i < size),
            "mirror index out of range 0..{size}"
        );
        Self {
            size,
            indices: indices.into(),
        }
    }

    /// Mirror that maps every local entry onto the buffer, in order.
    pub fn make_identity(size: usize) -> Self {
        Self::new(size, (0..size).collect())
    }

    /// Size of the local vector this mirror refers to.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Size of the exchange buffer.
    #[inline]
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn clone_with(&self, mode: CloneMode) -> Self {
        match mode {
            CloneMode::Shallow | CloneMode::Weak | CloneMode::Layout => self.clone(),
            CloneMode::Deep => Self {
                size: self.size,
                indices: self.indices.to_vec().into(),
            },
        }
    }

    pub fn is_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.indices, &other.indices)
    }

    pub fn create_buffer<T: Scalar>(&self) -> DenseVector<T> {
        DenseVector::new(self.num_indices())
    }

    /// `buffer[i] = vector[indices[i]]`
    pub fn gather<T: Scalar>(&self, buffer: &mut [T], vector: &[T]) {
        assert_eq!(vector.len(), self.size, "vector size mismatch");
        assert_eq!(buffer.len(), self.num_indices(), "buffer size mismatch");
        for (b, &i) in buffer.iter_mut().zip(self.indices.iter()) {
            *b = vector[i];
        }
    }

    /// `vector[indices[i]] += alpha * buffer[i]`
    pub fn scatter_axpy<T: Scalar>(&self, vector: &mut [T], buffer: &[T], alpha: T) {
        assert_eq!(vector.len(), self.size, "vector size mismatch");
        assert_eq!(buffer.len(), self.num_indices(), "buffer size mismatch");
        for (&b, &i) in buffer.iter().zip(self.indices.iter()) {
            vector[i] = vector[i] + alpha * b;
        }
    }

    /// Gather out of a dense vector into a fresh buffer.
    pub fn gather_vec<T: Scalar>(&self, vector: &DenseVector<T>) -> Vec<T> {
        let mut buf = vec![T::zero(); self.num_indices()];
        self.gather(&mut buf, &vector.elements());
        buf
    }

    pub fn scatter_axpy_vec<T: Scalar>(&self, vector: &DenseVector<T>, buffer: &[T], alpha: T) {
        self.scatter_axpy(&mut vector.elements_mut(), buffer, alpha);
    }

    /// Buffer → local incidence (one image per buffer entry).
    pub fn gather_dual_graph(&self) -> Graph {
        Graph::new(
            self.size,
            (0..=self.num_indices()).collect(),
            self.indices.to_vec(),
        )
    }

    /// Local → buffer incidence.
    pub fn scatter_dual_graph(&self) -> Graph {
        self.gather_dual_graph().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gather_then_scatter() {
        let m = VectorMirror::new(5, vec![4, 1]);
        let v = DenseVector::from_vec(vec![0.0f64, 1.0, 2.0, 3.0, 4.0]);
        let buf = m.gather_vec(&v);
        assert_eq!(buf, vec![4.0, 1.0]);
        m.scatter_axpy_vec(&v, &buf, 0.5);
        assert_eq!(v.to_vec(), vec![0.0, 1.5, 2.0, 3.0, 6.0]);
    }

    #[test]
    fn deep_clone_owns_indices() {
        let m = VectorMirror::new(3, vec![0, 2]);
        assert!(m.clone_with(CloneMode::Shallow).is_shared_with(&m));
        let d = m.clone_with(CloneMode::Deep);
        assert!(!d.is_shared_with(&m));
        assert_eq!(d, m);
    }

    #[test]
    fn dual_graphs() {
        let m = VectorMirror::new(4, vec![3, 0]);
        let g = m.gather_dual_graph();
        assert_eq!(g.image(0), &[3]);
        let s = m.scatter_dual_graph();
        assert_eq!(s.image(3), &[0]);
        assert!(s.image(1).is_empty());
    }

    #[test]
    #[should_panic(expected = "mirror index out of range")]
    fn rejects_foreign_indices() {
        let _ = VectorMirror::new(2, vec![2]);
    }

    proptest! {
        #[test]
        fn identity_gather_is_copy(v in proptest::collection::vec(-1e3f64..1e3, 0..40)) {
            let m = VectorMirror::make_identity(v.len());
            let dv = DenseVector::from_vec(v.clone());
            prop_assert_eq!(m.gather_vec(&dv), v);
        }
    }
}
