//! CSR sparse matrix with shared structure and lockable values.

use super::{CloneMode, DenseVector, Scalar};
use crate::adjacency::Graph;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

#[derive(Debug)]
pub struct CsrMatrix<T: Scalar> {
    rows: usize,
    columns: usize,
    row_ptr: Arc<[usize]>,
    col_ind: Arc<[usize]>,
    val: Arc<RwLock<Vec<T>>>,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Zero matrix with the pattern of `graph` (column indices sorted per row).
    pub fn from_graph(graph: &Graph) -> Self {
        let mut g = graph.clone();
        g.sort_indices();
        let nnz = g.num_indices();
        Self {
            rows: g.num_domain(),
            columns: g.num_image(),
            row_ptr: g.domain_ptr().into(),
            col_ind: g.image_idx().into(),
            val: Arc::new(RwLock::new(vec![T::zero(); nnz])),
        }
    }

    /// Assemble from raw arrays; columns must be sorted within each row.
    pub fn from_parts(
        rows: usize,
        columns: usize,
        row_ptr: Vec<usize>,
        col_ind: Vec<usize>,
        val: Vec<T>,
    ) -> Self {
        assert_eq!(row_ptr.len(), rows + 1, "row_ptr length mismatch");
        assert_eq!(col_ind.len(), val.len(), "col_ind/val length mismatch");
        assert_eq!(row_ptr.last().copied(), Some(col_ind.len()));
        for r in 0..rows {
            let cols = &col_ind[row_ptr[r]..row_ptr[r + 1]];
            assert!(cols.windows(2).all(|w| w[0] < w[1]), "row {r} not sorted");
            assert!(cols.iter().all(|&c| c < columns), "column out of range");
        }
        Self {
            rows,
            columns,
            row_ptr: row_ptr.into(),
            col_ind: col_ind.into(),
            val: Arc::new(RwLock::new(val)),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn used_elements(&self) -> usize {
        self.col_ind.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_ind(&self) -> &[usize] {
        &self.col_ind
    }

    pub fn values(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.val.read()
    }

    pub fn values_mut(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.val.write()
    }

    /// Sparsity pattern as a row → column graph.
    pub fn graph(&self) -> Graph {
        Graph::new(self.columns, self.row_ptr.to_vec(), self.col_ind.to_vec())
    }

    /// Position of `(r, c)` in the value array.
    pub fn position(&self, r: usize, c: usize) -> Option<usize> {
        let lo = self.row_ptr[r];
        let cols = &self.col_ind[lo..self.row_ptr[r + 1]];
        cols.binary_search(&c).ok().map(|k| lo + k)
    }

    /// Entry `(r, c)`, zero outside the pattern.
    pub fn value(&self, r: usize, c: usize) -> T {
        self.position(r, c)
            .map(|k| self.val.read()[k])
            .unwrap_or_else(T::zero)
    }

    /// `A[r, c] += v`; the entry must be part of the pattern.
    pub fn add(&self, r: usize, c: usize, v: T) {
        let k = self
            .position(r, c)
            .unwrap_or_else(|| panic!("entry ({r}, {c}) outside the sparsity pattern"));
        let mut val = self.val.write();
        val[k] = val[k] + v;
    }

    pub fn format(&self, value: T) {
        self.val.write().fill(value);
    }

    pub fn clone_with(&self, mode: CloneMode) -> Self {
        let val = match mode {
            CloneMode::Shallow => Arc::clone(&self.val),
            CloneMode::Weak => Arc::new(RwLock::new(self.val.read().clone())),
            CloneMode::Layout => Arc::new(RwLock::new(vec![T::zero(); self.used_elements()])),
            CloneMode::Deep => {
                return Self {
                    rows: self.rows,
                    columns: self.columns,
                    row_ptr: self.row_ptr.to_vec().into(),
                    col_ind: self.col_ind.to_vec().into(),
                    val: Arc::new(RwLock::new(self.val.read().clone())),
                };
            }
        };
        Self {
            rows: self.rows,
            columns: self.columns,
            row_ptr: Arc::clone(&self.row_ptr),
            col_ind: Arc::clone(&self.col_ind),
            val,
        }
    }

    pub fn is_values_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.val, &other.val)
    }

    pub fn is_structure_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.row_ptr, &other.row_ptr) && Arc::ptr_eq(&self.col_ind, &other.col_ind)
    }

    /// Same dimensions and pattern (by content).
    pub fn same_layout(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.columns == other.columns
            && (self.is_structure_shared_with(other)
                || (self.row_ptr == other.row_ptr && self.col_ind == other.col_ind))
    }

    /// `y = A x`
    pub fn apply(&self, y: &DenseVector<T>, x: &DenseVector<T>) {
        let xs = x.elements();
        assert_eq!(xs.len(), self.columns, "x size mismatch");
        let mut ys = y.elements_mut();
        assert_eq!(ys.len(), self.rows, "y size mismatch");
        let val = self.val.read();
        for (r, yr) in ys.iter_mut().enumerate() {
            let (lo, hi) = (self.row_ptr[r], self.row_ptr[r + 1]);
            *yr = (lo..hi).map(|k| val[k] * xs[self.col_ind[k]]).sum();
        }
    }
}
