//! Row/column mirror pair for exchanging sparse matrix buffers.

use super::{CsrMatrix, Scalar, VectorMirror};
use crate::adjacency::Graph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixMirror {
    row: VectorMirror,
    col: VectorMirror,
}

impl MatrixMirror {
    pub fn new(row: VectorMirror, col: VectorMirror) -> Self {
        Self { row, col }
    }

    pub fn row_mirror(&self) -> &VectorMirror {
        &self.row
    }

    pub fn col_mirror(&self) -> &VectorMirror {
        &self.col
    }

    /// Buffer pattern: gather-dual(row) ∘ pattern(matrix) ∘ scatter-dual(col).
    pub fn buffer_graph<T: Scalar>(&self, matrix: &CsrMatrix<T>) -> Graph {
        assert_eq!(matrix.rows(), self.row.size(), "row mirror size mismatch");
        assert_eq!(matrix.columns(), self.col.size(), "column mirror size mismatch");
        let tmp = Graph::compose_injectify(&self.row.gather_dual_graph(), &matrix.graph());
        let mut g = Graph::compose_injectify(&tmp, &self.col.scatter_dual_graph());
        g.sort_indices();
        g
    }

    /// Zeroed buffer matrix with the exchange pattern for `matrix`.
    pub fn create_buffer<T: Scalar>(&self, matrix: &CsrMatrix<T>) -> CsrMatrix<T> {
        CsrMatrix::from_graph(&self.buffer_graph(matrix))
    }

    /// `buffer(i, j) = matrix(row[i], col[j])` over the buffer pattern.
    pub fn gather<T: Scalar>(&self, buffer: &CsrMatrix<T>, matrix: &CsrMatrix<T>) {
        let rows = self.row.indices();
        let cols = self.col.indices();
        let src = matrix.values();
        let mut dst = buffer.values_mut();
        let (ptr, ind) = (buffer.row_ptr(), buffer.col_ind());
        for (i, &r) in rows.iter().enumerate() {
            for k in ptr[i]..ptr[i + 1] {
                dst[k] = matrix
                    .position(r, cols[ind[k]])
                    .map(|p| src[p])
                    .unwrap_or_else(T::zero);
            }
        }
    }

    /// `matrix(row[i], col[j]) += alpha * buffer(i, j)` where the entry exists locally.
    pub fn scatter_axpy<T: Scalar>(&self, matrix: &CsrMatrix<T>, buffer: &CsrMatrix<T>, alpha: T) {
        let rows = self.row.indices();
        let cols = self.col.indices();
        let src = buffer.values();
        let mut dst = matrix.values_mut();
        let (ptr, ind) = (buffer.row_ptr(), buffer.col_ind());
        for (i, &r) in rows.iter().enumerate() {
            for k in ptr[i]..ptr[i + 1] {
                if let Some(p) = matrix.position(r, cols[ind[k]]) {
                    dst[p] = dst[p] + alpha * src[k];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_pattern_restricts_to_shared_block() {
        // full 3x3 pattern, shared rows/cols {2, 0}
        let a = CsrMatrix::<f64>::from_graph(&Graph::from_lists(
            3,
            vec![vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2]],
        ));
        for (k, v) in a.values_mut().iter_mut().enumerate() {
            *v = k as f64;
        }
        let m = MatrixMirror::new(
            VectorMirror::new(3, vec![2, 0]),
            VectorMirror::new(3, vec![2, 0]),
        );
        let buf = m.create_buffer(&a);
        assert_eq!((buf.rows(), buf.columns(), buf.used_elements()), (2, 2, 4));
        m.gather(&buf, &a);
        // buffer(0,0)=a(2,2)=8, buffer(0,1)=a(2,0)=6, buffer(1,0)=a(0,2)=2, buffer(1,1)=a(0,0)=0
        assert_eq!(buf.value(0, 0), 8.0);
        assert_eq!(buf.value(0, 1), 6.0);
        assert_eq!(buf.value(1, 0), 2.0);
        m.scatter_axpy(&a, &buf, 1.0);
        assert_eq!(a.value(2, 2), 16.0);
        assert_eq!(a.value(1, 1), 4.0);
    }
}
