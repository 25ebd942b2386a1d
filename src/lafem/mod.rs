//! Local linear-algebra containers consumed by the sync layer.
//!
//! Containers keep their payload in shared buffers so that the four
//! [`CloneMode`]s are observable: a shallow clone aliases the original,
//! every other mode owns fresh storage (or shares only the layout).

pub mod dense_vector;
pub mod io;
pub mod matrix_mirror;
pub mod sparse_matrix_csr;
pub mod vector_mirror;

pub use dense_vector::DenseVector;
pub use io::FileMode;
pub use matrix_mirror::MatrixMirror;
pub use sparse_matrix_csr::CsrMatrix;
pub use vector_mirror::VectorMirror;

use bytemuck::Pod;
use num_traits::Float;
use std::fmt::{Debug, Display, LowerExp};

/// Floating point element type of vectors and matrices.
pub trait Scalar:
    Float + Pod + Default + Debug + Display + LowerExp + std::iter::Sum + Send + Sync + 'static
{
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// How a container is duplicated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CloneMode {
    /// Share every buffer with the source.
    Shallow,
    /// Share the layout (index arrays), copy the values.
    Weak,
    /// Copy everything.
    Deep,
    /// Share the layout, allocate zeroed values.
    Layout,
}
