//! Dense vector with a shared, lockable element buffer.

use super::{CloneMode, Scalar};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug)]
pub struct DenseVector<T: Scalar> {
    elements: Arc<RwLock<Vec<T>>>,
}

impl<T: Scalar> Default for DenseVector<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T: Scalar> DenseVector<T> {
    /// Zero vector of length `size`.
    pub fn new(size: usize) -> Self {
        Self::from_elem(size, T::zero())
    }

    pub fn from_elem(size: usize, value: T) -> Self {
        Self::from_vec(vec![value; size])
    }

    pub fn from_vec(v: Vec<T>) -> Self {
        Self {
            elements: Arc::new(RwLock::new(v)),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn elements(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.elements.read()
    }

    pub fn elements_mut(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.elements.write()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.elements.read().clone()
    }

    /// Duplicate according to `mode`; only `Shallow` aliases the buffer.
    pub fn clone_with(&self, mode: CloneMode) -> Self {
        match mode {
            CloneMode::Shallow => Self {
                elements: Arc::clone(&self.elements),
            },
            CloneMode::Weak | CloneMode::Deep => Self::from_vec(self.to_vec()),
            CloneMode::Layout => Self::new(self.size()),
        }
    }

    /// `true` if both vectors alias the same buffer.
    pub fn is_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements)
    }

    pub fn format(&self, value: T) {
        self.elements.write().fill(value);
    }

    pub fn copy_from(&self, x: &Self) {
        if self.is_shared_with(x) {
            return;
        }
        let src = x.elements();
        let mut dst = self.elements_mut();
        assert_eq!(dst.len(), src.len(), "vector size mismatch");
        dst.copy_from_slice(&src);
    }

    /// `self += alpha * x`
    pub fn axpy(&self, x: &Self, alpha: T) {
        if self.is_shared_with(x) {
            self.scale(T::one() + alpha);
            return;
        }
        let src = x.elements();
        let mut dst = self.elements_mut();
        assert_eq!(dst.len(), src.len(), "vector size mismatch");
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = *d + alpha * s;
        }
    }

    pub fn scale(&self, alpha: T) {
        for v in self.elements_mut().iter_mut() {
            *v = *v * alpha;
        }
    }

    /// `self[i] *= x[i]`
    pub fn component_product(&self, x: &Self) {
        if self.is_shared_with(x) {
            for v in self.elements_mut().iter_mut() {
                *v = *v * *v;
            }
            return;
        }
        let src = x.elements();
        let mut dst = self.elements_mut();
        assert_eq!(dst.len(), src.len(), "vector size mismatch");
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = *d * s;
        }
    }

    /// `self[i] = alpha / self[i]`
    pub fn component_invert(&self, alpha: T) {
        for v in self.elements_mut().iter_mut() {
            *v = alpha / *v;
        }
    }

    pub fn dot(&self, y: &Self) -> T {
        let a = self.elements();
        let b = y.elements();
        assert_eq!(a.len(), b.len(), "vector size mismatch");
        #[cfg(feature = "rayon")]
        {
            a.par_iter().zip(b.par_iter()).map(|(&x, &y)| x * y).sum()
        }
        #[cfg(not(feature = "rayon"))]
        {
            a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
        }
    }

    /// `sum_i self[i] * x[i] * y[i]`
    pub fn triple_dot(&self, x: &Self, y: &Self) -> T {
        let w = self.elements();
        let a = x.elements();
        let b = y.elements();
        assert!(
            w.len() == a.len() && a.len() == b.len(),
            "vector size mismatch"
        );
        w.iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(&w, (&x, &y))| w * x * y)
            .sum()
    }

    pub fn sum(&self) -> T {
        self.elements().iter().copied().sum()
    }

    pub fn norm2(&self) -> T {
        self.dot(self).sqrt()
    }

    pub fn max_abs_element(&self) -> T {
        self.fold(T::zero(), |m, v| m.max(v.abs()))
    }

    pub fn min_abs_element(&self) -> T {
        self.fold(T::infinity(), |m, v| m.min(v.abs()))
    }

    pub fn max_element(&self) -> T {
        self.fold(T::neg_infinity(), |m, v| m.max(v))
    }

    pub fn min_element(&self) -> T {
        self.fold(T::infinity(), |m, v| m.min(v))
    }

    fn fold(&self, init: T, f: impl Fn(T, T) -> T) -> T {
        self.elements().iter().fold(init, |m, &v| f(m, v))
    }
}

impl<T: Scalar> From<Vec<T>> for DenseVector<T> {
    fn from(v: Vec<T>) -> Self {
        Self::from_vec(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_clone_aliases_deep_does_not() {
        let v = DenseVector::from_vec(vec![1.0f64, 2.0, 3.0]);
        let s = v.clone_with(CloneMode::Shallow);
        let d = v.clone_with(CloneMode::Deep);
        let l = v.clone_with(CloneMode::Layout);
        assert!(s.is_shared_with(&v));
        assert!(!d.is_shared_with(&v));
        s.format(7.0);
        assert_eq!(v.to_vec(), vec![7.0; 3]);
        assert_eq!(d.to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(l.to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn aliased_operands_do_not_deadlock() {
        let v = DenseVector::from_vec(vec![2.0f64, -3.0]);
        let s = v.clone_with(CloneMode::Shallow);
        v.component_product(&s);
        assert_eq!(v.to_vec(), vec![4.0, 9.0]);
        v.axpy(&s, 1.0);
        assert_eq!(v.to_vec(), vec![8.0, 18.0]);
        v.copy_from(&s);
        assert_eq!(v.dot(&s), 64.0 + 324.0);
    }

    #[test]
    fn reductions() {
        let v = DenseVector::from_vec(vec![-4.0f64, 0.5, 3.0]);
        assert_eq!(v.max_abs_element(), 4.0);
        assert_eq!(v.min_abs_element(), 0.5);
        assert_eq!(v.max_element(), 3.0);
        assert_eq!(v.min_element(), -4.0);
        assert_eq!(v.sum(), -0.5);
        let w = DenseVector::from_vec(vec![0.5f64, 1.0, 1.0]);
        assert_eq!(w.triple_dot(&v, &v), 8.0 + 0.25 + 9.0);
    }

    #[test]
    fn invert_and_scale() {
        let v = DenseVector::from_vec(vec![2.0f32, 4.0]);
        v.component_invert(1.0);
        assert_eq!(v.to_vec(), vec![0.5, 0.25]);
        v.scale(4.0);
        assert_eq!(v.to_vec(), vec![2.0, 1.0]);
        assert!((v.norm2() - 5.0f32.sqrt()).abs() < 1e-6);
    }
}
