//! Versioned dense tensor
//!
//! [`VersionedTensor`] wraps a dynamic-rank array with a process-unique
//! identity and a mutation counter. Transform caches key their entries on
//! [`TensorKey`] = (identity, version), so a cached spectrum can only be served
//! for the exact tensor state that produced it. Every mutating method bumps the
//! version; there is no way to obtain `&mut` access to the data without doing so.

use crate::error::{TnmfError, TnmfResult};
use scirs2_core::ndarray_ext::{Array, ArrayD, ArrayView, ArrayViewMut, IxDyn};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique tensor identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(u64);

impl TensorId {
    fn fresh() -> Self {
        TensorId(NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric identity
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Identity of one tensor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorKey {
    pub id: TensorId,
    pub version: u64,
}

/// Dense `f64` tensor with identity and version tracking
///
/// Data is always kept in standard (row-major) layout, so the flat slice
/// returned by [`as_slice`](Self::as_slice) follows logical index order.
///
/// # Examples
///
/// ```
/// use tnmf_core::VersionedTensor;
///
/// let mut tensor = VersionedTensor::zeros(&[2, 3]);
/// let before = tensor.key();
///
/// tensor.update(|mut view| view.fill(1.0));
///
/// assert_eq!(tensor.key().id, before.id);
/// assert_eq!(tensor.version(), before.version + 1);
/// assert_eq!(tensor.sum(), 6.0);
/// ```
#[derive(Debug)]
pub struct VersionedTensor {
    data: ArrayD<f64>,
    id: TensorId,
    version: u64,
}

impl Clone for VersionedTensor {
    /// Clones get a fresh identity: two tensors that diverge after cloning must
    /// never share cache entries.
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl VersionedTensor {
    /// Wrap an existing array, converting it to standard layout if needed
    pub fn new(array: ArrayD<f64>) -> Self {
        let data = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Self {
            data,
            id: TensorId::fresh(),
            version: 0,
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(Array::zeros(IxDyn(shape)))
    }

    /// Create a tensor filled with a constant
    pub fn from_elem(shape: &[usize], value: f64) -> Self {
        Self::new(Array::from_elem(IxDyn(shape), value))
    }

    /// Create a tensor from row-major data
    ///
    /// # Errors
    ///
    /// Returns [`TnmfError::ShapeMismatch`] when `vec.len()` differs from the
    /// product of `shape`.
    pub fn from_vec(vec: Vec<f64>, shape: &[usize]) -> TnmfResult<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            return Err(TnmfError::shape_mismatch(
                "VersionedTensor::from_vec",
                vec![total],
                vec![vec.len()],
                format!("shape {:?} requires {} elements", shape, total),
            ));
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec).map_err(|e| {
            TnmfError::shape_mismatch(
                "VersionedTensor::from_vec",
                shape.to_vec(),
                vec![total],
                e.to_string(),
            )
        })?;
        Ok(Self::new(array))
    }

    /// Identity of this tensor (stable across mutations)
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Number of mutations applied since construction
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Cache key of the current state
    pub fn key(&self) -> TensorKey {
        TensorKey {
            id: self.id,
            version: self.version,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable view of the data
    pub fn view(&self) -> ArrayView<'_, f64, IxDyn> {
        self.data.view()
    }

    /// Borrow the underlying array
    pub fn array(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Flat row-major data
    ///
    /// Standard layout is an invariant of this type; the empty fallback is never
    /// taken in practice and would be rejected by every length check downstream.
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice().unwrap_or(&[])
    }

    /// Apply an in-place mutation and bump the version
    pub fn update<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(ArrayViewMut<'_, f64, IxDyn>) -> R,
    {
        self.version += 1;
        f(self.data.view_mut())
    }

    /// Mutable flat data; bumps the version
    pub fn as_slice_mut(&mut self) -> &mut [f64] {
        self.version += 1;
        self.data.as_slice_mut().unwrap_or(&mut [])
    }

    /// Replace the contents with an array of identical shape; bumps the version
    pub fn assign(&mut self, values: ArrayD<f64>) -> TnmfResult<()> {
        if values.shape() != self.shape() {
            return Err(TnmfError::shape_mismatch(
                "VersionedTensor::assign",
                self.shape().to_vec(),
                values.shape().to_vec(),
                "replacement must keep the tensor shape",
            ));
        }
        self.data = if values.is_standard_layout() {
            values
        } else {
            values.as_standard_layout().into_owned()
        };
        self.version += 1;
        Ok(())
    }

    /// Copy of the data as an owned array
    pub fn to_array(&self) -> ArrayD<f64> {
        self.data.clone()
    }

    /// Consume the tensor, returning its data
    pub fn into_array(self) -> ArrayD<f64> {
        self.data
    }

    /// Sum of all entries
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Frobenius norm
    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Smallest entry (`+∞` for an empty tensor)
    pub fn min_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// True when every entry is finite and ≥ 0
    pub fn is_nonnegative(&self) -> bool {
        self.data.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_shape_check() {
        let ok = VersionedTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert!(ok.is_ok());

        let err = VersionedTensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = VersionedTensor::zeros(&[3]);
        let b = VersionedTensor::zeros(&[3]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_gets_fresh_identity() {
        let a = VersionedTensor::from_elem(&[4], 2.0);
        let b = a.clone();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_every_mutation_bumps_version() {
        let mut t = VersionedTensor::zeros(&[2, 2]);
        assert_eq!(t.version(), 0);

        t.update(|mut v| v.fill(1.0));
        assert_eq!(t.version(), 1);

        t.as_slice_mut()[0] = 5.0;
        assert_eq!(t.version(), 2);

        t.assign(Array::from_elem(IxDyn(&[2, 2]), 3.0)).unwrap();
        assert_eq!(t.version(), 3);
        assert_eq!(t.sum(), 12.0);
    }

    #[test]
    fn test_assign_rejects_new_shape() {
        let mut t = VersionedTensor::zeros(&[2, 2]);
        let err = t.assign(Array::zeros(IxDyn(&[4]))).unwrap_err();
        assert!(err.is_shape_mismatch());
        assert_eq!(t.version(), 0);
    }

    #[test]
    fn test_non_standard_layout_is_normalized() {
        let array = Array::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .reversed_axes();
        let t = VersionedTensor::new(array);
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_nonnegativity_check() {
        let t = VersionedTensor::from_vec(vec![0.0, 1.0, 2.0], &[3]).unwrap();
        assert!(t.is_nonnegative());
        assert_eq!(t.min_value(), 0.0);

        let t = VersionedTensor::from_vec(vec![0.0, -1.0, 2.0], &[3]).unwrap();
        assert!(!t.is_nonnegative());

        let t = VersionedTensor::from_vec(vec![0.0, f64::NAN], &[2]).unwrap();
        assert!(!t.is_nonnegative());
    }
}
