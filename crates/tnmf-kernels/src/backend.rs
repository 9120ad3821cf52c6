//! Transform backend abstraction
//!
//! A backend realizes three linear operators over a [`ProblemGeometry`]:
//!
//! | Operation | Operands | Output |
//! |-----------|----------|--------|
//! | [`forward_convolve`](TransformBackend::forward_convolve) | dictionary, activations | `[N, C, *n]` |
//! | [`gradient_wrt_activation`](TransformBackend::gradient_wrt_activation) | dictionary, signal `[N, C, *n]` | activation shape |
//! | [`gradient_wrt_atom`](TransformBackend::gradient_wrt_atom) | activations, signal `[N, C, *n]` | dictionary shape |
//!
//! The two gradients are the adjoints of the forward operator with respect to
//! its second and first argument. Backends differ only in how they evaluate
//! these operators; their results agree to floating-point tolerance.

use crate::cache::CacheStats;
use crate::direct::DirectBackend;
use crate::spectral::{BatchedFftBackend, FftBackend};
use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use std::sync::Arc;
use tnmf_core::{BackendKind, Boundary, ProblemGeometry, TnmfError, TnmfResult, VersionedTensor};

/// Convolution engine used by the optimizer
pub trait TransformBackend: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Boundary modes this backend can realize
    fn supported_boundaries(&self) -> &'static [Boundary];

    fn supports(&self, boundary: Boundary) -> bool {
        self.supported_boundaries().contains(&boundary)
    }

    /// `R[n, c] = Σ_k W[k, c] ∗ H[n, k(, c)]`
    fn forward_convolve(
        &self,
        atoms: &VersionedTensor,
        activations: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>>;

    /// `G[n, k(, c)] = Σ_c W[k, c] ⋆ Y[n, c]`, cropped to the activation extent
    fn gradient_wrt_activation(
        &self,
        atoms: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>>;

    /// `G[k, c] = Σ_n H[n, k(, c)] ⋆ Y[n, c]`, cropped to the atom extent
    fn gradient_wrt_atom(
        &self,
        activations: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>>;

    /// Called once at the start of every optimizer iteration
    fn begin_iteration(&self) {}

    /// Transform cache statistics, if this backend caches
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Fail with [`TnmfError::UnsupportedMode`] unless `backend` realizes `boundary`
pub fn ensure_supported(backend: &dyn TransformBackend, boundary: Boundary) -> TnmfResult<()> {
    if backend.supports(boundary) {
        Ok(())
    } else {
        Err(TnmfError::unsupported_mode(
            backend.name(),
            boundary.to_string(),
        ))
    }
}

/// Construct the backend for `kind`
///
/// # Examples
///
/// ```
/// use tnmf_core::{BackendKind, Boundary};
/// use tnmf_kernels::create_backend;
///
/// let backend = create_backend(BackendKind::Direct, false);
/// assert_eq!(backend.name(), "direct");
/// assert!(backend.supports(Boundary::Circular));
/// ```
pub fn create_backend(kind: BackendKind, cache_transforms: bool) -> Arc<dyn TransformBackend> {
    match kind {
        BackendKind::Direct => Arc::new(DirectBackend::new()),
        BackendKind::Fft => Arc::new(FftBackend::scirs2(cache_transforms)),
        BackendKind::BatchedFft => Arc::new(BatchedFftBackend::planned(cache_transforms)),
    }
}

/// Check the operands of a forward convolution against the geometry
pub(crate) fn check_forward(
    backend: &dyn TransformBackend,
    op: &str,
    atoms: &VersionedTensor,
    activations: &VersionedTensor,
    geometry: &ProblemGeometry,
) -> TnmfResult<()> {
    ensure_supported(backend, geometry.boundary())?;
    geometry.check_shape(op, "dictionary", &geometry.dictionary_shape(), atoms.shape())?;
    geometry.check_shape(
        op,
        "activations",
        &geometry.activation_shape(),
        activations.shape(),
    )
}

/// Check the operands of an activation gradient against the geometry
pub(crate) fn check_activation_gradient(
    backend: &dyn TransformBackend,
    op: &str,
    atoms: &VersionedTensor,
    signal: &VersionedTensor,
    geometry: &ProblemGeometry,
) -> TnmfResult<()> {
    ensure_supported(backend, geometry.boundary())?;
    geometry.check_shape(op, "dictionary", &geometry.dictionary_shape(), atoms.shape())?;
    geometry.check_shape(op, "signal", &geometry.observation_shape(), signal.shape())
}

/// Check the operands of an atom gradient against the geometry
pub(crate) fn check_atom_gradient(
    backend: &dyn TransformBackend,
    op: &str,
    activations: &VersionedTensor,
    signal: &VersionedTensor,
    geometry: &ProblemGeometry,
) -> TnmfResult<()> {
    ensure_supported(backend, geometry.boundary())?;
    geometry.check_shape(
        op,
        "activations",
        &geometry.activation_shape(),
        activations.shape(),
    )?;
    geometry.check_shape(op, "signal", &geometry.observation_shape(), signal.shape())
}

/// Assemble a row-major buffer into an array
pub(crate) fn into_array(op: &str, shape: Vec<usize>, data: Vec<f64>) -> TnmfResult<ArrayD<f64>> {
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| TnmfError::shape_mismatch(op, shape.clone(), vec![len], e.to_string()))
}
