//! # tnmf-kernels
//!
//! Convolution backends for transform-invariant non-negative factorization.
//!
//! ## Overview
//!
//! Shift-invariant NMF models every observation as a sum of atoms convolved
//! with non-negative activation maps. The optimizer only ever needs three
//! linear operators, all expressed by [`TransformBackend`]:
//!
//! - **Forward convolution**: dictionary ∗ activations → reconstruction
//! - **Activation gradient**: dictionary ⋆ signal → activation-shaped tensor
//! - **Atom gradient**: activations ⋆ signal → dictionary-shaped tensor
//!
//! **Backends:**
//! - [`DirectBackend`] - explicit shifted sums, reference implementation
//! - [`FftBackend`] - pointwise spectra via `scirs2_fft::fftn`
//! - [`BatchedFftBackend`] - planned `rustfft` transforms, lanes batched per
//!   axis, slices evaluated on the rayon pool
//!
//! **Supporting pieces:**
//! - [`boundary`] - zero-padded and circular index rules, transform lengths
//! - [`cache`] - spectra memoized on tensor identity and version
//! - [`fourier`] - the N-d transform engines
//!
//! ## Quick Start
//!
//! ```rust
//! use tnmf_core::{BackendKind, Boundary, ChannelMode, ProblemGeometry, VersionedTensor};
//! use tnmf_kernels::create_backend;
//!
//! let geometry = ProblemGeometry::new(&[1, 1, 16], 1, &[3], Boundary::Circular, ChannelMode::Shared)?;
//! let atoms = VersionedTensor::from_vec(vec![1.0, 2.0, 1.0], &[1, 1, 3])?;
//! let mut impulse = VersionedTensor::zeros(&[1, 1, 16]);
//! impulse.as_slice_mut()[5] = 1.0;
//!
//! let backend = create_backend(BackendKind::Fft, true);
//! let r = backend.forward_convolve(&atoms, &impulse, &geometry)?;
//!
//! assert!((r[[0, 0, 6]] - 2.0).abs() < 1e-12);
//! # Ok::<(), tnmf_core::TnmfError>(())
//! ```
//!
//! ## SciRS2 Integration
//!
//! Arrays, complex numbers and the rayon pool come from `scirs2-core`; the
//! reference FFT comes from `scirs2-fft`.

pub mod backend;
pub mod boundary;
pub mod cache;
pub mod direct;
pub mod fourier;
pub mod spectral;


pub use backend::{create_backend, ensure_supported, TransformBackend};
pub use boundary::{next_fast_len, transform_shape, BoundaryPolicy};
pub use cache::{CacheKey, CacheStats, TransformCache};
pub use direct::DirectBackend;
pub use fourier::{FourierTransform, PlannedFft, Scirs2Fft};
pub use spectral::{BatchedFftBackend, FftBackend, SpectralBackend, Spectra};
