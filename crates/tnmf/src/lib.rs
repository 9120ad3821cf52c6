//! # tnmf - Transform-Invariant Non-Negative Factorization
//!
//! Learns a small dictionary of non-negative atoms and non-negative activation
//! maps whose convolution reconstructs an observed signal, image or volume.
//! Because the model is a convolution, a pattern is learned once no matter
//! where it occurs.
//!
//! This is the **meta crate** that re-exports all components for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use scirs2_core::ndarray_ext::{Array, IxDyn};
//! use tnmf::prelude::*;
//!
//! let mut v = Array::<f64, _>::zeros(IxDyn(&[1, 1, 96]));
//! for start in [8, 40, 70] {
//!     for (i, x) in [0.5, 1.0, 0.5].iter().enumerate() {
//!         v[[0, 0, start + i]] = *x;
//!     }
//! }
//!
//! let factorizer = Factorizer::new(TnmfConfig::default().with_seed(0).with_max_iterations(100))?;
//! let result = factorizer.fit(&v, 1, &[3])?;
//!
//! assert_eq!(result.dictionary().shape(), &[1, 1, 3]);
//! assert_eq!(result.reconstruct()?.shape(), v.shape());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Core types ([`core`])
//!
//! Versioned tensors, problem geometry, sample layouts, mode enums and errors.
//!
//! ### Convolution backends ([`kernels`])
//!
//! Direct, FFT (`scirs2-fft`) and batched FFT (`rustfft`) implementations of
//! the forward convolution and its two adjoints, plus the transform cache.
//!
//! ```
//! use tnmf::core::BackendKind;
//! use tnmf::kernels::create_backend;
//!
//! let backend = create_backend(BackendKind::BatchedFft, true);
//! assert!(backend.cache_stats().is_some());
//! ```
//!
//! ### Factorization ([`decomp`])
//!
//! Configuration, initialization, divergences and the multiplicative-update
//! optimizer.
//!
//! ### Logging ([`tracing_support`])
//!
//! Subscriber setup for the `tracing` events the library emits.
//!
//! ## Features
//!
//! - `tracing-subscriber` (default): [`tracing_support::init_tracing`] installs a subscriber
//! - `serde`: Serialize configuration and result snapshots
//!
//! ## Examples
//!
//! See the `examples/` directory of this crate:
//! - `shift_invariant_1d`: recover a pulse shape from a 1-D signal
//! - `image_patterns_2d`: learn 2-D motifs with circular boundaries

pub use tnmf_core as core;
pub use tnmf_decomp as decomp;
pub use tnmf_kernels as kernels;

pub mod tracing_support;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tnmf::prelude::*;
    //!
    //! let config = TnmfConfig::default().with_boundary(Boundary::Circular);
    //! assert!(Factorizer::new(config).is_ok());
    //! ```

    // Core types
    pub use crate::core::{
        BackendKind, Boundary, ChannelMode, Divergence, ProblemGeometry, SampleLayout,
        TnmfError, TnmfResult, VersionedTensor,
    };

    // Backends
    pub use crate::kernels::{create_backend, CacheStats, TransformBackend};

    // Factorization
    pub use crate::decomp::{
        AtomNormalization, Factorization, Factorizer, FitStatus, FitWarning, Initialization,
        TnmfConfig,
    };
}
