//! # tnmf-decomp
//!
//! Transform-invariant non-negative matrix factorization.
//!
//! ## Overview
//!
//! Every sample of a non-negative observation is approximated by a sum of
//! shifted copies of a few learned atoms:
//!
//! ```text
//! V[n, c, x] ≈ R[n, c, x] = Σₖ Σₛ W[k, c, s] · H[n, k, x − s]
//! ```
//!
//! with `W ≥ 0` (the dictionary) and `H ≥ 0` (the activations). The shift
//! group is the spatial translation group of the observation grid, in any
//! number of dimensions.
//!
//! **Objectives:**
//! - Frobenius: `½‖V − R‖² + λ‖H‖₁`
//! - Generalized Kullback-Leibler: `D(V‖R) + λ‖H‖₁`
//!
//! **Pieces:**
//! - [`TnmfConfig`] - boundary, divergence, backend, stopping rule and regularization
//! - [`Factorizer`] - validated solver running multiplicative updates
//! - [`Factorization`] - learned factors, objective history and fit status
//! - [`divergence`] - objectives and the signals each update correlates
//!
//! ## Quick Start
//!
//! ```
//! use scirs2_core::ndarray_ext::{Array, IxDyn};
//! use tnmf_core::{BackendKind, Boundary};
//! use tnmf_decomp::{Factorizer, TnmfConfig};
//!
//! // Two pulses of the same shape at different positions
//! let mut v = Array::<f64, _>::zeros(IxDyn(&[1, 1, 64]));
//! for start in [10, 40] {
//!     v[[0, 0, start]] = 1.0;
//!     v[[0, 0, start + 1]] = 0.5;
//! }
//!
//! let config = TnmfConfig::default()
//!     .with_boundary(Boundary::Circular)
//!     .with_backend(BackendKind::BatchedFft)
//!     .with_max_iterations(100)
//!     .with_seed(1);
//! let result = Factorizer::new(config)?.fit(&v, 1, &[2])?;
//!
//! println!("{} after {} iterations", result.status(), result.iterations());
//! assert_eq!(result.activations().shape(), &[1, 1, 64]);
//! # Ok::<(), tnmf_core::TnmfError>(())
//! ```
//!
//! ## SciRS2 Integration
//!
//! Arrays and random number generation come from `scirs2_core`. Convolutions
//! are delegated to a [`tnmf_kernels::TransformBackend`].
//!
//! ## Features
//!
//! - `serde`: Serialize [`TnmfConfig`] and [`FactorizationSnapshot`]

pub mod config;
pub mod divergence;
pub mod init;
pub mod optimizer;
pub mod result;


pub use config::{AtomNormalization, TnmfConfig};
pub use divergence::{multiplicative_terms, objective, KlSignals, MultiplicativeTerms};
pub use init::Initialization;
pub use optimizer::{Factorizer, FitState};
pub use result::{Factorization, FactorizationSnapshot, FitStatus, FitWarning};
