//! # tnmf-core
//!
//! Foundational types for transform-invariant non-negative factorization.
//!
//! - **Versioned tensors** ([`VersionedTensor`]) carry an identity and a mutation
//!   counter so transform caches can key on the exact tensor state
//! - **Problem geometry** ([`ProblemGeometry`]) derives dictionary, activation and
//!   reconstruction shapes from the observation shape and atom extent
//! - **Sample layouts** ([`SampleLayout`]) canonicalize reduced observations to
//!   `[samples, channels, *spatial]`
//! - **Mode enums** ([`Boundary`], [`Divergence`], [`ChannelMode`], [`BackendKind`])
//! - **Errors** ([`TnmfError`], [`TnmfResult`])
//!
//! ## Quick Start
//!
//! ```
//! use tnmf_core::{Boundary, ChannelMode, ProblemGeometry, VersionedTensor};
//!
//! let geometry = ProblemGeometry::new(&[1, 1, 128], 3, &[16], Boundary::Full, ChannelMode::Shared)?;
//! let atoms = VersionedTensor::from_elem(&geometry.dictionary_shape(), 1.0 / 16.0);
//!
//! assert_eq!(atoms.shape(), &[3, 1, 16]);
//! assert_eq!(geometry.activation_shape(), vec![1, 3, 128]);
//! # Ok::<(), tnmf_core::TnmfError>(())
//! ```
//!
//! ## SciRS2 Integration
//!
//! Arrays come from `scirs2_core::ndarray_ext`; this crate never depends on
//! `ndarray` directly.
//!
//! ## Features
//!
//! - `serde`: Serialize/deserialize the mode enums and [`SampleLayout`]

pub mod error;
pub mod geometry;
pub mod tensor;
pub mod types;

#[cfg(test)]
mod property_tests;

pub use error::{TnmfError, TnmfResult};
pub use geometry::{Grid, ProblemGeometry, SampleLayout};
pub use tensor::{TensorId, TensorKey, VersionedTensor};
pub use types::{BackendKind, Boundary, ChannelMode, Divergence};
