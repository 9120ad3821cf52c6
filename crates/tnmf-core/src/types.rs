//! Mode enums shared by every layer of the stack

use std::fmt;

/// Boundary treatment of the observation edges
///
/// The same policy is applied by the forward convolution and by both adjoint
/// correlations, otherwise the gradients would not belong to the objective
/// being descended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Boundary {
    /// Zero padding, no wraparound; the linear convolution is truncated to the
    /// observation extent
    #[default]
    Full,
    /// Periodic observation; indices wrap modulo the observation extent
    Circular,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Full => write!(f, "full boundary"),
            Boundary::Circular => write!(f, "circular boundary"),
        }
    }
}

/// Reconstruction-error objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Divergence {
    /// ½‖V − R‖²
    #[default]
    Frobenius,
    /// Σ V·log(V/R) − V + R
    KullbackLeibler,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Frobenius => write!(f, "frobenius"),
            Divergence::KullbackLeibler => write!(f, "kullback-leibler"),
        }
    }
}

/// How activations relate to the channels of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelMode {
    /// One activation map per (sample, atom), shared by all channels of the atom
    #[default]
    Shared,
    /// One activation map per (sample, atom, channel)
    Independent,
}

/// Concrete transform backend selected at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackendKind {
    /// Spatial-domain convolution, O(N·M) per slice pair
    Direct,
    /// Fourier-domain convolution on the scirs2 FFT stack
    #[default]
    Fft,
    /// Fourier-domain convolution with planned, batched and data-parallel transforms
    BatchedFft,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Direct => write!(f, "direct"),
            BackendKind::Fft => write!(f, "fft"),
            BackendKind::BatchedFft => write!(f, "batched-fft"),
        }
    }
}
