//! Factorization configuration
//!
//! All tunables live in [`TnmfConfig`]; there are no global defaults.
//! Values are checked by [`TnmfConfig::validate`] when a
//! [`Factorizer`](crate::Factorizer) is constructed.

use tnmf_core::{BackendKind, Boundary, ChannelMode, Divergence, TnmfError, TnmfResult};

/// Scale constraint applied to every atom after its update
///
/// The removed scale is multiplied into the atom's activations, so the
/// reconstruction is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AtomNormalization {
    /// Entries of each atom sum to one
    #[default]
    UnitSum,
    /// Each atom has unit L2 norm
    UnitEnergy,
    /// Atoms are left unscaled
    None,
}

impl AtomNormalization {
    /// Norm of an atom under this constraint (`None` for no constraint)
    pub fn norm(&self, atom: &[f64]) -> Option<f64> {
        match self {
            AtomNormalization::UnitSum => Some(atom.iter().sum()),
            AtomNormalization::UnitEnergy => Some(atom.iter().map(|v| v * v).sum::<f64>().sqrt()),
            AtomNormalization::None => None,
        }
    }
}

/// Configuration of a transform-invariant factorization
///
/// # Examples
///
/// ```
/// use tnmf_core::{Boundary, Divergence};
/// use tnmf_decomp::TnmfConfig;
///
/// let config = TnmfConfig::default()
///     .with_boundary(Boundary::Circular)
///     .with_divergence(Divergence::KullbackLeibler)
///     .with_sparsity(0.1)
///     .with_seed(7);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_iterations, 200);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TnmfConfig {
    pub boundary: Boundary,
    pub divergence: Divergence,
    /// Upper bound on optimizer iterations (≥ 1)
    pub max_iterations: usize,
    /// Relative objective improvement below which the fit has converged, in `[0, 1)`
    pub tolerance: f64,
    /// L1 penalty on the activations (≥ 0)
    pub sparsity: f64,
    pub backend: BackendKind,
    pub channel_mode: ChannelMode,
    /// Floor for every denominator (> 0)
    pub eps: f64,
    pub normalization: AtomNormalization,
    /// Activations below this value are set to zero after each update; zero disables
    pub activation_threshold: f64,
    /// Activation-only updates without the sparsity term after the main loop
    pub refit_iterations: usize,
    /// Memoize operand spectra in spectral backends
    pub cache_transforms: bool,
    /// Seed for random initialization; thread RNG when absent
    pub seed: Option<u64>,
}

impl Default for TnmfConfig {
    fn default() -> Self {
        Self {
            boundary: Boundary::Full,
            divergence: Divergence::Frobenius,
            max_iterations: 200,
            tolerance: 1e-6,
            sparsity: 0.0,
            backend: BackendKind::Fft,
            channel_mode: ChannelMode::Shared,
            eps: 1e-9,
            normalization: AtomNormalization::UnitSum,
            activation_threshold: 0.0,
            refit_iterations: 0,
            cache_transforms: true,
            seed: None,
        }
    }
}

impl TnmfConfig {
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_divergence(mut self, divergence: Divergence) -> Self {
        self.divergence = divergence;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_sparsity(mut self, sparsity: f64) -> Self {
        self.sparsity = sparsity;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_channel_mode(mut self, channel_mode: ChannelMode) -> Self {
        self.channel_mode = channel_mode;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_normalization(mut self, normalization: AtomNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_activation_threshold(mut self, threshold: f64) -> Self {
        self.activation_threshold = threshold;
        self
    }

    pub fn with_refit_iterations(mut self, iterations: usize) -> Self {
        self.refit_iterations = iterations;
        self
    }

    pub fn with_cache_transforms(mut self, enabled: bool) -> Self {
        self.cache_transforms = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every value range
    ///
    /// # Errors
    ///
    /// [`TnmfError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> TnmfResult<()> {
        if self.max_iterations == 0 {
            return Err(TnmfError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }
        if !self.tolerance.is_finite() || !(0.0..1.0).contains(&self.tolerance) {
            return Err(TnmfError::invalid_config(format!(
                "tolerance must lie in [0, 1), got {}",
                self.tolerance
            )));
        }
        if !self.sparsity.is_finite() || self.sparsity < 0.0 {
            return Err(TnmfError::invalid_config(format!(
                "sparsity must be non-negative, got {}",
                self.sparsity
            )));
        }
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(TnmfError::invalid_config(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if !self.activation_threshold.is_finite() || self.activation_threshold < 0.0 {
            return Err(TnmfError::invalid_config(format!(
                "activation_threshold must be non-negative, got {}",
                self.activation_threshold
            )));
        }
        Ok(())
    }
}
