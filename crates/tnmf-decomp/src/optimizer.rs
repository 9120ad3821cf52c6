//! Multiplicative-update optimizer
//!
//! Alternates activation and dictionary updates of the form
//! `X ← X ⊙ num / max(den, ε)`, where `num` and `den` are adjoint
//! correlations computed by the configured [`TransformBackend`]. Each
//! iteration:
//!
//! 1. updates the activations (L1 sparsity added to the denominator,
//!    optional hard threshold) and recomputes the reconstruction,
//! 2. updates the dictionary, renormalizes every atom while moving the
//!    removed scale into its activations, and recomputes the reconstruction,
//! 3. evaluates `divergence + sparsity·‖H‖₁` and checks for convergence.
//!
//! Renormalization charges each atom's norm to the L1 term of its
//! activations, so with sparsity the dictionary step minimizes
//! `divergence + sparsity·‖H_k‖₁·norm(W_k)`: the per-atom charge is added to
//! the denominator (constant for unit sum, proportional to `W` for unit
//! energy). Both steps then leave the objective non-increasing.
//!
//! Entries start strictly positive and are only ever multiplied by
//! non-negative ratios or zeroed, so both factors stay non-negative.
//!
//! # Examples
//!
//! ```
//! use scirs2_core::ndarray_ext::{Array, IxDyn};
//! use tnmf_decomp::{Factorizer, TnmfConfig};
//!
//! let mut signal = Array::<f64, _>::zeros(IxDyn(&[1, 1, 48]));
//! for start in [4, 20, 36] {
//!     for (i, v) in [1.0, 2.0, 1.0].iter().enumerate() {
//!         signal[[0, 0, start + i]] = *v;
//!     }
//! }
//!
//! let factorizer = Factorizer::new(TnmfConfig::default().with_seed(3).with_max_iterations(50))?;
//! let result = factorizer.fit(&signal, 1, &[3])?;
//!
//! assert_eq!(result.dictionary().shape(), &[1, 1, 3]);
//! assert!(result.final_objective() <= result.initial_objective());
//! # Ok::<(), tnmf_core::TnmfError>(())
//! ```

use crate::config::{AtomNormalization, TnmfConfig};
use crate::divergence::{multiplicative_terms, objective, KlSignals};
use crate::init::{initial_factors, Initialization};
use crate::result::{Factorization, FitStatus, FitWarning};
use scirs2_core::ndarray_ext::{ArrayD, Zip};
use std::fmt;
use std::sync::Arc;
use tnmf_core::{
    Divergence, ProblemGeometry, SampleLayout, TnmfError, TnmfResult, VersionedTensor,
};
use tnmf_kernels::{create_backend, ensure_supported, TransformBackend};

/// Relative objective increase tolerated as rounding when `tolerance` is zero
const STALL_SLACK: f64 = 1e-12;

/// Lifecycle of one fit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Initialized,
    Iterating,
    Converged,
    Stalled,
    MaxIterationsReached,
}

impl FitState {
    /// Terminal status, if the fit has finished
    pub fn status(&self) -> Option<FitStatus> {
        match self {
            FitState::Converged => Some(FitStatus::Converged),
            FitState::Stalled => Some(FitStatus::Stalled),
            FitState::MaxIterationsReached => Some(FitStatus::MaxIterationsReached),
            FitState::Initialized | FitState::Iterating => None,
        }
    }
}

/// Terminal state implied by a relative objective change, if any
///
/// Changes within `tolerance` in either direction count as convergence; only a
/// larger increase is a stall.
fn stop_state(change: f64, tolerance: f64) -> Option<FitState> {
    if change.abs() < tolerance {
        Some(FitState::Converged)
    } else if change < -STALL_SLACK {
        Some(FitState::Stalled)
    } else {
        None
    }
}

/// Transform-invariant NMF solver
///
/// Holds a validated configuration and the backend built from it. One
/// factorizer can run any number of fits; each fit owns its own factors.
#[derive(Clone)]
pub struct Factorizer {
    config: TnmfConfig,
    backend: Arc<dyn TransformBackend>,
}

impl fmt::Debug for Factorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factorizer")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Factorizer {
    /// Validate `config` and build its backend
    ///
    /// # Errors
    ///
    /// [`TnmfError::InvalidConfig`] for out-of-range values,
    /// [`TnmfError::UnsupportedMode`] when the backend cannot realize the boundary.
    pub fn new(config: TnmfConfig) -> TnmfResult<Self> {
        let backend = create_backend(config.backend, config.cache_transforms);
        Self::with_backend(config, backend)
    }

    /// Use a caller-provided backend instead of `config.backend`
    pub fn with_backend(
        config: TnmfConfig,
        backend: Arc<dyn TransformBackend>,
    ) -> TnmfResult<Self> {
        config.validate()?;
        ensure_supported(backend.as_ref(), config.boundary)?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &TnmfConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn TransformBackend> {
        &self.backend
    }

    /// Fit `num_atoms` atoms of extent `atom_shape` to a `[samples, channels, *spatial]` observation
    pub fn fit(
        &self,
        observation: &ArrayD<f64>,
        num_atoms: usize,
        atom_shape: &[usize],
    ) -> TnmfResult<Factorization> {
        self.fit_with(
            observation,
            SampleLayout::Full,
            num_atoms,
            atom_shape,
            Initialization::random(),
        )
    }

    /// Fit an observation given in a reduced layout
    pub fn fit_layout(
        &self,
        observation: &ArrayD<f64>,
        layout: SampleLayout,
        num_atoms: usize,
        atom_shape: &[usize],
    ) -> TnmfResult<Factorization> {
        self.fit_with(
            observation,
            layout,
            num_atoms,
            atom_shape,
            Initialization::random(),
        )
    }

    /// Fit with explicit starting factors
    ///
    /// # Errors
    ///
    /// - [`TnmfError::ShapeMismatch`] for an observation of too low rank, an atom
    ///   larger than the observation, or supplied factors of the wrong shape
    /// - [`TnmfError::InvalidInput`] for negative or non-finite data
    /// - [`TnmfError::Transform`] if the FFT library fails
    pub fn fit_with(
        &self,
        observation: &ArrayD<f64>,
        layout: SampleLayout,
        num_atoms: usize,
        atom_shape: &[usize],
        init: Initialization,
    ) -> TnmfResult<Factorization> {
        let canonical = layout.canonicalize(observation.clone())?;
        if canonical.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(TnmfError::invalid_input(
                "observation must be finite and non-negative",
            ));
        }
        let geometry = ProblemGeometry::new(
            canonical.shape(),
            num_atoms,
            atom_shape,
            self.config.boundary,
            self.config.channel_mode,
        )?;

        let span = tracing::info_span!(
            "tnmf_fit",
            backend = self.backend.name(),
            boundary = %self.config.boundary,
            divergence = %self.config.divergence,
            num_atoms,
        );
        let _guard = span.enter();
        tracing::info!(
            observation = ?geometry.observation_shape(),
            atoms = ?geometry.dictionary_shape(),
            activations = ?geometry.activation_shape(),
            "starting factorization"
        );

        let (atoms, activations) = initial_factors(init, &geometry, &self.config)?;
        let session = Session::new(
            &self.config,
            self.backend.as_ref(),
            geometry,
            VersionedTensor::new(canonical),
            atoms,
            activations,
        );
        let result = session.run(Arc::clone(&self.backend))?;

        tracing::info!(
            status = %result.status(),
            iterations = result.iterations(),
            objective = result.final_objective(),
            "factorization finished"
        );
        Ok(result)
    }
}

/// Tensors and state of a single fit
struct Session<'a> {
    config: &'a TnmfConfig,
    backend: &'a dyn TransformBackend,
    geometry: ProblemGeometry,
    observation: VersionedTensor,
    atoms: VersionedTensor,
    activations: VersionedTensor,
    reconstruction: VersionedTensor,
    kl: Option<KlSignals>,
    state: FitState,
}

impl<'a> Session<'a> {
    fn new(
        config: &'a TnmfConfig,
        backend: &'a dyn TransformBackend,
        geometry: ProblemGeometry,
        observation: VersionedTensor,
        atoms: VersionedTensor,
        activations: VersionedTensor,
    ) -> Self {
        let shape = geometry.observation_shape();
        let kl = match config.divergence {
            Divergence::KullbackLeibler => Some(KlSignals::new(&shape)),
            Divergence::Frobenius => None,
        };
        Self {
            config,
            backend,
            reconstruction: VersionedTensor::zeros(&shape),
            geometry,
            observation,
            atoms,
            activations,
            kl,
            state: FitState::Initialized,
        }
    }

    fn run(mut self, backend: Arc<dyn TransformBackend>) -> TnmfResult<Factorization> {
        let config = self.config;
        let eps = config.eps;

        self.normalize_atoms();
        self.reconstruct()?;
        let initial_objective = self.objective(config.sparsity);
        tracing::debug!(objective = initial_objective, "initial objective");

        let mut history = Vec::with_capacity(config.max_iterations);
        let mut warnings = Vec::new();
        let mut previous = initial_objective;
        self.state = FitState::Iterating;

        for iteration in 1..=config.max_iterations {
            let current = self.iterate()?;
            history.push(current);
            let change = (previous - current) / previous.abs().max(eps);
            tracing::debug!(iteration, objective = current, relative_change = change, "iteration");

            match stop_state(change, config.tolerance) {
                Some(FitState::Stalled) => {
                    tracing::warn!(
                        iteration,
                        previous,
                        current,
                        "objective increased, stopping"
                    );
                    warnings.push(FitWarning::NumericalStall {
                        iteration,
                        previous,
                        current,
                    });
                    self.state = FitState::Stalled;
                    break;
                }
                Some(state) => {
                    self.state = state;
                    break;
                }
                None => previous = current,
            }
        }
        if self.state == FitState::Iterating {
            self.state = FitState::MaxIterationsReached;
        }

        let refit_objective = if config.refit_iterations > 0 {
            for _ in 0..config.refit_iterations {
                self.backend.begin_iteration();
                self.update_activations(0.0)?;
                self.reconstruct()?;
            }
            let value = self.objective(0.0);
            tracing::debug!(
                iterations = config.refit_iterations,
                objective = value,
                "activation refit"
            );
            Some(value)
        } else {
            None
        };

        let status = self
            .state
            .status()
            .unwrap_or(FitStatus::MaxIterationsReached);

        Ok(Factorization {
            iterations: history.len(),
            objective_history: history,
            initial_objective,
            status,
            warnings,
            refit_objective,
            cache_stats: self.backend.cache_stats(),
            atoms: self.atoms,
            activations: self.activations,
            geometry: self.geometry,
            backend,
        })
    }

    /// One alternating update; returns the objective it reaches
    fn iterate(&mut self) -> TnmfResult<f64> {
        let sparsity = self.config.sparsity;
        self.backend.begin_iteration();

        self.update_activations(sparsity)?;
        self.reconstruct()?;
        self.update_atoms(sparsity)?;
        self.normalize_atoms();
        self.reconstruct()?;

        Ok(self.objective(sparsity))
    }

    fn reconstruct(&mut self) -> TnmfResult<()> {
        let r = self
            .backend
            .forward_convolve(&self.atoms, &self.activations, &self.geometry)?;
        self.reconstruction.assign(r)
    }

    fn objective(&self, sparsity: f64) -> f64 {
        let divergence = objective(
            self.config.divergence,
            self.observation.as_slice(),
            self.reconstruction.as_slice(),
            self.config.eps,
        );
        if sparsity > 0.0 {
            divergence + sparsity * self.activations.sum()
        } else {
            divergence
        }
    }

    fn update_activations(&mut self, sparsity: f64) -> TnmfResult<()> {
        let eps = self.config.eps;
        let threshold = self.config.activation_threshold;
        let terms = multiplicative_terms(
            self.config.divergence,
            &self.observation,
            &self.reconstruction,
            self.kl.as_mut(),
            eps,
        );
        let numerator =
            self.backend
                .gradient_wrt_activation(&self.atoms, &terms.numerator, &self.geometry)?;
        let denominator =
            self.backend
                .gradient_wrt_activation(&self.atoms, &terms.denominator, &self.geometry)?;

        self.activations.update(|h| {
            Zip::from(h)
                .and(&numerator)
                .and(&denominator)
                .for_each(|h, &num, &den| {
                    *h *= num.max(0.0) / (den + sparsity).max(eps);
                    if *h < threshold {
                        *h = 0.0;
                    }
                });
        });
        Ok(())
    }

    fn update_atoms(&mut self, sparsity: f64) -> TnmfResult<()> {
        let eps = self.config.eps;
        let charges = self.normalization_charges(sparsity);
        let proportional = self.config.normalization == AtomNormalization::UnitEnergy;
        let terms = multiplicative_terms(
            self.config.divergence,
            &self.observation,
            &self.reconstruction,
            self.kl.as_mut(),
            eps,
        );
        let numerator =
            self.backend
                .gradient_wrt_atom(&self.activations, &terms.numerator, &self.geometry)?;
        let denominator =
            self.backend
                .gradient_wrt_atom(&self.activations, &terms.denominator, &self.geometry)?;

        self.atoms.update(|mut w| {
            for (((w_k, num_k), den_k), &charge) in w
                .outer_iter_mut()
                .zip(numerator.outer_iter())
                .zip(denominator.outer_iter())
                .zip(&charges)
            {
                Zip::from(w_k)
                    .and(num_k)
                    .and(den_k)
                    .for_each(|w, &num, &den| {
                        let penalty = if proportional { charge * *w } else { charge };
                        *w *= num.max(0.0) / (den + penalty).max(eps);
                    });
            }
        });
        Ok(())
    }

    /// Per-atom L1 cost that renormalization will move onto the activations
    ///
    /// `sparsity · ‖H_k‖₁` per unit of atom sum, or divided by the current
    /// L2 norm for unit energy. Zero for atoms normalization skips.
    fn normalization_charges(&self, sparsity: f64) -> Vec<f64> {
        let geometry = &self.geometry;
        if sparsity <= 0.0 {
            return vec![0.0; geometry.num_atoms()];
        }
        let normalization = self.config.normalization;
        let atom_block = geometry.channels() * geometry.atom_len();
        let map_len = geometry.spatial_len();
        let activations = self.activations.as_slice();

        self.atoms
            .as_slice()
            .chunks(atom_block)
            .enumerate()
            .map(|(k, atom)| {
                let Some(norm) = normalization.norm(atom).filter(|n| *n >= self.config.eps)
                else {
                    return 0.0;
                };
                let mut mass = 0.0;
                for n in 0..geometry.samples() {
                    for c in 0..geometry.activation_channels() {
                        let start = geometry.activation_slice(n, k, c) * map_len;
                        mass += activations[start..start + map_len].iter().sum::<f64>();
                    }
                }
                match normalization {
                    AtomNormalization::UnitEnergy => sparsity * mass / norm,
                    _ => sparsity * mass,
                }
            })
            .collect()
    }

    /// Rescale atoms to the configured norm, compensating in the activations
    fn normalize_atoms(&mut self) {
        let geometry = &self.geometry;
        let atom_block = geometry.channels() * geometry.atom_len();
        let norms: Vec<Option<f64>> = self
            .atoms
            .as_slice()
            .chunks(atom_block)
            .map(|atom| {
                self.config
                    .normalization
                    .norm(atom)
                    .filter(|norm| *norm >= self.config.eps)
            })
            .collect();
        if norms.iter().all(Option::is_none) {
            return;
        }

        let atoms = self.atoms.as_slice_mut();
        for (atom, norm) in atoms.chunks_mut(atom_block).zip(&norms) {
            if let Some(norm) = norm {
                atom.iter_mut().for_each(|w| *w /= norm);
            }
        }

        let map_len = geometry.spatial_len();
        let activations = self.activations.as_slice_mut();
        for n in 0..geometry.samples() {
            for (k, norm) in norms.iter().enumerate() {
                let Some(norm) = norm else { continue };
                for c in 0..geometry.activation_channels() {
                    let start = geometry.activation_slice(n, k, c) * map_len;
                    activations[start..start + map_len]
                        .iter_mut()
                        .for_each(|h| *h *= norm);
                }
            }
        }
    }
}
