//! Factorization result container

use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use std::fmt;
use std::sync::Arc;
use tnmf_core::{ProblemGeometry, TnmfError, TnmfResult, VersionedTensor};
use tnmf_kernels::{CacheStats, TransformBackend};

/// How the optimizer loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FitStatus {
    /// Relative improvement fell below the tolerance
    Converged,
    /// The objective increased; the fit stopped and is treated as converged
    Stalled,
    /// The iteration cap was reached first
    MaxIterationsReached,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Converged => write!(f, "converged"),
            FitStatus::Stalled => write!(f, "stalled"),
            FitStatus::MaxIterationsReached => write!(f, "max iterations reached"),
        }
    }
}

/// Non-fatal conditions observed during a fit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FitWarning {
    /// The objective went up between two iterations
    NumericalStall {
        iteration: usize,
        previous: f64,
        current: f64,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::NumericalStall {
                iteration,
                previous,
                current,
            } => write!(
                f,
                "objective increased at iteration {}: {:.6e} -> {:.6e}",
                iteration, previous, current
            ),
        }
    }
}

/// Learned dictionary and activations with the fit diagnostics
///
/// The reconstruction is not stored; [`reconstruct`](Self::reconstruct)
/// recomputes it with the backend that produced the fit.
pub struct Factorization {
    pub(crate) atoms: VersionedTensor,
    pub(crate) activations: VersionedTensor,
    pub(crate) geometry: ProblemGeometry,
    pub(crate) backend: Arc<dyn TransformBackend>,
    pub(crate) objective_history: Vec<f64>,
    pub(crate) initial_objective: f64,
    pub(crate) iterations: usize,
    pub(crate) status: FitStatus,
    pub(crate) warnings: Vec<FitWarning>,
    pub(crate) refit_objective: Option<f64>,
    pub(crate) cache_stats: Option<CacheStats>,
}

impl fmt::Debug for Factorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factorization")
            .field("dictionary_shape", &self.atoms.shape())
            .field("activation_shape", &self.activations.shape())
            .field("backend", &self.backend.name())
            .field("iterations", &self.iterations)
            .field("status", &self.status)
            .field("final_objective", &self.final_objective())
            .finish()
    }
}

impl Factorization {
    /// Atoms, `[num_atoms, channels, *atom_spatial]`
    pub fn dictionary(&self) -> &ArrayD<f64> {
        self.atoms.array()
    }

    /// Activation maps, `[samples, num_atoms(, channels), *spatial]`
    pub fn activations(&self) -> &ArrayD<f64> {
        self.activations.array()
    }

    pub fn geometry(&self) -> &ProblemGeometry {
        &self.geometry
    }

    /// Reconstruction of the observation, `[samples, channels, *spatial]`
    pub fn reconstruct(&self) -> TnmfResult<ArrayD<f64>> {
        self.backend
            .forward_convolve(&self.atoms, &self.activations, &self.geometry)
    }

    /// Contribution of atom `k` alone to the reconstruction
    ///
    /// # Errors
    ///
    /// [`TnmfError::InvalidInput`] when `k` is not an atom index.
    pub fn reconstruct_atom(&self, k: usize) -> TnmfResult<ArrayD<f64>> {
        let num_atoms = self.geometry.num_atoms();
        if k >= num_atoms {
            return Err(TnmfError::invalid_input(format!(
                "atom index {} out of range for {} atoms",
                k, num_atoms
            )));
        }
        let mut single = self.atoms.to_array();
        for (index, mut atom) in single.outer_iter_mut().enumerate() {
            if index != k {
                atom.fill(0.0);
            }
        }
        self.backend.forward_convolve(
            &VersionedTensor::new(single),
            &self.activations,
            &self.geometry,
        )
    }

    /// Objective after each iteration
    pub fn objective_history(&self) -> &[f64] {
        &self.objective_history
    }

    /// Objective of the initial factors
    pub fn initial_objective(&self) -> f64 {
        self.initial_objective
    }

    /// Objective at the end of the main loop
    pub fn final_objective(&self) -> f64 {
        self.objective_history
            .last()
            .copied()
            .unwrap_or(self.initial_objective)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }

    /// True for [`FitStatus::Converged`] and [`FitStatus::Stalled`]
    pub fn converged(&self) -> bool {
        matches!(self.status, FitStatus::Converged | FitStatus::Stalled)
    }

    pub fn stalled(&self) -> bool {
        self.status == FitStatus::Stalled
    }

    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// Divergence after the activation refit, if one ran
    pub fn refit_objective(&self) -> Option<f64> {
        self.refit_objective
    }

    /// Transform cache statistics at the end of the fit
    ///
    /// Counters accumulate over every fit run through the same backend.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache_stats
    }

    /// `‖V − R‖ / ‖V‖` against an observation with the same number of elements
    ///
    /// Any layout of the fitted observation is accepted, since unit axes do not
    /// change element order.
    pub fn relative_error(&self, observation: &ArrayD<f64>) -> TnmfResult<f64> {
        let reconstruction = self.reconstruct()?;
        if observation.len() != reconstruction.len() {
            return Err(TnmfError::shape_mismatch(
                "relative_error",
                reconstruction.shape().to_vec(),
                observation.shape().to_vec(),
                "observation does not match the fitted geometry",
            ));
        }
        let (mut diff, mut norm) = (0.0, 0.0);
        for (v, r) in observation.iter().zip(reconstruction.iter()) {
            diff += (v - r) * (v - r);
            norm += v * v;
        }
        Ok(diff.sqrt() / norm.sqrt().max(f64::MIN_POSITIVE))
    }

    /// Plain-data copy of the learned factors and diagnostics
    pub fn snapshot(&self) -> FactorizationSnapshot {
        FactorizationSnapshot {
            dictionary_shape: self.atoms.shape().to_vec(),
            dictionary: self.atoms.as_slice().to_vec(),
            activation_shape: self.activations.shape().to_vec(),
            activations: self.activations.as_slice().to_vec(),
            objective_history: self.objective_history.clone(),
            initial_objective: self.initial_objective,
            iterations: self.iterations,
            status: self.status,
            warnings: self.warnings.clone(),
            refit_objective: self.refit_objective,
        }
    }

    /// Consume the result, returning `(dictionary, activations)`
    pub fn into_factors(self) -> (ArrayD<f64>, ArrayD<f64>) {
        (self.atoms.into_array(), self.activations.into_array())
    }
}

/// Serializable form of a [`Factorization`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorizationSnapshot {
    pub dictionary_shape: Vec<usize>,
    pub dictionary: Vec<f64>,
    pub activation_shape: Vec<usize>,
    pub activations: Vec<f64>,
    pub objective_history: Vec<f64>,
    pub initial_objective: f64,
    pub iterations: usize,
    pub status: FitStatus,
    pub warnings: Vec<FitWarning>,
    pub refit_objective: Option<f64>,
}

impl FactorizationSnapshot {
    pub fn dictionary_array(&self) -> TnmfResult<ArrayD<f64>> {
        to_array("dictionary_array", &self.dictionary_shape, &self.dictionary)
    }

    pub fn activations_array(&self) -> TnmfResult<ArrayD<f64>> {
        to_array("activations_array", &self.activation_shape, &self.activations)
    }
}

fn to_array(op: &str, shape: &[usize], data: &[f64]) -> TnmfResult<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).map_err(|e| {
        TnmfError::shape_mismatch(op, shape.to_vec(), vec![data.len()], e.to_string())
    })
}
