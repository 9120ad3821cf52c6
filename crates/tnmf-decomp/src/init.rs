//! Factor initialization
//!
//! Factors not supplied by the caller are drawn uniformly from `(0, 1]`, so
//! every generated entry is strictly positive and multiplicative updates can
//! move it.

use crate::config::TnmfConfig;
use scirs2_core::ndarray_ext::{Array, ArrayD, IxDyn};
use scirs2_core::random::{rngs::StdRng, thread_rng, Rng, SeedableRng};
use tnmf_core::{ProblemGeometry, TnmfError, TnmfResult, VersionedTensor};

/// Starting factors for a fit
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, IxDyn};
/// use tnmf_decomp::Initialization;
///
/// let atoms = Array::from_elem(IxDyn(&[2, 1, 4]), 0.25);
/// let init = Initialization::random().with_dictionary(atoms);
///
/// assert!(init.dictionary.is_some());
/// assert!(init.activations.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Initialization {
    /// `[num_atoms, channels, *atom_spatial]`
    pub dictionary: Option<ArrayD<f64>>,
    /// Activation-shaped array for the configured channel mode
    pub activations: Option<ArrayD<f64>>,
}

impl Initialization {
    /// Draw both factors at random
    pub fn random() -> Self {
        Self::default()
    }

    pub fn with_dictionary(mut self, dictionary: ArrayD<f64>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_activations(mut self, activations: ArrayD<f64>) -> Self {
        self.activations = Some(activations);
        self
    }
}

/// Tensor of the given shape with entries uniform in `(0, 1]`
fn uniform(rng: &mut StdRng, shape: &[usize]) -> VersionedTensor {
    VersionedTensor::new(Array::from_shape_fn(IxDyn(shape), |_| {
        1.0 - rng.random::<f64>()
    }))
}

fn supplied(
    what: &str,
    array: ArrayD<f64>,
    expected: &[usize],
    geometry: &ProblemGeometry,
) -> TnmfResult<VersionedTensor> {
    geometry.check_shape("Initialization", what, expected, array.shape())?;
    if array.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(TnmfError::invalid_input(format!(
            "supplied {} must be finite and non-negative",
            what
        )));
    }
    Ok(VersionedTensor::new(array))
}

/// Build the starting dictionary and activations
///
/// Generated factors come from a `StdRng` seeded with `config.seed`, or with a
/// seed drawn from the thread RNG when none is configured. The seed in use is
/// logged at debug level so any run can be replayed.
pub(crate) fn initial_factors(
    init: Initialization,
    geometry: &ProblemGeometry,
    config: &TnmfConfig,
) -> TnmfResult<(VersionedTensor, VersionedTensor)> {
    let seed = config
        .seed
        .unwrap_or_else(|| thread_rng().random::<u64>());
    tracing::debug!(seed, "initializing factors");
    let mut rng = StdRng::seed_from_u64(seed);

    let dictionary_shape = geometry.dictionary_shape();
    let activation_shape = geometry.activation_shape();

    let atoms = match init.dictionary {
        Some(array) => supplied("dictionary", array, &dictionary_shape, geometry)?,
        None => uniform(&mut rng, &dictionary_shape),
    };
    let activations = match init.activations {
        Some(array) => supplied("activations", array, &activation_shape, geometry)?,
        None => uniform(&mut rng, &activation_shape),
    };
    Ok((atoms, activations))
}
