//! Integration tests for the factorization
//!
//! These tests verify recovery of planted atoms, the descent behavior of the
//! multiplicative updates, and the error paths of the public API.

use scirs2_core::ndarray_ext::{Array, ArrayD, IxDyn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tnmf_core::{
    BackendKind, Boundary, ChannelMode, Divergence, ProblemGeometry, SampleLayout, TnmfError,
    TnmfResult, VersionedTensor,
};
use tnmf_decomp::{
    objective, AtomNormalization, Factorizer, FitStatus, FitWarning, Initialization, TnmfConfig,
};
use tnmf_kernels::{create_backend, ensure_supported, DirectBackend, TransformBackend};

const ATOM: [f64; 8] = [1.0, 2.0, 4.0, 6.0, 6.0, 4.0, 2.0, 1.0];
const PLANTED: [(usize, f64); 3] = [(5, 1.0), (20, 2.0), (41, 1.5)];

fn unit_atom() -> ArrayD<f64> {
    let total: f64 = ATOM.iter().sum();
    Array::from_shape_vec(IxDyn(&[1, 1, 8]), ATOM.iter().map(|v| v / total).collect()).unwrap()
}

fn planted_activations() -> ArrayD<f64> {
    let mut h = Array::zeros(IxDyn(&[1, 1, 64]));
    for (position, amplitude) in PLANTED {
        h[[0, 0, position]] = amplitude;
    }
    h
}

/// Observation synthesized from the planted atom and activations
fn planted_observation() -> ArrayD<f64> {
    let g = ProblemGeometry::new(&[1, 1, 64], 1, &[8], Boundary::Full, ChannelMode::Shared)
        .unwrap();
    DirectBackend::new()
        .forward_convolve(
            &VersionedTensor::new(unit_atom()),
            &VersionedTensor::new(planted_activations()),
            &g,
        )
        .unwrap()
}

fn noisy(shape: &[usize], seed: u64) -> ArrayD<f64> {
    let mut state = seed;
    Array::from_shape_fn(IxDyn(shape), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    })
}

#[test]
fn test_recovers_planted_atom_from_close_start() {
    let v = planted_observation();

    // Atom perturbed by up to 5%, activations lifted everywhere
    let start_atom = unit_atom() * &noisy(&[1, 1, 8], 3).mapv(|u| 0.95 + 0.1 * u);
    let start_activations = planted_activations().mapv(|h| h + 0.005);

    let config = TnmfConfig::default()
        .with_backend(BackendKind::Direct)
        .with_tolerance(0.0)
        .with_max_iterations(500);
    let result = Factorizer::new(config)
        .unwrap()
        .fit_with(
            &v,
            SampleLayout::Full,
            1,
            &[8],
            Initialization::random()
                .with_dictionary(start_atom)
                .with_activations(start_activations),
        )
        .unwrap();

    let error = result.relative_error(&v).unwrap();
    assert!(error < 1e-3, "relative error {}", error);
    assert!(result.final_objective() < result.initial_objective());

    // Atom shape recovered up to the unit-sum scale
    for (learned, truth) in result.dictionary().iter().zip(unit_atom().iter()) {
        assert!((learned - truth).abs() < 0.02, "{} vs {}", learned, truth);
    }
}

#[test]
fn test_random_start_reduces_error() {
    let v = planted_observation();
    let config = TnmfConfig::default()
        .with_seed(2024)
        .with_max_iterations(300);
    let result = Factorizer::new(config).unwrap().fit(&v, 1, &[8]).unwrap();

    assert!(result.relative_error(&v).unwrap() < 0.5);
    assert!(result.final_objective() < result.initial_objective());
}

fn assert_mostly_nonincreasing(initial: f64, history: &[f64]) {
    let mut values = vec![initial];
    values.extend_from_slice(history);
    let pairs = values.len() - 1;
    let good = values
        .windows(2)
        .filter(|w| w[1] <= w[0] * (1.0 + 1e-9) + 1e-12)
        .count();
    assert!(
        good as f64 >= 0.95 * pairs as f64,
        "{} of {} steps decreased",
        good,
        pairs
    );
}

#[test]
fn test_objective_descends_for_both_divergences() {
    let v = noisy(&[2, 1, 48], 77);
    for divergence in [Divergence::Frobenius, Divergence::KullbackLeibler] {
        for boundary in [Boundary::Full, Boundary::Circular] {
            let config = TnmfConfig::default()
                .with_divergence(divergence)
                .with_boundary(boundary)
                .with_seed(8)
                .with_tolerance(0.0)
                .with_max_iterations(60);
            let result = Factorizer::new(config).unwrap().fit(&v, 3, &[5]).unwrap();

            assert!(!result.objective_history().is_empty());
            assert_mostly_nonincreasing(result.initial_objective(), result.objective_history());
        }
    }
}

#[test]
fn test_backends_produce_matching_fits() {
    let v = noisy(&[1, 2, 12, 10], 5);
    let fit = |kind| {
        let config = TnmfConfig::default()
            .with_backend(kind)
            .with_boundary(Boundary::Circular)
            .with_seed(21)
            .with_tolerance(0.0)
            .with_max_iterations(10);
        Factorizer::new(config).unwrap().fit(&v, 2, &[3, 3]).unwrap()
    };

    let direct = fit(BackendKind::Direct);
    for kind in [BackendKind::Fft, BackendKind::BatchedFft] {
        let other = fit(kind);
        assert_eq!(direct.iterations(), other.iterations());
        for (a, b) in direct
            .objective_history()
            .iter()
            .zip(other.objective_history())
        {
            assert!((a - b).abs() <= 1e-8 * a.abs().max(1.0), "{}: {} vs {}", kind, a, b);
        }
    }
}

#[test]
fn test_cache_does_not_change_results() {
    let v = noisy(&[2, 1, 40], 13);
    let fit = |cache| {
        let config = TnmfConfig::default()
            .with_backend(BackendKind::Fft)
            .with_cache_transforms(cache)
            .with_seed(99)
            .with_max_iterations(25);
        Factorizer::new(config).unwrap().fit(&v, 2, &[6]).unwrap()
    };

    let cached = fit(true);
    let uncached = fit(false);
    assert_eq!(cached.objective_history(), uncached.objective_history());
    assert_eq!(cached.dictionary(), uncached.dictionary());

    let stats = cached.cache_stats().unwrap();
    assert!(stats.hits > 0);
    assert_eq!(uncached.cache_stats().unwrap().hits, 0);
}

#[test]
fn test_seeded_fits_are_reproducible() {
    let v = noisy(&[1, 1, 32], 4);
    let config = TnmfConfig::default().with_seed(123).with_max_iterations(15);
    let factorizer = Factorizer::new(config).unwrap();

    let a = factorizer.fit(&v, 2, &[4]).unwrap();
    let b = factorizer.fit(&v, 2, &[4]).unwrap();
    assert_eq!(a.objective_history(), b.objective_history());
    assert_eq!(a.activations(), b.activations());
}

#[test]
fn test_reduced_layouts_match_full_layout() {
    let full = noisy(&[1, 1, 30], 8);
    let signal = full.clone().into_shape_with_order(IxDyn(&[30])).unwrap();
    let channels = full.clone().into_shape_with_order(IxDyn(&[1, 30])).unwrap();

    let factorizer = Factorizer::new(TnmfConfig::default().with_seed(6).with_max_iterations(12))
        .unwrap();
    let reference = factorizer.fit(&full, 2, &[4]).unwrap();

    for (layout, data) in [(SampleLayout::Signal, signal), (SampleLayout::Channels, channels)] {
        let result = factorizer.fit_layout(&data, layout, 2, &[4]).unwrap();
        assert_eq!(result.objective_history(), reference.objective_history());
        assert_eq!(result.activations().shape(), &[1, 2, 30]);
        assert!(result.relative_error(&data).is_ok());
    }
}

#[test]
fn test_independent_channels() {
    let v = noisy(&[2, 3, 20], 31);
    let config = TnmfConfig::default()
        .with_channel_mode(ChannelMode::Independent)
        .with_seed(4)
        .with_max_iterations(40);
    let result = Factorizer::new(config).unwrap().fit(&v, 2, &[3]).unwrap();

    assert_eq!(result.dictionary().shape(), &[2, 3, 3]);
    assert_eq!(result.activations().shape(), &[2, 2, 3, 20]);
    assert_eq!(result.reconstruct().unwrap().shape(), &[2, 3, 20]);
    assert!(result.final_objective() < result.initial_objective());
}

#[test]
fn test_atom_reconstructions_sum_to_reconstruction() {
    let v = noisy(&[1, 1, 24], 2);
    let result = Factorizer::new(TnmfConfig::default().with_seed(1).with_max_iterations(10))
        .unwrap()
        .fit(&v, 3, &[4])
        .unwrap();

    let total = result.reconstruct().unwrap();
    let mut sum = ArrayD::<f64>::zeros(IxDyn(total.shape()));
    for k in 0..3 {
        sum = sum + result.reconstruct_atom(k).unwrap();
    }
    for (a, b) in total.iter().zip(sum.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    assert!(matches!(
        result.reconstruct_atom(3),
        Err(TnmfError::InvalidInput(_))
    ));
}

#[test]
fn test_refit_lowers_divergence() {
    let v = noisy(&[1, 1, 40], 19);
    let config = TnmfConfig::default()
        .with_backend(BackendKind::Direct)
        .with_sparsity(0.5)
        .with_seed(12)
        .with_tolerance(0.0)
        .with_max_iterations(30);

    let plain = Factorizer::new(config.clone()).unwrap().fit(&v, 2, &[5]).unwrap();
    let refit = Factorizer::new(config.with_refit_iterations(20))
        .unwrap()
        .fit(&v, 2, &[5])
        .unwrap();

    let plain_divergence = objective(
        Divergence::Frobenius,
        v.as_slice().unwrap(),
        plain.reconstruct().unwrap().as_slice().unwrap(),
        1e-9,
    );
    let refit_divergence = refit.refit_objective().unwrap();
    assert!(refit_divergence <= plain_divergence * (1.0 + 1e-9));
    assert_eq!(plain.objective_history(), refit.objective_history());
}

#[test]
fn test_sparsity_shrinks_activations() {
    let v = noisy(&[1, 1, 40], 23);
    let fit = |sparsity| {
        let config = TnmfConfig::default()
            .with_sparsity(sparsity)
            .with_seed(3)
            .with_tolerance(0.0)
            .with_max_iterations(80);
        Factorizer::new(config).unwrap().fit(&v, 2, &[4]).unwrap()
    };
    let dense: f64 = fit(0.0).activations().sum();
    let sparse: f64 = fit(2.0).activations().sum();
    assert!(sparse < dense, "{} !< {}", sparse, dense);
}

#[test]
fn test_sparse_fits_run_without_stalling() {
    let v = noisy(&[1, 1, 40], 31);
    for sparsity in [0.1, 0.5] {
        for normalization in [AtomNormalization::UnitSum, AtomNormalization::UnitEnergy] {
            let config = TnmfConfig::default()
                .with_backend(BackendKind::Direct)
                .with_sparsity(sparsity)
                .with_normalization(normalization)
                .with_seed(5)
                .with_tolerance(0.0)
                .with_max_iterations(150);
            let result = Factorizer::new(config).unwrap().fit(&v, 2, &[5]).unwrap();

            assert_eq!(
                result.status(),
                FitStatus::MaxIterationsReached,
                "sparsity {} {:?}: {:?}",
                sparsity,
                normalization,
                result.warnings()
            );
            assert!(result.warnings().is_empty());
            assert_eq!(result.iterations(), 150);
        }
    }
}

#[test]
fn test_objective_increase_stalls_fit() {
    // Third atom-gradient call is the numerator of the second iteration
    let backend: Arc<dyn TransformBackend> = Arc::new(InflatedAtomStep::new(2, 50.0));
    let config = TnmfConfig::default()
        .with_seed(6)
        .with_tolerance(0.0)
        .with_max_iterations(20);
    let factorizer = Factorizer::with_backend(config, backend).unwrap();

    let v = noisy(&[1, 1, 32], 41);
    let result = factorizer.fit(&v, 2, &[4]).unwrap();

    assert_eq!(result.status(), FitStatus::Stalled);
    assert!(result.stalled());
    assert!(result.converged());
    assert_eq!(result.iterations(), 2);
    assert_eq!(result.objective_history().len(), 2);

    let history = result.objective_history();
    assert_eq!(result.warnings().len(), 1);
    match result.warnings()[0] {
        FitWarning::NumericalStall {
            iteration,
            previous,
            current,
        } => {
            assert_eq!(iteration, 2);
            assert_eq!(previous, history[0]);
            assert_eq!(current, history[1]);
            assert!(current > previous);
        }
    }
    assert_eq!(result.final_objective(), history[1]);
}

#[test]
fn test_atom_larger_than_observation() {
    let v = noisy(&[1, 1, 8], 1);
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit(&v, 1, &[9])
        .unwrap_err();
    assert!(err.is_shape_mismatch());
}

#[test]
fn test_observation_without_spatial_axis() {
    let v = noisy(&[2, 3], 1);
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit(&v, 1, &[1])
        .unwrap_err();
    assert!(err.is_shape_mismatch());
}

#[test]
fn test_supplied_factor_with_wrong_shape() {
    let v = noisy(&[1, 1, 16], 1);
    let init = Initialization::random().with_activations(Array::zeros(IxDyn(&[1, 2, 15])));
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit_with(&v, SampleLayout::Full, 2, &[3], init)
        .unwrap_err();
    assert!(err.is_shape_mismatch());
}

#[test]
fn test_negative_observation() {
    let mut v = noisy(&[1, 1, 16], 1);
    v[[0, 0, 3]] = -1.0;
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit(&v, 1, &[3])
        .unwrap_err();
    assert!(matches!(err, TnmfError::InvalidInput(_)));

    v[[0, 0, 3]] = f64::NAN;
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit(&v, 1, &[3])
        .unwrap_err();
    assert!(matches!(err, TnmfError::InvalidInput(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = Factorizer::new(TnmfConfig::default().with_eps(-1.0)).unwrap_err();
    assert!(matches!(err, TnmfError::InvalidConfig(_)));

    let v = noisy(&[1, 1, 16], 1);
    let err = Factorizer::new(TnmfConfig::default())
        .unwrap()
        .fit(&v, 0, &[3])
        .unwrap_err();
    assert!(matches!(err, TnmfError::InvalidConfig(_)));
}

/// Backend that only realizes zero-padded boundaries
struct FullOnly;

impl TransformBackend for FullOnly {
    fn name(&self) -> &'static str {
        "full-only"
    }

    fn supported_boundaries(&self) -> &'static [Boundary] {
        &[Boundary::Full]
    }

    fn forward_convolve(
        &self,
        atoms: &VersionedTensor,
        activations: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        ensure_supported(self, geometry.boundary())?;
        DirectBackend.forward_convolve(atoms, activations, geometry)
    }

    fn gradient_wrt_activation(
        &self,
        atoms: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        ensure_supported(self, geometry.boundary())?;
        DirectBackend.gradient_wrt_activation(atoms, signal, geometry)
    }

    fn gradient_wrt_atom(
        &self,
        activations: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        ensure_supported(self, geometry.boundary())?;
        DirectBackend.gradient_wrt_atom(activations, signal, geometry)
    }
}

/// Direct backend that scales one atom-gradient result
struct InflatedAtomStep {
    calls: AtomicUsize,
    target: usize,
    factor: f64,
}

impl InflatedAtomStep {
    fn new(target: usize, factor: f64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            target,
            factor,
        }
    }
}

impl TransformBackend for InflatedAtomStep {
    fn name(&self) -> &'static str {
        "inflated-atom-step"
    }

    fn supported_boundaries(&self) -> &'static [Boundary] {
        DirectBackend.supported_boundaries()
    }

    fn forward_convolve(
        &self,
        atoms: &VersionedTensor,
        activations: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        DirectBackend.forward_convolve(atoms, activations, geometry)
    }

    fn gradient_wrt_activation(
        &self,
        atoms: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        DirectBackend.gradient_wrt_activation(atoms, signal, geometry)
    }

    fn gradient_wrt_atom(
        &self,
        activations: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        let gradient = DirectBackend.gradient_wrt_atom(activations, signal, geometry)?;
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.target {
            Ok(gradient * self.factor)
        } else {
            Ok(gradient)
        }
    }
}

#[test]
fn test_custom_backend() {
    let backend: Arc<dyn TransformBackend> = Arc::new(FullOnly);

    let err = Factorizer::with_backend(
        TnmfConfig::default().with_boundary(Boundary::Circular),
        Arc::clone(&backend),
    )
    .unwrap_err();
    assert!(err.is_unsupported_mode());

    let factorizer = Factorizer::with_backend(
        TnmfConfig::default().with_seed(1).with_max_iterations(5),
        backend,
    )
    .unwrap();
    assert_eq!(factorizer.backend().name(), "full-only");

    let v = noisy(&[1, 1, 16], 9);
    let result = factorizer.fit(&v, 1, &[3]).unwrap();
    assert!(result.cache_stats().is_none());
    assert!(matches!(
        result.status(),
        FitStatus::Converged | FitStatus::Stalled | FitStatus::MaxIterationsReached
    ));
}

#[test]
fn test_direct_backend_supports_both_boundaries() {
    let backend = create_backend(BackendKind::Direct, false);
    assert!(backend.supports(Boundary::Circular));
    assert!(backend.supports(Boundary::Full));
}
