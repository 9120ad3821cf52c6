//! Fourier-domain backends
//!
//! Convolution becomes a pointwise product and correlation a product with the
//! conjugate spectrum:
//!
//! ```text
//! R̂[n, c] = Σ_k Ŵ[k, c] · Ĥ[n, k]
//! Ĝ_H[n, k] = Σ_c conj(Ŵ[k, c]) · Ŷ[n, c]
//! Ĝ_W[k, c] = Σ_n conj(Ĥ[n, k]) · Ŷ[n, c]
//! ```
//!
//! Operands are zero-padded to the transform shape chosen by the boundary
//! policy and results are cropped back. Operand spectra go through a
//! [`TransformCache`], so the observation is transformed once per fit and the
//! dictionary once per update.
//!
//! Each output slice is reduced in a fixed order regardless of how slices are
//! scheduled, so parallel and sequential evaluation give identical bits.

use crate::backend::{
    check_activation_gradient, check_atom_gradient, check_forward, into_array, TransformBackend,
};
use crate::boundary::{crop, pad_into, transform_shape};
use crate::cache::{CacheKey, CacheStats, TransformCache};
use crate::fourier::{FourierTransform, PlannedFft, Scirs2Fft};
use scirs2_core::ndarray_ext::ArrayD;
use scirs2_core::numeric::Complex64;
use scirs2_core::parallel_ops::*;
use std::sync::Arc;
use tnmf_core::{
    Boundary, ChannelMode, Grid, ProblemGeometry, TnmfResult, VersionedTensor,
};

/// Spectra of every spatial slice of one tensor
#[derive(Debug, Clone)]
pub struct Spectra {
    slices: Vec<Vec<Complex64>>,
}

impl Spectra {
    pub fn slice(&self, index: usize) -> &[Complex64] {
        &self.slices[index]
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Convolution backend over a [`FourierTransform`] engine
pub struct SpectralBackend<T> {
    name: &'static str,
    engine: T,
    cache: TransformCache<Spectra>,
    parallel: bool,
}

/// Spectral backend on `scirs2_fft`, evaluated slice by slice
pub type FftBackend = SpectralBackend<Scirs2Fft>;

/// Spectral backend on planned `rustfft` transforms, slices evaluated in parallel
pub type BatchedFftBackend = SpectralBackend<PlannedFft>;

impl SpectralBackend<Scirs2Fft> {
    pub fn scirs2(cache_transforms: bool) -> Self {
        Self::with_engine("fft", Scirs2Fft, cache_transforms, false)
    }
}

impl SpectralBackend<PlannedFft> {
    pub fn planned(cache_transforms: bool) -> Self {
        Self::with_engine("batched-fft", PlannedFft::new(), cache_transforms, true)
    }
}

impl<T: FourierTransform> SpectralBackend<T> {
    pub fn with_engine(name: &'static str, engine: T, cache_transforms: bool, parallel: bool) -> Self {
        Self {
            name,
            engine,
            cache: TransformCache::with_enabled(cache_transforms),
            parallel,
        }
    }

    pub fn engine(&self) -> &T {
        &self.engine
    }

    pub fn cache(&self) -> &TransformCache<Spectra> {
        &self.cache
    }

    /// Padded spectra of `tensor`, viewed as `count` slices on `slice_grid`
    fn spectra(
        &self,
        tensor: &VersionedTensor,
        slice_grid: &Grid,
        count: usize,
        transform_grid: &Grid,
        boundary: Boundary,
    ) -> TnmfResult<Arc<Spectra>> {
        let key = CacheKey::new(tensor.key(), boundary, transform_grid.shape());
        self.cache.get_or_compute(key, || {
            let data = tensor.as_slice();
            let len = slice_grid.len();
            let slices = self.map_slices(count, |i| {
                let padded = pad_into(&data[i * len..(i + 1) * len], slice_grid, transform_grid);
                self.engine.forward(padded, transform_grid.shape())
            })?;
            Ok(Spectra { slices })
        })
    }

    /// Evaluate `f` for every slice index, in order
    fn map_slices<R, F>(&self, count: usize, f: F) -> TnmfResult<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> TnmfResult<R> + Sync + Send,
    {
        if self.parallel && count > 1 {
            (0..count).into_par_iter().map(&f).collect()
        } else {
            (0..count).map(f).collect()
        }
    }

    /// Inverse transform of `acc`, cropped to `to`
    fn synthesize(
        &self,
        acc: Vec<Complex64>,
        transform_grid: &Grid,
        to: &Grid,
    ) -> TnmfResult<Vec<f64>> {
        let real = self.engine.inverse_real(acc, transform_grid.shape())?;
        Ok(crop(&real, transform_grid, to))
    }
}

/// `acc += a · b`, or `conj(a) · b` when `conjugate`
#[inline]
fn multiply_accumulate(acc: &mut [Complex64], a: &[Complex64], b: &[Complex64], conjugate: bool) {
    if conjugate {
        for ((out, x), y) in acc.iter_mut().zip(a).zip(b) {
            *out += x.conj() * y;
        }
    } else {
        for ((out, x), y) in acc.iter_mut().zip(a).zip(b) {
            *out += x * y;
        }
    }
}

impl<T: FourierTransform> TransformBackend for SpectralBackend<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supported_boundaries(&self) -> &'static [Boundary] {
        &[Boundary::Full, Boundary::Circular]
    }

    fn forward_convolve(
        &self,
        atoms: &VersionedTensor,
        activations: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        const OP: &str = "forward_convolve";
        check_forward(self, OP, atoms, activations, geometry)?;

        let boundary = geometry.boundary();
        let tgrid = Grid::new(&transform_shape(geometry));
        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());

        let w = self.spectra(atoms, &atom_grid, geometry.num_atom_slices(), &tgrid, boundary)?;
        let h = self.spectra(
            activations,
            &grid,
            geometry.num_activation_slices(),
            &tgrid,
            boundary,
        )?;

        let channels = geometry.channels();
        let slices = self.map_slices(geometry.num_observation_slices(), |i| {
            let (n, c) = (i / channels, i % channels);
            let mut acc = vec![Complex64::new(0.0, 0.0); tgrid.len()];
            for k in 0..geometry.num_atoms() {
                multiply_accumulate(
                    &mut acc,
                    w.slice(geometry.atom_slice(k, c)),
                    h.slice(geometry.activation_slice(n, k, c)),
                    false,
                );
            }
            self.synthesize(acc, &tgrid, &grid)
        })?;

        into_array(OP, geometry.observation_shape(), slices.concat())
    }

    fn gradient_wrt_activation(
        &self,
        atoms: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        const OP: &str = "gradient_wrt_activation";
        check_activation_gradient(self, OP, atoms, signal, geometry)?;

        let boundary = geometry.boundary();
        let tgrid = Grid::new(&transform_shape(geometry));
        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());

        let w = self.spectra(atoms, &atom_grid, geometry.num_atom_slices(), &tgrid, boundary)?;
        let y = self.spectra(
            signal,
            &grid,
            geometry.num_observation_slices(),
            &tgrid,
            boundary,
        )?;

        let activation_channels = geometry.activation_channels();
        let num_atoms = geometry.num_atoms();
        let slices = self.map_slices(geometry.num_activation_slices(), |i| {
            let ac = i % activation_channels;
            let k = (i / activation_channels) % num_atoms;
            let n = i / (activation_channels * num_atoms);
            let channels = match geometry.channel_mode() {
                ChannelMode::Shared => 0..geometry.channels(),
                ChannelMode::Independent => ac..ac + 1,
            };

            let mut acc = vec![Complex64::new(0.0, 0.0); tgrid.len()];
            for c in channels {
                multiply_accumulate(
                    &mut acc,
                    w.slice(geometry.atom_slice(k, c)),
                    y.slice(geometry.observation_slice(n, c)),
                    true,
                );
            }
            self.synthesize(acc, &tgrid, &grid)
        })?;

        into_array(OP, geometry.activation_shape(), slices.concat())
    }

    fn gradient_wrt_atom(
        &self,
        activations: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        const OP: &str = "gradient_wrt_atom";
        check_atom_gradient(self, OP, activations, signal, geometry)?;

        let boundary = geometry.boundary();
        let tgrid = Grid::new(&transform_shape(geometry));
        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());

        let h = self.spectra(
            activations,
            &grid,
            geometry.num_activation_slices(),
            &tgrid,
            boundary,
        )?;
        let y = self.spectra(
            signal,
            &grid,
            geometry.num_observation_slices(),
            &tgrid,
            boundary,
        )?;

        let channels = geometry.channels();
        let slices = self.map_slices(geometry.num_atom_slices(), |i| {
            let (k, c) = (i / channels, i % channels);
            let mut acc = vec![Complex64::new(0.0, 0.0); tgrid.len()];
            for n in 0..geometry.samples() {
                multiply_accumulate(
                    &mut acc,
                    h.slice(geometry.activation_slice(n, k, c)),
                    y.slice(geometry.observation_slice(n, c)),
                    true,
                );
            }
            self.synthesize(acc, &tgrid, &atom_grid)
        })?;

        into_array(OP, geometry.dictionary_shape(), slices.concat())
    }

    fn begin_iteration(&self) {
        self.cache.begin_iteration();
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
