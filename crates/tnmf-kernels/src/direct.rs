//! Spatial-domain backend
//!
//! Evaluates every operator as an explicit shifted sum. Cost is
//! `O(|n|·|m|)` per slice pair, which is competitive for small atoms and
//! serves as the reference the spectral backends are checked against.

use crate::backend::{
    check_activation_gradient, check_atom_gradient, check_forward, into_array, TransformBackend,
};
use crate::boundary::{lagged_offset, led_offset};
use scirs2_core::ndarray_ext::ArrayD;
use tnmf_core::{Boundary, Grid, ProblemGeometry, TnmfResult, VersionedTensor};

/// Direct shifted-sum convolution
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBackend;

impl DirectBackend {
    pub fn new() -> Self {
        DirectBackend
    }
}

/// `out[x] += Σ_s kernel[s]·signal[x − s]`, with `out` and `signal` on `grid`
fn convolve_accumulate(
    out: &mut [f64],
    kernel: &[f64],
    kernel_grid: &Grid,
    signal: &[f64],
    grid: &Grid,
    boundary: Boundary,
) {
    kernel_grid.for_each_index(|s_flat, s| {
        let weight = kernel[s_flat];
        if weight == 0.0 {
            return;
        }
        grid.for_each_index(|x_flat, x| {
            if let Some(src) = lagged_offset(boundary, x, s, grid) {
                out[x_flat] += weight * signal[src];
            }
        });
    });
}

/// `out[u] += Σ_v a[v]·signal[u + v]`, with `signal` on `signal_grid`
fn correlate_accumulate(
    out: &mut [f64],
    out_grid: &Grid,
    a: &[f64],
    a_grid: &Grid,
    signal: &[f64],
    signal_grid: &Grid,
    boundary: Boundary,
) {
    a_grid.for_each_index(|v_flat, v| {
        let weight = a[v_flat];
        if weight == 0.0 {
            return;
        }
        out_grid.for_each_index(|u_flat, u| {
            if let Some(src) = led_offset(boundary, u, v, signal_grid) {
                out[u_flat] += weight * signal[src];
            }
        });
    });
}

impl TransformBackend for DirectBackend {
    fn name(&self) -> &'static str {
        "direct"
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

        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());
        let (n_len, m_len) = (grid.len(), atom_grid.len());
        let w = atoms.as_slice();
        let h = activations.as_slice();

        let mut out = vec![0.0; geometry.num_observation_slices() * n_len];
        for n in 0..geometry.samples() {
            for c in 0..geometry.channels() {
                let o = geometry.observation_slice(n, c) * n_len;
                for k in 0..geometry.num_atoms() {
                    let a = geometry.atom_slice(k, c) * m_len;
                    let s = geometry.activation_slice(n, k, c) * n_len;
                    convolve_accumulate(
                        &mut out[o..o + n_len],
                        &w[a..a + m_len],
                        &atom_grid,
                        &h[s..s + n_len],
                        &grid,
                        geometry.boundary(),
                    );
                }
            }
        }
        into_array(OP, geometry.observation_shape(), out)
    }

    fn gradient_wrt_activation(
        &self,
        atoms: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        const OP: &str = "gradient_wrt_activation";
        check_activation_gradient(self, OP, atoms, signal, geometry)?;

        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());
        let (n_len, m_len) = (grid.len(), atom_grid.len());
        let w = atoms.as_slice();
        let y = signal.as_slice();

        let mut out = vec![0.0; geometry.num_activation_slices() * n_len];
        for n in 0..geometry.samples() {
            for k in 0..geometry.num_atoms() {
                for c in 0..geometry.channels() {
                    let g = geometry.activation_slice(n, k, c) * n_len;
                    let a = geometry.atom_slice(k, c) * m_len;
                    let o = geometry.observation_slice(n, c) * n_len;
                    correlate_accumulate(
                        &mut out[g..g + n_len],
                        &grid,
                        &w[a..a + m_len],
                        &atom_grid,
                        &y[o..o + n_len],
                        &grid,
                        geometry.boundary(),
                    );
                }
            }
        }
        into_array(OP, geometry.activation_shape(), out)
    }

    fn gradient_wrt_atom(
        &self,
        activations: &VersionedTensor,
        signal: &VersionedTensor,
        geometry: &ProblemGeometry,
    ) -> TnmfResult<ArrayD<f64>> {
        const OP: &str = "gradient_wrt_atom";
        check_atom_gradient(self, OP, activations, signal, geometry)?;

        let grid = Grid::new(geometry.spatial());
        let atom_grid = Grid::new(geometry.atom_spatial());
        let (n_len, m_len) = (grid.len(), atom_grid.len());
        let h = activations.as_slice();
        let y = signal.as_slice();

        let mut out = vec![0.0; geometry.num_atom_slices() * m_len];
        for k in 0..geometry.num_atoms() {
            for c in 0..geometry.channels() {
                let g = geometry.atom_slice(k, c) * m_len;
                for n in 0..geometry.samples() {
                    let s = geometry.activation_slice(n, k, c) * n_len;
                    let o = geometry.observation_slice(n, c) * n_len;
                    correlate_accumulate(
                        &mut out[g..g + m_len],
                        &atom_grid,
                        &h[s..s + n_len],
                        &grid,
                        &y[o..o + n_len],
                        &grid,
                        geometry.boundary(),
                    );
                }
            }
        }
        into_array(OP, geometry.dictionary_shape(), out)
    }
}
