//! N-dimensional Fourier transform engines
//!
//! Two engines back the spectral convolution backends:
//!
//! - [`Scirs2Fft`]: `scirs2_fft::fftn` / `ifftn` on dynamic-rank arrays
//! - [`PlannedFft`]: `rustfft` plans reused across calls, with all lanes of an
//!   axis gathered into one buffer and transformed by a single `process` call
//!
//! Both compute the unnormalized forward transform and a `1/L`-normalized
//! inverse, so `inverse_real(forward(x)) == x` up to rounding.

use parking_lot::Mutex;
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};
use scirs2_core::ndarray_ext::ArrayD;
use scirs2_core::numeric::Complex64;
use tnmf_core::{Grid, TnmfError, TnmfResult};

/// Forward/inverse N-d DFT over a row-major block
pub trait FourierTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Forward transform of real data laid out on `shape`
    fn forward(&self, real: Vec<f64>, shape: &[usize]) -> TnmfResult<Vec<Complex64>>;

    /// Normalized inverse transform, keeping the real part
    fn inverse_real(&self, spectrum: Vec<Complex64>, shape: &[usize]) -> TnmfResult<Vec<f64>>;
}

/// Transforms via `scirs2_fft`
#[derive(Debug, Clone, Copy, Default)]
pub struct Scirs2Fft;

impl FourierTransform for Scirs2Fft {
    fn name(&self) -> &'static str {
        "scirs2-fft"
    }

    fn forward(&self, real: Vec<f64>, shape: &[usize]) -> TnmfResult<Vec<Complex64>> {
        use scirs2_fft::fftn;

        let array = ArrayD::from_shape_vec(shape.to_vec(), real)
            .map_err(|e| TnmfError::transform("fftn", e.to_string()))?;
        let spectrum = fftn(&array, None, None, None, None, None)
            .map_err(|e| TnmfError::transform("fftn", e.to_string()))?;
        Ok(spectrum.iter().copied().collect())
    }

    fn inverse_real(&self, spectrum: Vec<Complex64>, shape: &[usize]) -> TnmfResult<Vec<f64>> {
        use scirs2_fft::ifftn;

        let array = ArrayD::from_shape_vec(shape.to_vec(), spectrum)
            .map_err(|e| TnmfError::transform("ifftn", e.to_string()))?;
        let signal = ifftn(&array, None, None, None, None, None)
            .map_err(|e| TnmfError::transform("ifftn", e.to_string()))?;
        Ok(signal.iter().map(|c| c.re).collect())
    }
}

/// Planned, axis-batched transforms via `rustfft`
pub struct PlannedFft {
    planner: Mutex<FftPlanner<f64>>,
}

impl Default for PlannedFft {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlannedFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedFft").finish_non_exhaustive()
    }
}

impl PlannedFft {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// In-place unnormalized transform along every axis of `shape`
    fn transform(&self, data: &mut [Complex<f64>], shape: &[usize], direction: FftDirection) {
        let grid = Grid::new(shape);
        let total = data.len();

        for (axis, &len) in shape.iter().enumerate() {
            if len <= 1 {
                continue;
            }
            // The planner memoizes plans per (len, direction)
            let fft = self.planner.lock().plan_fft(len, direction);
            let stride = grid.strides()[axis];

            if stride == 1 {
                fft.process(data);
                continue;
            }

            let block = len * stride;
            let mut lanes = Vec::with_capacity(total);
            for outer in (0..total).step_by(block) {
                for inner in 0..stride {
                    lanes.extend((0..len).map(|j| data[outer + inner + j * stride]));
                }
            }

            fft.process(&mut lanes);

            let mut pos = 0;
            for outer in (0..total).step_by(block) {
                for inner in 0..stride {
                    for j in 0..len {
                        data[outer + inner + j * stride] = lanes[pos];
                        pos += 1;
                    }
                }
            }
        }
    }
}

impl FourierTransform for PlannedFft {
    fn name(&self) -> &'static str {
        "rustfft"
    }

    fn forward(&self, real: Vec<f64>, shape: &[usize]) -> TnmfResult<Vec<Complex64>> {
        check_len("rustfft forward", real.len(), shape)?;
        let mut buf: Vec<Complex<f64>> = real.into_iter().map(|v| Complex::new(v, 0.0)).collect();
        self.transform(&mut buf, shape, FftDirection::Forward);
        Ok(buf.into_iter().map(|c| Complex64::new(c.re, c.im)).collect())
    }

    fn inverse_real(&self, spectrum: Vec<Complex64>, shape: &[usize]) -> TnmfResult<Vec<f64>> {
        check_len("rustfft inverse", spectrum.len(), shape)?;
        let mut buf: Vec<Complex<f64>> = spectrum
            .into_iter()
            .map(|c| Complex::new(c.re, c.im))
            .collect();
        self.transform(&mut buf, shape, FftDirection::Inverse);
        // rustfft does not normalize
        let scale = 1.0 / buf.len().max(1) as f64;
        Ok(buf.into_iter().map(|c| c.re * scale).collect())
    }
}

fn check_len(operation: &str, len: usize, shape: &[usize]) -> TnmfResult<()> {
    let expected: usize = shape.iter().product();
    if len != expected {
        return Err(TnmfError::transform(
            operation,
            format!("buffer of {} elements does not fit shape {:?}", len, shape),
        ));
    }
    Ok(())
}
