//! Boundary policy
//!
//! The forward convolution `R[x] = Σ_s W[s]·H[x − s]` and the adjoint
//! correlation `G[u] = Σ_v A[v]·Y[u + v]` read samples outside the observation
//! extent near its edges. [`BoundaryPolicy`] decides what those reads return:
//!
//! - [`Boundary::Full`]: zero. Spectral backends zero-pad every axis to at least
//!   `n + m − 1` so the circular product equals the linear one, then crop.
//! - [`Boundary::Circular`]: the sample at the wrapped index `mod n`. Spectral
//!   backends transform at exactly `n`.
//!
//! Every backend routes its index arithmetic or its padding through this module,
//! which keeps forward and adjoint operators consistent.

use tnmf_core::{Boundary, Grid, ProblemGeometry};

/// Index rules of a boundary mode
pub trait BoundaryPolicy {
    /// Transform length along one axis with observation extent `n` and atom extent `m`
    fn transform_extent(&self, n: usize, m: usize) -> usize;

    /// Source coordinate of `x − s` on an axis of extent `n`
    fn lagged(&self, x: usize, s: usize, n: usize) -> Option<usize>;

    /// Source coordinate of `u + v` on an axis of extent `n`
    fn led(&self, u: usize, v: usize, n: usize) -> Option<usize>;
}

impl BoundaryPolicy for Boundary {
    fn transform_extent(&self, n: usize, m: usize) -> usize {
        match self {
            Boundary::Full => next_fast_len(n + m - 1),
            Boundary::Circular => n,
        }
    }

    #[inline]
    fn lagged(&self, x: usize, s: usize, n: usize) -> Option<usize> {
        match self {
            Boundary::Full => x.checked_sub(s),
            Boundary::Circular => Some((x + n - s % n) % n),
        }
    }

    #[inline]
    fn led(&self, u: usize, v: usize, n: usize) -> Option<usize> {
        let t = u + v;
        match self {
            Boundary::Full => (t < n).then_some(t),
            Boundary::Circular => Some(t % n),
        }
    }
}

/// Smallest length `≥ n` whose only prime factors are 2, 3 and 5
///
/// # Examples
///
/// ```
/// use tnmf_kernels::boundary::next_fast_len;
///
/// assert_eq!(next_fast_len(7), 8);
/// assert_eq!(next_fast_len(11), 12);
/// assert_eq!(next_fast_len(97), 100);
/// ```
pub fn next_fast_len(n: usize) -> usize {
    let mut candidate = n.max(1);
    loop {
        let mut rest = candidate;
        for p in [2, 3, 5] {
            while rest % p == 0 {
                rest /= p;
            }
        }
        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

/// Per-axis transform shape for a problem
pub fn transform_shape(geometry: &ProblemGeometry) -> Vec<usize> {
    let boundary = geometry.boundary();
    geometry
        .spatial()
        .iter()
        .zip(geometry.atom_spatial())
        .map(|(&n, &m)| boundary.transform_extent(n, m))
        .collect()
}

/// Flat source offset of `x − s` within `grid`, or `None` if it falls outside
pub fn lagged_offset(
    boundary: Boundary,
    x: &[usize],
    s: &[usize],
    grid: &Grid,
) -> Option<usize> {
    let mut offset = 0;
    for d in 0..grid.ndim() {
        offset += boundary.lagged(x[d], s[d], grid.shape()[d])? * grid.strides()[d];
    }
    Some(offset)
}

/// Flat source offset of `u + v` within `grid`, or `None` if it falls outside
pub fn led_offset(boundary: Boundary, u: &[usize], v: &[usize], grid: &Grid) -> Option<usize> {
    let mut offset = 0;
    for d in 0..grid.ndim() {
        offset += boundary.led(u[d], v[d], grid.shape()[d])? * grid.strides()[d];
    }
    Some(offset)
}

/// Zero-pad a block on `from` into the leading corner of `to`
pub fn pad_into(src: &[f64], from: &Grid, to: &Grid) -> Vec<f64> {
    let mut out = vec![0.0; to.len()];
    from.for_each_index(|flat, index| {
        out[to.ravel(index)] = src[flat];
    });
    out
}

/// Extract the leading `to` corner of a block laid out on `from`
pub fn crop(src: &[f64], from: &Grid, to: &Grid) -> Vec<f64> {
    let mut out = vec![0.0; to.len()];
    to.for_each_index(|flat, index| {
        out[flat] = src[from.ravel(index)];
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnmf_core::ChannelMode;

    #[test]
    fn test_next_fast_len() {
        assert_eq!(next_fast_len(1), 1);
        assert_eq!(next_fast_len(16), 16);
        assert_eq!(next_fast_len(17), 18);
        assert_eq!(next_fast_len(71), 72);
        assert_eq!(next_fast_len(121), 125);
    }

    #[test]
    fn test_transform_shape_per_boundary() {
        let full =
            ProblemGeometry::new(&[1, 1, 64, 30], 2, &[8, 5], Boundary::Full, ChannelMode::Shared)
                .unwrap();
        assert_eq!(transform_shape(&full), vec![72, 36]);

        let circular = ProblemGeometry::new(
            &[1, 1, 64, 30],
            2,
            &[8, 5],
            Boundary::Circular,
            ChannelMode::Shared,
        )
        .unwrap();
        assert_eq!(transform_shape(&circular), vec![64, 30]);
    }

    #[test]
    fn test_index_rules() {
        assert_eq!(Boundary::Full.lagged(3, 5, 10), None);
        assert_eq!(Boundary::Full.lagged(5, 3, 10), Some(2));
        assert_eq!(Boundary::Circular.lagged(3, 5, 10), Some(8));

        assert_eq!(Boundary::Full.led(8, 3, 10), None);
        assert_eq!(Boundary::Circular.led(8, 3, 10), Some(1));
    }

    #[test]
    fn test_pad_then_crop() {
        let small = Grid::new(&[2, 3]);
        let large = Grid::new(&[4, 5]);
        let src = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let padded = pad_into(&src, &small, &large);
        assert_eq!(padded.len(), 20);
        assert_eq!(&padded[0..5], &[1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(&padded[5..10], &[4.0, 5.0, 6.0, 0.0, 0.0]);
        assert_eq!(padded[10..].iter().sum::<f64>(), 0.0);

        assert_eq!(crop(&padded, &large, &small), src);
    }

    #[test]
    fn test_offsets_2d() {
        let grid = Grid::new(&[4, 4]);
        assert_eq!(lagged_offset(Boundary::Full, &[2, 3], &[1, 1], &grid), Some(6));
        assert_eq!(lagged_offset(Boundary::Full, &[0, 3], &[1, 0], &grid), None);
        assert_eq!(
            lagged_offset(Boundary::Circular, &[0, 3], &[1, 0], &grid),
            Some(15)
        );
        assert_eq!(led_offset(Boundary::Full, &[3, 0], &[1, 0], &grid), None);
        assert_eq!(led_offset(Boundary::Circular, &[3, 0], &[1, 2], &grid), Some(2));
    }
}
