//! Reconstruction objectives and their multiplicative update terms
//!
//! For both divergences the gradient with respect to a factor splits into a
//! positive and a negative part, each of which is an adjoint correlation of
//! some signal:
//!
//! | Divergence | numerator signal | denominator signal |
//! |------------|------------------|--------------------|
//! | Frobenius  | `V`              | `R`                |
//! | KL         | `V / max(R, ε)`  | `1`                |
//!
//! The optimizer correlates both signals with the fixed factor and applies
//! `X *= num / max(den, ε)`.

use scirs2_core::ndarray_ext::Zip;
use std::borrow::Cow;
use tnmf_core::{Divergence, VersionedTensor};

/// Numerator and denominator signals of one multiplicative update
#[derive(Debug)]
pub struct MultiplicativeTerms<'a> {
    pub numerator: Cow<'a, VersionedTensor>,
    pub denominator: Cow<'a, VersionedTensor>,
}

/// Fit-long Kullback-Leibler signals
///
/// The ratio `V / max(R, ε)` is rewritten in place on every update, so it keeps
/// one identity for the whole fit and each new version replaces the cached
/// spectrum of the previous one. The all-ones signal never changes.
#[derive(Debug)]
pub struct KlSignals {
    ratio: VersionedTensor,
    ones: VersionedTensor,
}

impl KlSignals {
    pub fn new(shape: &[usize]) -> Self {
        Self {
            ratio: VersionedTensor::zeros(shape),
            ones: VersionedTensor::from_elem(shape, 1.0),
        }
    }

    pub fn ratio(&self) -> &VersionedTensor {
        &self.ratio
    }

    pub fn ones(&self) -> &VersionedTensor {
        &self.ones
    }
}

/// Signals for an update at reconstruction `reconstruction`
///
/// With Kullback-Leibler, `kl` holds the tensors the terms are written into;
/// without it a fresh ratio and ones tensor are allocated.
pub fn multiplicative_terms<'a>(
    divergence: Divergence,
    observation: &'a VersionedTensor,
    reconstruction: &'a VersionedTensor,
    kl: Option<&'a mut KlSignals>,
    eps: f64,
) -> MultiplicativeTerms<'a> {
    match divergence {
        Divergence::Frobenius => MultiplicativeTerms {
            numerator: Cow::Borrowed(observation),
            denominator: Cow::Borrowed(reconstruction),
        },
        Divergence::KullbackLeibler => match kl {
            Some(kl) => {
                kl.ratio.update(|q| {
                    Zip::from(q)
                        .and(observation.view())
                        .and(reconstruction.view())
                        .for_each(|q, &v, &r| *q = v / r.max(eps));
                });
                let kl: &'a KlSignals = kl;
                MultiplicativeTerms {
                    numerator: Cow::Borrowed(&kl.ratio),
                    denominator: Cow::Borrowed(&kl.ones),
                }
            }
            None => MultiplicativeTerms {
                numerator: Cow::Owned(VersionedTensor::new(
                    Zip::from(observation.view())
                        .and(reconstruction.view())
                        .map_collect(|&v, &r| v / r.max(eps)),
                )),
                denominator: Cow::Owned(VersionedTensor::from_elem(observation.shape(), 1.0)),
            },
        },
    }
}

/// Divergence between observation `v` and reconstruction `r`
///
/// - Frobenius: `½ Σ (v − r)²`
/// - Kullback-Leibler: `Σ v·ln(v / max(r, ε)) − v + r`, with `0·ln 0 = 0`
pub fn objective(divergence: Divergence, v: &[f64], r: &[f64], eps: f64) -> f64 {
    match divergence {
        Divergence::Frobenius => {
            0.5 * v
                .iter()
                .zip(r)
                .map(|(v, r)| (v - r) * (v - r))
                .sum::<f64>()
        }
        Divergence::KullbackLeibler => v
            .iter()
            .zip(r)
            .map(|(&v, &r)| {
                let log_term = if v > 0.0 { v * (v / r.max(eps)).ln() } else { 0.0 };
                log_term - v + r
            })
            .sum(),
    }
}
