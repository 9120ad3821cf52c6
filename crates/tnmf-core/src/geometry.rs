//! Problem geometry: observation, dictionary and activation shapes
//!
//! A factorization problem is fully described by the observation shape
//! `[samples, channels, *spatial]`, the number of atoms, the atom spatial
//! extent, the boundary policy and the channel mode. All other shapes are
//! derived here so that backends and the optimizer agree on them.
//!
//! Tensors are addressed as a stack of spatial *slices*: the leading axes
//! (`[samples, channels]` for observations, `[atoms, channels]` for the
//! dictionary, `[samples, atoms(, channels)]` for activations) are flattened
//! into a slice index and each slice is a contiguous row-major block.

use crate::error::{TnmfError, TnmfResult};
use crate::types::{Boundary, ChannelMode};
use scirs2_core::ndarray_ext::{ArrayD, Axis};

/// Layout of an observation handed to `fit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleLayout {
    /// `[samples, channels, *spatial]`
    #[default]
    Full,
    /// `[channels, *spatial]`, a single sample
    Channels,
    /// `[*spatial]`, a single single-channel sample
    Signal,
}

impl SampleLayout {
    /// Number of leading axes missing from the canonical layout
    fn missing_axes(&self) -> usize {
        match self {
            SampleLayout::Full => 0,
            SampleLayout::Channels => 1,
            SampleLayout::Signal => 2,
        }
    }

    /// Insert unit axes so the array has the canonical `[samples, channels, *spatial]` layout
    ///
    /// # Examples
    ///
    /// ```
    /// use scirs2_core::ndarray_ext::{Array, IxDyn};
    /// use tnmf_core::SampleLayout;
    ///
    /// let signal = Array::<f64, _>::zeros(IxDyn(&[64]));
    /// let canonical = SampleLayout::Signal.canonicalize(signal).unwrap();
    /// assert_eq!(canonical.shape(), &[1, 1, 64]);
    /// ```
    pub fn canonicalize(&self, array: ArrayD<f64>) -> TnmfResult<ArrayD<f64>> {
        let min_rank = 3 - self.missing_axes();
        if array.ndim() < min_rank {
            return Err(TnmfError::shape_mismatch(
                "SampleLayout::canonicalize",
                vec![min_rank],
                vec![array.ndim()],
                format!(
                    "{:?} layout needs at least {} axes (one spatial axis)",
                    self, min_rank
                ),
            ));
        }
        let mut out = array;
        for _ in 0..self.missing_axes() {
            out = out.insert_axis(Axis(0));
        }
        Ok(out)
    }
}

/// Row-major index arithmetic over an N-d extent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    shape: Vec<usize>,
    strides: Vec<usize>,
    len: usize,
}

impl Grid {
    pub fn new(shape: &[usize]) -> Self {
        let mut strides = vec![1usize; shape.len()];
        for d in (0..shape.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }
        Self {
            shape: shape.to_vec(),
            strides,
            len: shape.iter().product(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Write the multi-index of `flat` into `index`
    pub fn unravel_into(&self, flat: usize, index: &mut [usize]) {
        let mut remaining = flat;
        for (d, &stride) in self.strides.iter().enumerate() {
            index[d] = remaining / stride;
            remaining %= stride;
        }
    }

    /// Flat offset of a multi-index
    pub fn ravel(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Visit every position in row-major order with its flat offset and multi-index
    pub fn for_each_index<F>(&self, mut f: F)
    where
        F: FnMut(usize, &[usize]),
    {
        let mut index = vec![0usize; self.shape.len()];
        for flat in 0..self.len {
            f(flat, &index);
            for d in (0..index.len()).rev() {
                index[d] += 1;
                if index[d] < self.shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }
    }
}

/// Shapes of one factorization problem
///
/// # Examples
///
/// ```
/// use tnmf_core::{Boundary, ChannelMode, ProblemGeometry};
///
/// let geometry = ProblemGeometry::new(
///     &[4, 3, 32, 32],
///     5,
///     &[8, 8],
///     Boundary::Full,
///     ChannelMode::Shared,
/// ).unwrap();
///
/// assert_eq!(geometry.dictionary_shape(), vec![5, 3, 8, 8]);
/// assert_eq!(geometry.activation_shape(), vec![4, 5, 32, 32]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemGeometry {
    samples: usize,
    channels: usize,
    num_atoms: usize,
    spatial: Vec<usize>,
    atom_spatial: Vec<usize>,
    boundary: Boundary,
    channel_mode: ChannelMode,
}

impl ProblemGeometry {
    /// Validate and build a geometry
    ///
    /// # Errors
    ///
    /// [`TnmfError::ShapeMismatch`] when the observation has fewer than three
    /// axes, the atom rank differs from the spatial rank, any extent is zero,
    /// or an atom axis exceeds the matching observation axis.
    /// [`TnmfError::InvalidConfig`] when `num_atoms` is zero.
    pub fn new(
        observation_shape: &[usize],
        num_atoms: usize,
        atom_shape: &[usize],
        boundary: Boundary,
        channel_mode: ChannelMode,
    ) -> TnmfResult<Self> {
        const OP: &str = "ProblemGeometry::new";

        if observation_shape.len() < 3 {
            return Err(TnmfError::shape_mismatch(
                OP,
                vec![3],
                vec![observation_shape.len()],
                "observation must be [samples, channels, *spatial] with at least one spatial axis",
            ));
        }
        if num_atoms == 0 {
            return Err(TnmfError::invalid_config("num_atoms must be at least 1"));
        }
        if observation_shape.iter().any(|&d| d == 0) {
            return Err(TnmfError::shape_mismatch(
                OP,
                vec![],
                observation_shape.to_vec(),
                "observation extents must be positive",
            ));
        }

        let spatial = observation_shape[2..].to_vec();
        if atom_shape.len() != spatial.len() {
            return Err(TnmfError::shape_mismatch(
                OP,
                spatial.clone(),
                atom_shape.to_vec(),
                "atom rank must equal the number of spatial axes",
            ));
        }
        if atom_shape.iter().any(|&d| d == 0) {
            return Err(TnmfError::shape_mismatch(
                OP,
                spatial.clone(),
                atom_shape.to_vec(),
                "atom extents must be positive",
            ));
        }
        if atom_shape.iter().zip(spatial.iter()).any(|(a, n)| a > n) {
            return Err(TnmfError::shape_mismatch(
                OP,
                spatial.clone(),
                atom_shape.to_vec(),
                format!("atom exceeds the observation extent under {}", boundary),
            ));
        }

        Ok(Self {
            samples: observation_shape[0],
            channels: observation_shape[1],
            num_atoms,
            spatial,
            atom_spatial: atom_shape.to_vec(),
            boundary,
            channel_mode,
        })
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn num_atoms(&self) -> usize {
        self.num_atoms
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    /// Spatial extent of observations, reconstructions and activations
    pub fn spatial(&self) -> &[usize] {
        &self.spatial
    }

    /// Spatial extent of each atom
    pub fn atom_spatial(&self) -> &[usize] {
        &self.atom_spatial
    }

    pub fn spatial_len(&self) -> usize {
        self.spatial.iter().product()
    }

    pub fn atom_len(&self) -> usize {
        self.atom_spatial.iter().product()
    }

    /// Channels carried by the activation tensor (1 when shared)
    pub fn activation_channels(&self) -> usize {
        match self.channel_mode {
            ChannelMode::Shared => 1,
            ChannelMode::Independent => self.channels,
        }
    }

    pub fn observation_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.samples, self.channels];
        shape.extend_from_slice(&self.spatial);
        shape
    }

    pub fn dictionary_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.num_atoms, self.channels];
        shape.extend_from_slice(&self.atom_spatial);
        shape
    }

    pub fn activation_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.samples, self.num_atoms];
        if self.channel_mode == ChannelMode::Independent {
            shape.push(self.channels);
        }
        shape.extend_from_slice(&self.spatial);
        shape
    }

    /// Slice index of observation/reconstruction channel `c` of sample `n`
    pub fn observation_slice(&self, n: usize, c: usize) -> usize {
        n * self.channels + c
    }

    /// Slice index of channel `c` of atom `k`
    pub fn atom_slice(&self, k: usize, c: usize) -> usize {
        k * self.channels + c
    }

    /// Slice index of the activation map used by atom `k`, channel `c` of sample `n`
    pub fn activation_slice(&self, n: usize, k: usize, c: usize) -> usize {
        let ac = self.activation_channels();
        let channel = match self.channel_mode {
            ChannelMode::Shared => 0,
            ChannelMode::Independent => c,
        };
        (n * self.num_atoms + k) * ac + channel
    }

    pub fn num_observation_slices(&self) -> usize {
        self.samples * self.channels
    }

    pub fn num_atom_slices(&self) -> usize {
        self.num_atoms * self.channels
    }

    pub fn num_activation_slices(&self) -> usize {
        self.samples * self.num_atoms * self.activation_channels()
    }

    /// Check a tensor shape against the expected one
    pub fn check_shape(
        &self,
        operation: &str,
        what: &str,
        expected: &[usize],
        actual: &[usize],
    ) -> TnmfResult<()> {
        if expected != actual {
            return Err(TnmfError::shape_mismatch(
                operation,
                expected.to_vec(),
                actual.to_vec(),
                format!("{} does not match the problem geometry", what),
            ));
        }
        Ok(())
    }
}
