//! Property-based tests for geometry and versioned tensors

use super::*;
use proptest::prelude::*;

fn modes() -> impl Strategy<Value = (Boundary, ChannelMode)> {
    (
        prop_oneof![Just(Boundary::Full), Just(Boundary::Circular)],
        prop_oneof![Just(ChannelMode::Shared), Just(ChannelMode::Independent)],
    )
}

proptest! {
    /// Slice indices enumerate every activation slice exactly once
    #[test]
    fn test_activation_slices_are_a_bijection(
        samples in 1usize..4,
        channels in 1usize..4,
        atoms in 1usize..4,
        (boundary, mode) in modes(),
    ) {
        let g = ProblemGeometry::new(&[samples, channels, 6], atoms, &[3], boundary, mode).unwrap();
        let mut seen = vec![0usize; g.num_activation_slices()];
        for n in 0..samples {
            for k in 0..atoms {
                let ac = g.activation_channels();
                for c in 0..ac {
                    seen[g.activation_slice(n, k, c)] += 1;
                }
            }
        }
        prop_assert!(seen.iter().all(|&count| count == 1));
    }

    /// Derived shapes agree with the slice counts
    #[test]
    fn test_shape_products_match_slice_counts(
        samples in 1usize..4,
        channels in 1usize..4,
        atoms in 1usize..5,
        n in 4usize..12,
        m in 1usize..4,
        (boundary, mode) in modes(),
    ) {
        let g = ProblemGeometry::new(&[samples, channels, n, n], atoms, &[m, m], boundary, mode).unwrap();
        let act: usize = g.activation_shape().iter().product();
        let dict: usize = g.dictionary_shape().iter().product();
        let obs: usize = g.observation_shape().iter().product();
        prop_assert_eq!(act, g.num_activation_slices() * g.spatial_len());
        prop_assert_eq!(dict, g.num_atom_slices() * g.atom_len());
        prop_assert_eq!(obs, g.num_observation_slices() * g.spatial_len());
    }

    /// Versions grow strictly with every mutation while the identity stays fixed
    #[test]
    fn test_versions_are_monotonic(steps in 1usize..20) {
        let mut t = VersionedTensor::zeros(&[3, 3]);
        let id = t.id();
        let mut last = t.version();
        for i in 0..steps {
            t.update(|mut v| v.fill(i as f64));
            prop_assert!(t.version() > last);
            prop_assert_eq!(t.id(), id);
            last = t.version();
        }
    }
}
