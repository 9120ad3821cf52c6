//! Performance benchmarks for the convolution backends
//!
//! Run with: cargo bench -p tnmf-kernels
//!
//! Benchmarks cover:
//! - Forward convolution per backend, 1-D and 2-D
//! - Activation gradient with and without the transform cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tnmf_core::{BackendKind, Boundary, ChannelMode, ProblemGeometry, VersionedTensor};
use tnmf_kernels::create_backend;

fn filled(shape: &[usize]) -> VersionedTensor {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|i| ((i * 17 + 5) % 29) as f64 / 29.0).collect();
    VersionedTensor::from_vec(data, shape).unwrap()
}

fn bench_forward_1d(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_1d");

    for &(n, m) in [(256, 8), (1024, 32), (4096, 64)].iter() {
        let g = ProblemGeometry::new(&[4, 1, n], 8, &[m], Boundary::Full, ChannelMode::Shared)
            .unwrap();
        let w = filled(&g.dictionary_shape());
        let h = filled(&g.activation_shape());
        group.throughput(Throughput::Elements((4 * 8 * n * m) as u64));

        for kind in [BackendKind::Direct, BackendKind::Fft, BackendKind::BatchedFft] {
            let backend = create_backend(kind, false);
            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), format!("n{}_m{}", n, m)),
                &n,
                |bencher, _| {
                    bencher.iter(|| black_box(backend.forward_convolve(&w, &h, &g).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_forward_2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_2d");

    for &(n, m) in [(32, 5), (64, 8)].iter() {
        let g = ProblemGeometry::new(
            &[2, 3, n, n],
            4,
            &[m, m],
            Boundary::Circular,
            ChannelMode::Shared,
        )
        .unwrap();
        let w = filled(&g.dictionary_shape());
        let h = filled(&g.activation_shape());

        for kind in [BackendKind::Fft, BackendKind::BatchedFft] {
            let backend = create_backend(kind, false);
            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), format!("{}x{}", n, n)),
                &n,
                |bencher, _| {
                    bencher.iter(|| black_box(backend.forward_convolve(&w, &h, &g).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_cached_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("activation_gradient_cache");

    let g = ProblemGeometry::new(&[8, 2, 2048], 6, &[32], Boundary::Full, ChannelMode::Shared)
        .unwrap();
    let w = filled(&g.dictionary_shape());
    let v = filled(&g.observation_shape());

    for cached in [false, true] {
        let backend = create_backend(BackendKind::BatchedFft, cached);
        let label = if cached { "cached" } else { "uncached" };
        group.bench_function(label, |bencher| {
            bencher.iter(|| black_box(backend.gradient_wrt_activation(&w, &v, &g).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_forward_1d,
    bench_forward_2d,
    bench_cached_gradient
);
criterion_main!(benches);
