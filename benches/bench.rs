use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use learned_sort::Key;
use sort_test_tools::patterns;

type SortFn<T> = fn(&mut [T]);

fn sort_impls<T: Key>() -> [(&'static str, SortFn<T>); 3] {
    [
        ("learned_sort", |v| learned_sort::sort(v)),
        ("rust_std_unstable", |v| {
            v.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap())
        }),
        ("rust_std_stable", |v| {
            v.sort_by(|a, b| a.partial_cmp(b).unwrap())
        }),
    ]
}

fn bench_pattern<T: Key>(
    c: &mut Criterion,
    test_len: usize,
    type_name: &str,
    pattern_name: &str,
    input: &[T],
) {
    for (impl_name, sort_fn) in sort_impls::<T>() {
        let id = format!("{impl_name}-hot-{type_name}-{pattern_name}-{test_len}");

        c.bench_function(&id, |b| {
            b.iter_batched_ref(
                || input.to_vec(),
                |v| sort_fn(black_box(v.as_mut_slice())),
                BatchSize::LargeInput,
            )
        });
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    // The smaller length stays below the default dispatch limit and measures
    // the fallback path; the larger one measures the trained engine.
    for test_len in [50_000, 1_000_000] {
        let pattern_providers: Vec<(&'static str, fn(usize) -> Vec<i32>)> = vec![
            ("random", patterns::random),
            ("random_z1", |len| patterns::random_zipf(len, 1.0)),
            ("random_d20", |len| patterns::random_uniform(len, 0..20)),
            ("random_s95", |len| patterns::random_sorted(len, 95.0)),
            ("shuffled_mod16", |len| patterns::shuffled_mod(len, 16)),
            ("ascending", patterns::ascending),
            ("descending", patterns::descending),
        ];

        for (pattern_name, pattern_provider) in pattern_providers {
            let ints = pattern_provider(test_len);
            bench_pattern(c, test_len, "i32", pattern_name, &ints);
        }

        let floats = patterns::normal(test_len);
        bench_pattern(c, test_len, "f64", "normal", &floats);

        let mixture = patterns::gauss_mixture(test_len, 5);
        bench_pattern(c, test_len, "f64", "gauss_mixture", &mixture);
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
