//! Benchmarks for similarity matching performance
//!
//! This benchmark measures:
//! - Raw text similarity scoring per algorithm
//! - Full candidate scans at realistic cache sizes
//! - Query normalization overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ai_cache_rust::similarity::text;
use ai_cache_rust::similarity::{
    SimilarityAlgorithm, SimilarityCandidate, SimilarityConfig, SimilarityMatcher,
};
use ai_cache_rust::types::CacheContext;

const SHORT_A: &str = "how do I center a div?";
const SHORT_B: &str = "how to center a div";

const LONG_A: &str = "I have a React component that fetches user data on mount, \
    but the request fires twice in development and the loading spinner never \
    goes away. How should I structure the effect so the fetch runs exactly once \
    and cleans up properly when the component unmounts?";
const LONG_B: &str = "My React component calls the API twice when it mounts and \
    the spinner stays on screen forever. What is the right way to write the \
    effect so it only fetches once and cancels the request on unmount?";

fn web_context() -> CacheContext {
    CacheContext::new()
        .with_project_type("web")
        .with_language("typescript")
        .with_framework("react")
        .with_file_context("src/components/UserCard.tsx")
}

fn candidate_pool(size: usize) -> Vec<SimilarityCandidate> {
    let topics = [
        "center a div with flexbox",
        "debounce a search input",
        "fetch data in a useEffect hook",
        "type a generic React component",
        "memoize an expensive selector",
        "handle form validation errors",
        "lazy load a route component",
        "share state between sibling components",
    ];
    (0..size)
        .map(|i| SimilarityCandidate {
            cache_key: format!("{:064x}", i),
            query: format!("how do I {} in project {}", topics[i % topics.len()], i),
            context: web_context(),
        })
        .collect()
}

fn bench_text_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_similarity");

    for (name, func) in [
        ("levenshtein", text::levenshtein_similarity as fn(&str, &str) -> f64),
        ("jaccard", text::jaccard_similarity),
        ("cosine", text::cosine_similarity),
        ("hybrid", text::hybrid_similarity),
    ] {
        group.bench_with_input(BenchmarkId::new(name, "short"), &(SHORT_A, SHORT_B), |b, (x, y)| {
            b.iter(|| func(black_box(x), black_box(y)))
        });
        group.bench_with_input(BenchmarkId::new(name, "long"), &(LONG_A, LONG_B), |b, (x, y)| {
            b.iter(|| func(black_box(x), black_box(y)))
        });
    }

    group.finish();
}

fn bench_candidate_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_scan");
    let matcher = SimilarityMatcher::new(SimilarityConfig::new().with_threshold(0.75));
    let context = web_context();

    for size in [10usize, 100, 1000] {
        let pool = candidate_pool(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("find_matches", size), &pool, |b, pool| {
            b.iter(|| {
                matcher.find_matches(
                    black_box("how do I fetch data in a useEffect hook"),
                    black_box(&context),
                    black_box(pool),
                )
            })
        });
    }

    group.finish();
}

fn bench_algorithm_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithm_scan_100");
    let pool = candidate_pool(100);
    let context = web_context();
    group.throughput(Throughput::Elements(100));

    for algorithm in [
        SimilarityAlgorithm::Levenshtein,
        SimilarityAlgorithm::Jaccard,
        SimilarityAlgorithm::Cosine,
        SimilarityAlgorithm::Hybrid,
    ] {
        let matcher =
            SimilarityMatcher::new(SimilarityConfig::new().with_algorithm(algorithm));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", algorithm)),
            &pool,
            |b, pool| {
                b.iter(|| {
                    matcher.find_matches(
                        black_box("how do I memoize an expensive selector"),
                        black_box(&context),
                        black_box(pool),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let matcher = SimilarityMatcher::new(SimilarityConfig::default());

    c.bench_function("normalize_query", |b| {
        b.iter(|| matcher.normalize(black_box("  How do I CENTER a div, really?!  ")))
    });
}

criterion_group!(
    benches,
    bench_text_similarity,
    bench_candidate_scan,
    bench_algorithm_end_to_end,
    bench_normalization,
);
criterion_main!(benches);
