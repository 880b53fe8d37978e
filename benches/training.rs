use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use vinoveritas::config::EstimatorKind;
use vinoveritas::optimizer::{RandomizedSearch, SearchSpace};
use vinoveritas::training::{Estimator, ModelPipeline};

fn create_wine_like_data(n_rows: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, 11), |_| rng.gen::<f64>());
    let y = Array1::from_iter(
        x.outer_iter()
            .map(|r| (3.0 + 4.0 * r[10] + 2.0 * r[1] + rng.gen::<f64>() * 0.5).round().clamp(3.0, 9.0)),
    );
    (x, y)
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let space = SearchSpace::new()
        .randint("max_iter", 20, 60)
        .uniform("learning_rate", 0.05, 0.15)
        .randint("max_leaf_nodes", 8, 32);

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_wine_like_data(*n_rows);
        group.bench_with_input(BenchmarkId::new("hist_n5_k3", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                RandomizedSearch::new(ModelPipeline::for_estimator(EstimatorKind::Hist, 42), space.clone())
                    .with_n_iter(5)
                    .with_cv(3)
                    .with_seed(42)
                    .fit(black_box(x), black_box(y))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    for kind in [EstimatorKind::Hist, EstimatorKind::Classic] {
        let (x, y) = create_wine_like_data(2000);
        let mut model = ModelPipeline::for_estimator(kind, 42);
        model.fit(&x, &y).unwrap();
        group.bench_with_input(BenchmarkId::new("predict", kind), &x, |b, x| {
            b.iter(|| model.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search, bench_prediction);
criterion_main!(benches);
