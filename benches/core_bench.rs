use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guardscope_core::{
    InterpretationEngine, PredictionResult, PredictionSet, RequestSummary, ScenarioParameters,
};
use rand::{rngs::StdRng, SeedableRng};

fn mock_set() -> PredictionSet {
    let predictions = (1..=10)
        .map(|rank| PredictionResult {
            rank,
            guard_ip: format!("185.220.101.{}", rank),
            country: if rank % 3 == 0 { "US" } else { "DE" }.to_string(),
            confidence: 95.0 - rank as f64 * 6.5,
        })
        .collect();

    PredictionSet {
        model_used: "ensemble".to_string(),
        request_summary: RequestSummary {
            exit_ip: "45.33.32.156".to_string(),
            exit_country: "DE".to_string(),
            bandwidth: Some(7.5),
            circuit_setup_duration: Some(2.0),
            total_bytes: Some(500_000),
        },
        top_k: 10,
        predictions,
    }
}

fn bench_interpret(c: &mut Criterion) {
    let engine = InterpretationEngine::default();
    let set = mock_set();
    let mut rng = StdRng::seed_from_u64(1);

    c.bench_function("aggregate_confidence_top10", |b| {
        b.iter(|| engine.aggregate_confidence(black_box(&set.predictions)))
    });

    c.bench_function("interpret_top10", |b| {
        b.iter(|| engine.interpret(black_box(&set), &mut rng))
    });
}

fn bench_reanalyze(c: &mut Criterion) {
    let engine = InterpretationEngine::default();
    let set = mock_set();
    let scenario = ScenarioParameters {
        circuit_setup_duration: 4.5,
        total_bytes: 1_200_000,
        exit_country: "US".to_string(),
    };
    let mut rng = StdRng::seed_from_u64(2);

    c.bench_function("reanalyze_top10", |b| {
        b.iter(|| engine.reanalyze(black_box(&set.predictions), black_box(&scenario), &mut rng))
    });
}

criterion_group!(benches, bench_interpret, bench_reanalyze);
criterion_main!(benches);
