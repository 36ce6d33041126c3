use common::{LabelGains, LabelRow, LabeledQuery, Result};
use criterion::{Criterion, criterion_group, criterion_main};
use evaluation::{Evaluator, GradedRelevance, Judgments, ndcg_at_k, soft_ap_at_k};
use search_core::{Retriever, ScoredId};

/// Every query sees the same shifted window of the catalog.
struct Rotating;

impl Retriever for Rotating {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        let offset = query.len() as u64;
        Ok((0..k as u64)
            .map(|rank| ScoredId {
                id: (offset + rank * 3) % 1_000,
                score: 1.0 / (rank + 1) as f32,
            })
            .collect())
    }
}

fn bench_metrics(c: &mut Criterion) {
    let graded = (0..200u64)
        .map(|id| (id * 5, [0.0, 1.0, 2.0][(id % 3) as usize]))
        .collect::<GradedRelevance>();
    let predicted = (0..100u64).collect::<Vec<_>>();

    c.bench_function("ndcg_at_100", |b| {
        b.iter(|| ndcg_at_k(&graded, &predicted, 100))
    });
    c.bench_function("soft_ap_at_100", |b| {
        b.iter(|| soft_ap_at_k(&graded, &predicted, 100))
    });

    let queries = (0..500u64)
        .map(|id| LabeledQuery::new(id, "x".repeat(1 + (id % 40) as usize)))
        .collect::<Vec<_>>();
    let judgments = (0..500u64)
        .flat_map(|q| {
            (0..20u64).map(move |i| {
                let label = ["exact", "partial", "irrelevant"][(i % 3) as usize];
                LabelRow::new(q, (q + i * 7) % 1_000, label)
            })
        })
        .collect::<Judgments>();
    let evaluator = Evaluator::new(10, LabelGains::default()).expect("evaluator");

    c.bench_function("evaluate_500_queries", |b| {
        b.iter(|| evaluator.evaluate(&queries, &judgments, &Rotating))
    });
}

criterion_group!(benches, bench_metrics);
criterion_main!(benches);
