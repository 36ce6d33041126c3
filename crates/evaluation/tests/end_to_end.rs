use std::{fs, path::PathBuf, sync::Arc};

use common::{
    Item, LabelGains, LabelRow, LabeledQuery, LexicalConfig, ProductField, Result,
    RetrievalDefaults,
};
use evaluation::{EvaluationReport, EvaluationTelemetry, Evaluator, Judgments, evaluate};
use search_core::{DenseIndex, Embedder, HybridRetriever, MultiFieldScorer, Retriever};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    items: Vec<FixtureItem>,
    queries: Vec<FixtureQuery>,
    labels: Vec<FixtureLabel>,
}

#[derive(Debug, Deserialize)]
struct FixtureItem {
    id: u64,
    name: String,
    description: String,
    brand: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct FixtureQuery {
    id: u64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct FixtureLabel {
    query_id: u64,
    product_id: u64,
    label: String,
}

/// Bag of product-type words; enough of a semantic signal for the fixture.
struct ProductTypeEmbedder;

impl Embedder for ProductTypeEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                ["chair", "bench", "lamp", "table", "rug"]
                    .iter()
                    .map(|kind| lower.split_whitespace().filter(|w| w == kind).count() as f32)
                    .collect()
            })
            .collect())
    }
}

fn load_fixture() -> Fixture {
    let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("judged_catalog.json");
    let raw = fs::read_to_string(fixture_path).expect("fixture");
    serde_json::from_str(&raw).expect("parse fixture")
}

fn catalog(fixture: &Fixture) -> Vec<Item> {
    fixture
        .items
        .iter()
        .map(|item| {
            Item::new(item.id)
                .with_field(ProductField::Name, &item.name)
                .with_field(ProductField::Description, &item.description)
                .with_field(ProductField::Brand, &item.brand)
                .with_field(ProductField::Category, &item.category)
        })
        .collect()
}

fn queries(fixture: &Fixture) -> Vec<LabeledQuery> {
    fixture
        .queries
        .iter()
        .map(|q| LabeledQuery::new(q.id, &q.text))
        .collect()
}

fn judgments(fixture: &Fixture) -> Judgments {
    fixture
        .labels
        .iter()
        .map(|l| LabelRow::new(l.query_id, l.product_id, &l.label))
        .collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

fn assert_exact_items_ranked_first(report: &EvaluationReport) {
    assert_eq!(report.evaluated, 7);
    let failed = report.failures.iter().map(|f| f.query_id).collect::<Vec<_>>();
    assert_eq!(failed, vec![7]);
    for metrics in &report.per_query {
        if metrics.query_id == 8 {
            assert_eq!(metrics.relevant, 0);
            assert_eq!((metrics.map, metrics.ndcg), (0.0, 0.0));
        } else {
            assert_close(metrics.map, 1.0);
            assert_close(metrics.ndcg, 1.0);
        }
    }
    assert_close(report.map, 6.0 / 7.0);
    assert_close(report.ndcg, 6.0 / 7.0);
}

#[test]
fn lexical_scorer_evaluates_against_fixture_labels() {
    let fixture = load_fixture();
    let scorer = MultiFieldScorer::fit(&catalog(&fixture), &LexicalConfig::default())
        .expect("fit");
    let report = evaluate(
        &queries(&fixture),
        &judgments(&fixture),
        &scorer,
        5,
        LabelGains::default(),
    )
    .expect("report");

    assert_exact_items_ranked_first(&report);
    // partial items sit right behind the exact one for queries 1 and 4
    let partial_ranked_second = (1.0 + 1.5 / 2.0 * 0.5) / 1.5;
    assert_close(report.soft_ap, (4.0 + 2.0 * partial_ranked_second) / 7.0);
    assert!(report.per_query.iter().all(|m| m.retrieved <= 5));
}

#[test]
fn hybrid_retrieval_evaluates_through_the_same_path() {
    let fixture = load_fixture();
    let corpus = catalog(&fixture);
    let lexical: Arc<dyn Retriever> = Arc::new(
        MultiFieldScorer::fit(&corpus, &LexicalConfig::default()).expect("fit"),
    );
    let semantic: Arc<dyn Retriever> =
        Arc::new(DenseIndex::fit(&corpus, ProductTypeEmbedder, true).expect("dense"));
    let hybrid = HybridRetriever::lexical_semantic(
        lexical,
        Arc::clone(&semantic),
        &RetrievalDefaults::default(),
    )
    .expect("hybrid");

    let telemetry = Arc::new(EvaluationTelemetry::default());
    let evaluator = Evaluator::new(5, LabelGains::default())
        .expect("evaluator")
        .with_telemetry(Arc::clone(&telemetry));
    let report = evaluator.evaluate(&queries(&fixture), &judgments(&fixture), &hybrid);
    assert_exact_items_ranked_first(&report);

    let dense = evaluator.evaluate(&queries(&fixture), &judgments(&fixture), semantic.as_ref());
    assert_eq!(dense.evaluated, 7);
    assert!((0.0..=1.0).contains(&dense.map));

    let s = telemetry.snapshot();
    assert_eq!(s.runs_completed, 2);
    assert_eq!(s.queries_evaluated, 14);
    assert_eq!(s.queries_failed, 2);
}

#[test]
fn report_round_trips_through_json() {
    let fixture = load_fixture();
    let scorer = MultiFieldScorer::fit(&catalog(&fixture), &LexicalConfig::default())
        .expect("fit");
    let report = evaluate(
        &queries(&fixture),
        &judgments(&fixture),
        &scorer,
        5,
        LabelGains::default(),
    )
    .expect("report");

    let json = serde_json::to_string_pretty(&report).expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value["k"], 5);
    assert_eq!(value["per_query"][0]["query_id"], 1);
    assert_eq!(value["failures"][0]["query_id"], 7);
    assert!(
        value["failures"][0]["error"]
            .as_str()
            .is_some_and(|e| e.contains("invalid argument"))
    );
}
