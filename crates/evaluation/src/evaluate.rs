use std::sync::Arc;

use common::{LabelGains, LabeledQuery, QueryId, RankError, RankingConfig, Result};
use rayon::prelude::*;
use search_core::Retriever;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    judgments::Judgments,
    metrics::{map_at_k, ndcg_at_k, soft_ap_at_k},
    telemetry::EvaluationTelemetry,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetrics {
    pub query_id: QueryId,
    pub map: f64,
    pub soft_ap: f64,
    pub ndcg: f64,
    pub retrieved: usize,
    /// Items carrying the binary label for this query.
    pub relevant: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub query_id: QueryId,
    pub error: String,
}

/// Mean metrics over every query that could be retrieved. Failed queries are
/// listed in `failures` and left out of the means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub evaluated: usize,
    pub map: f64,
    pub soft_ap: f64,
    pub ndcg: f64,
    pub per_query: Vec<QueryMetrics>,
    pub failures: Vec<QueryFailure>,
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    k: usize,
    gains: LabelGains,
    telemetry: Option<Arc<EvaluationTelemetry>>,
}

impl Evaluator {
    pub fn new(k: usize, gains: LabelGains) -> Result<Self> {
        if k == 0 {
            return Err(RankError::invalid("evaluation cutoff k must be at least 1"));
        }
        gains.validate()?;
        Ok(Self {
            k,
            gains,
            telemetry: None,
        })
    }

    /// Cutoff from `default_top_k`, gain schemes from `[gains]`.
    pub fn from_config(config: &RankingConfig) -> Result<Self> {
        Self::new(config.default_top_k, config.gains.clone())
    }

    pub fn with_telemetry(mut self, telemetry: Arc<EvaluationTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Runs every query through `retriever` once, in parallel, and scores the
    /// top `k` against `judgments`. Queries without labels score 0.0.
    pub fn evaluate<R: Retriever + ?Sized>(
        &self,
        queries: &[LabeledQuery],
        judgments: &Judgments,
        retriever: &R,
    ) -> EvaluationReport {
        let outcomes = queries
            .par_iter()
            .map(|query| self.evaluate_query(query, judgments, retriever))
            .collect::<Vec<_>>();

        let mut per_query = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(metrics) => per_query.push(metrics),
                Err(failure) => failures.push(failure),
            }
        }

        let report = EvaluationReport {
            k: self.k,
            evaluated: per_query.len(),
            map: mean(per_query.iter().map(|m| m.map)),
            soft_ap: mean(per_query.iter().map(|m| m.soft_ap)),
            ndcg: mean(per_query.iter().map(|m| m.ndcg)),
            per_query,
            failures,
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_run(unix_now_ms());
        }
        info!(
            k = report.k,
            evaluated = report.evaluated,
            failed = report.failures.len(),
            map = report.map,
            soft_ap = report.soft_ap,
            ndcg = report.ndcg,
            "evaluation finished"
        );
        report
    }

    fn evaluate_query<R: Retriever + ?Sized>(
        &self,
        query: &LabeledQuery,
        judgments: &Judgments,
        retriever: &R,
    ) -> std::result::Result<QueryMetrics, QueryFailure> {
        let predicted = match retriever.search_ids(&query.text, self.k) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(query_id = query.id, error = %err, "query skipped");
                if let Some(telemetry) = &self.telemetry {
                    telemetry.inc_queries_failed();
                }
                return Err(QueryFailure {
                    query_id: query.id,
                    error: err.to_string(),
                });
            }
        };

        let truth = judgments.binary_truth(query.id, &self.gains.binary_label);
        let soft = judgments.graded(query.id, &self.gains.soft);
        let graded = judgments.graded(query.id, &self.gains.ndcg);
        if let Some(telemetry) = &self.telemetry {
            telemetry.inc_queries_evaluated();
        }
        Ok(QueryMetrics {
            query_id: query.id,
            map: map_at_k(&truth, &predicted, self.k),
            soft_ap: soft_ap_at_k(&soft, &predicted, self.k),
            ndcg: ndcg_at_k(&graded, &predicted, self.k),
            retrieved: predicted.len(),
            relevant: truth.len(),
        })
    }
}

/// One-shot form of [`Evaluator::evaluate`].
pub fn evaluate<R: Retriever + ?Sized>(
    queries: &[LabeledQuery],
    judgments: &Judgments,
    retriever: &R,
    k: usize,
    gains: LabelGains,
) -> Result<EvaluationReport> {
    Ok(Evaluator::new(k, gains)?.evaluate(queries, judgments, retriever))
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

fn unix_now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::{
        GainScheme, ItemId, LabelGains, LabelRow, LabeledQuery, RankError, RankingConfig, Result,
        check_search_args,
    };
    use search_core::{Retriever, ScoredId};

    use super::{Evaluator, evaluate};
    use crate::{judgments::Judgments, telemetry::EvaluationTelemetry};

    /// Returns a fixed ranking per query text.
    struct Scripted(Vec<(&'static str, Vec<ItemId>)>);

    impl Retriever for Scripted {
        fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
            check_search_args(query, k)?;
            let ranking = self
                .0
                .iter()
                .find(|(text, _)| *text == query)
                .map(|(_, ids)| ids.clone())
                .unwrap_or_default();
            Ok(ranking
                .into_iter()
                .take(k)
                .enumerate()
                .map(|(rank, id)| ScoredId {
                    id,
                    score: 1.0 / (rank + 1) as f32,
                })
                .collect())
        }
    }

    fn retriever() -> Scripted {
        Scripted(vec![
            ("chair", vec![1, 3, 2]),
            ("table", vec![6, 5]),
            ("lamp", vec![3]),
        ])
    }

    fn queries() -> Vec<LabeledQuery> {
        vec![
            LabeledQuery::new(1, "chair"),
            LabeledQuery::new(2, "table"),
            LabeledQuery::new(3, "  "),
            LabeledQuery::new(4, "lamp"),
        ]
    }

    fn judgments() -> Judgments {
        Judgments::from_rows([
            LabelRow::new(1, 1, "Exact"),
            LabelRow::new(1, 2, "Exact"),
            LabelRow::new(1, 3, "Irrelevant"),
            LabelRow::new(2, 6, "Partial"),
            LabelRow::new(2, 5, "Exact"),
        ])
    }

    #[test]
    fn report_averages_successful_queries() {
        let report = Evaluator::new(3, LabelGains::default())
            .expect("evaluator")
            .evaluate(&queries(), &judgments(), &retriever());

        assert_eq!(report.k, 3);
        assert_eq!(report.evaluated, 3);
        let order = report.per_query.iter().map(|m| m.query_id).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 4]);

        let chair = &report.per_query[0];
        assert!((chair.map - 5.0 / 6.0).abs() < 1e-9);
        assert!((chair.soft_ap - 5.0 / 6.0).abs() < 1e-9);
        assert!((chair.ndcg - 3.0 / (2.0 + 2.0 / 3f64.log2())).abs() < 1e-9);
        assert_eq!(chair.relevant, 2);

        let table = &report.per_query[1];
        assert!((table.map - 0.5).abs() < 1e-9);
        assert!((table.soft_ap - 2.0 / 3.0).abs() < 1e-9);

        let lamp = &report.per_query[2];
        assert_eq!((lamp.map, lamp.soft_ap, lamp.ndcg), (0.0, 0.0, 0.0));
        assert_eq!(lamp.retrieved, 1);

        let expected_map = (5.0 / 6.0 + 0.5) / 3.0;
        assert!((report.map - expected_map).abs() < 1e-9);
        assert!((report.soft_ap - 0.5).abs() < 1e-9);
        let expected_ndcg = (chair.ndcg + table.ndcg) / 3.0;
        assert!((report.ndcg - expected_ndcg).abs() < 1e-9);
    }

    #[test]
    fn failing_queries_are_isolated() {
        let report = Evaluator::new(3, LabelGains::default())
            .expect("evaluator")
            .evaluate(&queries(), &judgments(), &retriever());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].query_id, 3);
        assert!(report.failures[0].error.contains("non-empty"));
    }

    #[test]
    fn nothing_evaluated_means_zero() {
        let report = Evaluator::new(5, LabelGains::default())
            .expect("evaluator")
            .evaluate(&[LabeledQuery::new(9, "")], &judgments(), &retriever());
        assert_eq!(report.evaluated, 0);
        assert_eq!((report.map, report.soft_ap, report.ndcg), (0.0, 0.0, 0.0));

        let empty = Evaluator::new(5, LabelGains::default())
            .expect("evaluator")
            .evaluate(&[], &judgments(), &retriever());
        assert!(empty.per_query.is_empty() && empty.failures.is_empty());
    }

    #[test]
    fn rejects_zero_k_and_negative_gains() {
        assert!(matches!(
            Evaluator::new(0, LabelGains::default()),
            Err(RankError::InvalidArgument(_))
        ));
        let gains = LabelGains {
            soft: GainScheme::new([("exact", -1.0)]),
            ..LabelGains::default()
        };
        assert!(matches!(
            evaluate(&queries(), &judgments(), &retriever(), 3, gains),
            Err(RankError::Configuration(_))
        ));
    }

    #[test]
    fn config_supplies_cutoff_and_gains() {
        let mut config = RankingConfig::default();
        config.default_top_k = 1;
        config.gains.binary_label = "partial".to_string();
        let evaluator = Evaluator::from_config(&config).expect("evaluator");
        assert_eq!(evaluator.k(), 1);

        let report = evaluator.evaluate(&queries(), &judgments(), &retriever());
        assert_eq!(report.k, 1);
        let table = &report.per_query[1];
        assert_eq!(table.retrieved, 1);
        assert!((table.map - 1.0).abs() < 1e-9);

        config.default_top_k = 0;
        assert!(matches!(
            Evaluator::from_config(&config),
            Err(RankError::InvalidArgument(_))
        ));
    }

    #[test]
    fn custom_gains_change_graded_metrics_only() {
        let gains = LabelGains {
            soft: GainScheme::new([("exact", 1.0), ("partial", 1.0)]),
            ..LabelGains::default()
        };
        let report = evaluate(&queries(), &judgments(), &retriever(), 3, gains).expect("report");
        let table = &report.per_query[1];
        assert!((table.soft_ap - 1.0).abs() < 1e-9);
        assert!((table.map - 0.5).abs() < 1e-9);
    }

    #[test]
    fn telemetry_counts_queries_and_runs() {
        let telemetry = Arc::new(EvaluationTelemetry::default());
        let evaluator = Evaluator::new(3, LabelGains::default())
            .expect("evaluator")
            .with_telemetry(Arc::clone(&telemetry));
        evaluator.evaluate(&queries(), &judgments(), &retriever());
        evaluator.evaluate(&queries()[..1], &judgments(), &retriever());

        let s = telemetry.snapshot();
        assert_eq!(s.runs_completed, 2);
        assert_eq!(s.queries_evaluated, 4);
        assert_eq!(s.queries_failed, 1);
        assert!(s.last_run_unix_ms > 0);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = evaluate(&queries(), &judgments(), &retriever(), 3, LabelGains::default())
            .expect("report");
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["k"], 3);
        assert_eq!(json["evaluated"], 3);
        assert_eq!(json["failures"][0]["query_id"], 3);
        assert_eq!(json["per_query"].as_array().map(Vec::len), Some(3));
    }
}
