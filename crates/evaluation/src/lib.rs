pub mod evaluate;
pub mod judgments;
pub mod metrics;
pub mod telemetry;

pub use evaluate::{EvaluationReport, Evaluator, QueryFailure, QueryMetrics, evaluate};
pub use judgments::{Judgment, Judgments};
pub use metrics::{GradedRelevance, dcg_at_k, map_at_k, ndcg_at_k, soft_ap_at_k};
pub use telemetry::{EvaluationTelemetry, EvaluationTelemetrySnapshot};
