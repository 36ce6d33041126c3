use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared across evaluation runs; cheap to update from rayon workers.
#[derive(Debug, Default)]
pub struct EvaluationTelemetry {
    runs_completed: AtomicU64,
    queries_evaluated: AtomicU64,
    queries_failed: AtomicU64,
    last_run_unix_ms: AtomicU64,
}

impl EvaluationTelemetry {
    pub fn inc_queries_evaluated(&self) {
        self.queries_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self, finished_unix_ms: u64) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.last_run_unix_ms
            .store(finished_unix_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EvaluationTelemetrySnapshot {
        EvaluationTelemetrySnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            queries_evaluated: self.queries_evaluated.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            last_run_unix_ms: self.last_run_unix_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationTelemetrySnapshot {
    pub runs_completed: u64,
    pub queries_evaluated: u64,
    pub queries_failed: u64,
    pub last_run_unix_ms: u64,
}
