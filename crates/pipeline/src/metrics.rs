use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct Metrics {
    // Counters
    model_calls: AtomicUsize,
    failed_model_calls: AtomicUsize,
    cache_hits: AtomicUsize,
    documents_summarized: AtomicUsize,
    document_failures: AtomicUsize,
    chunks_summarized: AtomicUsize,

    // Timing (in microseconds)
    total_summarize_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_model_call(&self, success: bool) {
        self.model_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_model_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_summarized(&self, duration: Duration, chunks: usize) {
        self.total_summarize_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_document_failure(&self) {
        self.document_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents = self.documents_summarized.load(Ordering::Relaxed);
        let total_us = self.total_summarize_time_us.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            model_calls: self.model_calls.load(Ordering::Relaxed),
            failed_model_calls: self.failed_model_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            documents_summarized: documents,
            document_failures: self.document_failures.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            avg_summarize_time_ms: if documents > 0 {
                total_us / documents as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub model_calls: usize,
    pub failed_model_calls: usize,
    pub cache_hits: usize,
    pub documents_summarized: usize,
    pub document_failures: usize,
    pub chunks_summarized: usize,
    pub avg_summarize_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
