//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Remote scorer round trip
    Inference,
    /// Full scan pipeline
    Scan,
    /// Evaluator pass over all candidate runs
    Evaluation,
}

/// Monotonic counters
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Symbols returning at least one closed bar
    SymbolsFetched,
    /// Symbols dropped after an exchange error
    FetchFailures,
    /// Rows that received a finite score
    RowsScored,
    /// Result rows persisted by the snapshot writer
    ResultsWritten,
    /// Evaluation rows persisted
    EvalRecordsWritten,
    /// Forward returns rejected by the sanity bound
    ReturnsDiscarded,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Ranked symbols in the latest run
    UniverseSize,
    /// Unix seconds of the latest scanned bar boundary
    LastScanBoundary,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::Inference => "scanner_inference_latency_ms",
            LatencyMetric::Scan => "scanner_scan_duration_ms",
            LatencyMetric::Evaluation => "scanner_evaluation_duration_ms",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::SymbolsFetched => "scanner_symbols_fetched_total",
            CounterMetric::FetchFailures => "scanner_fetch_failures_total",
            CounterMetric::RowsScored => "scanner_rows_scored_total",
            CounterMetric::ResultsWritten => "scanner_results_written_total",
            CounterMetric::EvalRecordsWritten => "scanner_eval_records_written_total",
            CounterMetric::ReturnsDiscarded => "scanner_returns_discarded_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::UniverseSize => "scanner_universe_size",
            GaugeMetric::LastScanBoundary => "scanner_last_boundary_seconds",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1_000.0;
    ::metrics::histogram!(metric.name()).record(value_ms);
    tracing::debug!(metric = metric.name(), value_ms, "Recording latency");
}

/// Increment a counter
pub fn record_count(metric: CounterMetric, value: u64) {
    ::metrics::counter!(metric.name()).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(metric.name()).set(value);
    tracing::debug!(metric = metric.name(), value, "Setting gauge");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_namespaced() {
        for name in [
            LatencyMetric::Inference.name(),
            CounterMetric::ReturnsDiscarded.name(),
            GaugeMetric::UniverseSize.name(),
        ] {
            assert!(name.starts_with("scanner_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_latency(LatencyMetric::Inference, Duration::from_millis(12));
        record_count(CounterMetric::RowsScored, 3);
        set_gauge(GaugeMetric::UniverseSize, 42.0);
    }
}
