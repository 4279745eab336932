//! # Prometheus Metrics
//!
//! Counters and a latency histogram for the retry engine. Everything lives
//! in a dedicated [`prometheus::Registry`] with the `meridian` prefix, so an
//! embedding application can merge or expose it however it likes.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Metric handles for the retry engine.
///
/// Cheap to clone: prometheus handles are reference counted.
#[derive(Clone)]
pub struct ExecutionMetrics {
    registry: Registry,
    /// Every request sent to a node.
    pub execute_attempts_total: IntCounter,
    /// Attempts that ended in a transport error or a malformed response.
    pub transport_failures_total: IntCounter,
    /// Attempts answered with a transient status.
    pub transient_status_total: IntCounter,
    /// Executions ended by a definitive rejection.
    pub rejections_total: IntCounter,
    pub executions_succeeded_total: IntCounter,
    /// Executions that ended in any error, rejections included.
    pub executions_failed_total: IntCounter,
    /// Wall time of whole executions, first send to outcome.
    pub execute_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl ExecutionMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("meridian".into()), None)?;

        let execute_attempts_total = counter(
            &registry,
            "execute_attempts_total",
            "Requests sent to nodes",
        )?;
        let transport_failures_total = counter(
            &registry,
            "transport_failures_total",
            "Attempts that failed below the application layer",
        )?;
        let transient_status_total = counter(
            &registry,
            "transient_status_total",
            "Attempts answered with a transient status",
        )?;
        let rejections_total = counter(
            &registry,
            "rejections_total",
            "Executions definitively rejected by a node",
        )?;
        let executions_succeeded_total = counter(
            &registry,
            "executions_succeeded_total",
            "Executions that succeeded",
        )?;
        let executions_failed_total = counter(
            &registry,
            "executions_failed_total",
            "Executions that failed for any reason",
        )?;

        let execute_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "execute_latency_seconds",
                "End-to-end execution latency in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0,
            ]),
        )?;
        registry.register(Box::new(execute_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            execute_attempts_total,
            transport_failures_total,
            transient_status_total,
            rejections_total,
            executions_succeeded_total,
            executions_failed_total,
            execute_latency_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ExecutionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionMetrics")
            .field("execute_attempts_total", &self.execute_attempts_total.get())
            .field("executions_succeeded_total", &self.executions_succeeded_total.get())
            .field("executions_failed_total", &self.executions_failed_total.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_with_prefix() {
        let metrics = ExecutionMetrics::new().unwrap();
        metrics.execute_attempts_total.inc_by(3);
        metrics.execute_latency_seconds.observe(0.2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("meridian_execute_attempts_total 3"));
        assert!(text.contains("meridian_execute_latency_seconds_bucket"));
    }

    #[test]
    fn independent_instances_do_not_collide() {
        let a = ExecutionMetrics::new().unwrap();
        let b = ExecutionMetrics::new().unwrap();
        a.rejections_total.inc();
        assert_eq!(b.rejections_total.get(), 0);
    }
}
