//! Metrics Module for RecoBattle
//!
//! Pluggable metrics: a `MetricsExporter` backend (Prometheus or a no-op) behind
//! the `Metrics` facade, which offers recorders for the events of this service.

use async_trait::async_trait;
use log::{debug, warn};
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prefix applied to every metric name
const METRIC_PREFIX: &str = "recobattle";

/// Metrics exporter trait for pluggable monitoring systems
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Increment a counter metric
    async fn increment(&self, name: &str, labels: &[(&str, &str)]);

    /// Set a gauge metric value
    async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Observe a value in a histogram metric
    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Export metrics in the format expected by the monitoring system
    async fn export(&self) -> Result<Vec<u8>, String>;
}

/// Prometheus implementation of MetricsExporter
///
/// Metric families are created lazily on first use. The label names of the first
/// call fix the family's schema; later calls with other label names are dropped
/// with a warning.
#[derive(Default)]
pub struct PrometheusExporter {
    registry: Registry,
    counters: Mutex<HashMap<String, CounterVec>>,
    gauges: Mutex<HashMap<String, GaugeVec>>,
    histograms: Mutex<HashMap<String, HistogramVec>>,
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_name(name: &str) -> String {
        format!("{}_{}", METRIC_PREFIX, name)
    }

    async fn get_or_create_counter(&self, name: &str, label_names: &[&str]) -> Option<CounterVec> {
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get(name) {
            return Some(counter.clone());
        }

        let counter = match CounterVec::new(Opts::new(Self::full_name(name), "Counter metric"), label_names)
        {
            Ok(counter) => counter,
            Err(e) => {
                warn!("Failed to create counter metric {}: {}", name, e);
                return None;
            }
        };

        if let Err(e) = self.registry.register(Box::new(counter.clone())) {
            warn!("Failed to register counter metric {}: {}", name, e);
        }

        counters.insert(name.to_string(), counter.clone());
        Some(counter)
    }

    async fn get_or_create_gauge(&self, name: &str, label_names: &[&str]) -> Option<GaugeVec> {
        let mut gauges = self.gauges.lock().await;
        if let Some(gauge) = gauges.get(name) {
            return Some(gauge.clone());
        }

        let gauge = match GaugeVec::new(Opts::new(Self::full_name(name), "Gauge metric"), label_names) {
            Ok(gauge) => gauge,
            Err(e) => {
                warn!("Failed to create gauge metric {}: {}", name, e);
                return None;
            }
        };

        if let Err(e) = self.registry.register(Box::new(gauge.clone())) {
            warn!("Failed to register gauge metric {}: {}", name, e);
        }

        gauges.insert(name.to_string(), gauge.clone());
        Some(gauge)
    }

    async fn get_or_create_histogram(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Option<HistogramVec> {
        let mut histograms = self.histograms.lock().await;
        if let Some(histogram) = histograms.get(name) {
            return Some(histogram.clone());
        }

        let opts = HistogramOpts::new(Self::full_name(name), "Histogram metric");
        let histogram = match HistogramVec::new(opts, label_names) {
            Ok(histogram) => histogram,
            Err(e) => {
                warn!("Failed to create histogram metric {}: {}", name, e);
                return None;
            }
        };

        if let Err(e) = self.registry.register(Box::new(histogram.clone())) {
            warn!("Failed to register histogram metric {}: {}", name, e);
        }

        histograms.insert(name.to_string(), histogram.clone());
        Some(histogram)
    }

    fn extract_label_names_and_values<'a>(
        labels: &'a [(&'a str, &'a str)],
    ) -> (Vec<&'a str>, HashMap<&'a str, &'a str>) {
        let label_names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        let label_values: HashMap<&str, &str> = labels.iter().copied().collect();
        (label_names, label_values)
    }
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::extract_label_names_and_values(labels);
        let Some(counter) = self.get_or_create_counter(name, &label_names).await else {
            return;
        };

        match counter.get_metric_with(&label_values) {
            Ok(c) => c.inc(),
            Err(e) => warn!("Counter {} rejected labels {:?}: {}", name, labels, e),
        }

        debug!("Incremented counter {} with labels {:?}", name, labels);
    }

    async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::extract_label_names_and_values(labels);
        let Some(gauge) = self.get_or_create_gauge(name, &label_names).await else {
            return;
        };

        match gauge.get_metric_with(&label_values) {
            Ok(g) => g.set(value),
            Err(e) => warn!("Gauge {} rejected labels {:?}: {}", name, labels, e),
        }
    }

    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::extract_label_names_and_values(labels);
        let Some(histogram) = self.get_or_create_histogram(name, &label_names).await else {
            return;
        };

        match histogram.get_metric_with(&label_values) {
            Ok(h) => h.observe(value),
            Err(e) => warn!("Histogram {} rejected labels {:?}: {}", name, labels, e),
        }
    }

    async fn export(&self) -> Result<Vec<u8>, String> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        Ok(buffer)
    }
}

/// Null exporter for testing or when metrics are disabled
pub struct NullExporter;

#[async_trait]
impl MetricsExporter for NullExporter {
    async fn increment(&self, _name: &str, _labels: &[(&str, &str)]) {}

    async fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    async fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    async fn export(&self) -> Result<Vec<u8>, String> {
        Ok(vec![])
    }
}

/// Metrics facade for the application
#[derive(Clone)]
pub struct Metrics {
    exporter: Arc<dyn MetricsExporter>,
}

impl Metrics {
    pub fn new(exporter: Arc<dyn MetricsExporter>) -> Self {
        Self { exporter }
    }

    /// Facade over the null exporter
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullExporter))
    }

    /// Export metrics in the format expected by the monitoring system
    pub async fn export(&self) -> Result<Vec<u8>, String> {
        self.exporter.export().await
    }

    /// Record HTTP request duration
    pub async fn record_http_request(
        &self,
        endpoint: &str,
        method: &str,
        status: &str,
        duration: f64,
    ) {
        let labels = [("endpoint", endpoint), ("method", method), ("status", status)];
        self.exporter
            .observe_histogram("http_request_duration_seconds", duration, &labels)
            .await;
        self.exporter.increment("http_requests_total", &labels).await;
    }

    /// Record an upload decision; `outcome` is "accepted", "conflict", "unknown_provider"...
    pub async fn record_upload(&self, asr: &str, outcome: &str) {
        self.exporter
            .increment("uploads_total", &[("asr", asr), ("outcome", outcome)])
            .await;
    }

    /// Record the end of an ASR job
    pub async fn record_job_completed(&self, asr: &str, status: &str, duration: f64) {
        let labels = [("asr", asr), ("status", status)];
        self.exporter
            .observe_histogram("job_processing_duration_seconds", duration, &labels)
            .await;
        self.exporter.increment("jobs_completed_total", &labels).await;
    }

    /// Set current queue size
    pub async fn set_queue_size(&self, size: usize) {
        self.exporter.set_gauge("queue_size", size as f64, &[]).await;
    }

    /// Set number of jobs currently processing
    pub async fn set_jobs_processing(&self, count: usize) {
        self.exporter
            .set_gauge("jobs_processing", count as f64, &[])
            .await;
    }

    /// Record a reference text submission
    pub async fn record_ideal_text(&self, outcome: &str) {
        self.exporter
            .increment("ideal_texts_total", &[("outcome", outcome)])
            .await;
    }
}

/// Factory function to create metrics exporter based on configuration
pub fn create_metrics_exporter(exporter_type: &str) -> Arc<dyn MetricsExporter> {
    match exporter_type.to_lowercase().as_str() {
        "prometheus" => {
            debug!("Initializing Prometheus metrics exporter");
            Arc::new(PrometheusExporter::new())
        }
        "none" | "disabled" => {
            debug!("Metrics disabled, using null exporter");
            Arc::new(NullExporter)
        }
        _ => {
            warn!(
                "Unknown metrics exporter type '{}', using null exporter",
                exporter_type
            );
            Arc::new(NullExporter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exported(metrics: &Metrics) -> String {
        String::from_utf8(metrics.export().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_prometheus_export_contains_recorded_metrics() {
        let metrics = Metrics::new(create_metrics_exporter("prometheus"));

        metrics.record_upload("whisper", "accepted").await;
        metrics.record_upload("whisper", "accepted").await;
        metrics.record_job_completed("whisper", "PROCESSED", 0.25).await;
        metrics.set_queue_size(3).await;

        let text = exported(&metrics).await;
        assert!(text.contains(r#"recobattle_uploads_total{asr="whisper",outcome="accepted"} 2"#));
        assert!(text.contains("recobattle_job_processing_duration_seconds_bucket"));
        assert!(text.contains("recobattle_queue_size 3"));
    }

    #[tokio::test]
    async fn test_mismatched_labels_are_ignored() {
        let metrics = Metrics::new(create_metrics_exporter("prometheus"));
        metrics.record_ideal_text("created").await;
        metrics
            .exporter
            .increment("ideal_texts_total", &[("other", "x")])
            .await;

        let text = exported(&metrics).await;
        assert!(text.contains(r#"recobattle_ideal_texts_total{outcome="created"} 1"#));
    }

    #[tokio::test]
    async fn test_null_exporter_exports_nothing() {
        let metrics = Metrics::new(create_metrics_exporter("bogus"));
        metrics.record_upload("x", "accepted").await;
        assert!(metrics.export().await.unwrap().is_empty());
    }
}
