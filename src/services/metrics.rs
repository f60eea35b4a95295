//! Metrics collection and Prometheus integration service.

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::{Duration, Instant};

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    /// Inbound sync verifications by outcome (`applied`, `duplicate`, or an error code)
    pub verifications_total: CounterVec,
    /// Outbound sync attempts by outcome
    pub outbound_total: CounterVec,
    pub app_uptime_seconds: Gauge,
    pub app_info: CounterVec,
    pub start_time: Instant,
}

impl AppMetrics {
    /// Create a new metrics collector with default Prometheus metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // HTTP request counter by method, status, and route
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?;

        let verifications_total = CounterVec::new(
            Opts::new(
                "reward_sync_verifications_total",
                "Inbound reward sync verifications by outcome",
            ),
            &["outcome"],
        )?;

        let outbound_total = CounterVec::new(
            Opts::new(
                "reward_sync_outbound_total",
                "Outbound reward sync attempts by outcome",
            ),
            &["outcome"],
        )?;

        let app_uptime_seconds = Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;

        let app_info = CounterVec::new(
            Opts::new("app_info", "Application information"),
            &["version", "commit", "build_time"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(verifications_total.clone()))?;
        registry.register(Box::new(outbound_total.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(app_info.clone()))?;

        app_info
            .with_label_values(&[
                env!("CARGO_PKG_VERSION"),
                option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
                option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
            ])
            .inc();

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            verifications_total,
            outbound_total,
            app_uptime_seconds,
            app_info,
            start_time: Instant::now(),
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            // Scrapes would dominate the series otherwise
            return;
        }

        self.http_requests_total
            .with_label_values(&[method, &status.to_string(), route])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    pub fn record_verification(&self, outcome: &str) {
        self.verifications_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_outbound(&self, outcome: &str) {
        self.outbound_total.with_label_values(&[outcome]).inc();
    }

    /// Update the application uptime gauge
    pub fn update_uptime(&self) {
        let uptime = self.start_time.elapsed().as_secs_f64();
        self.app_uptime_seconds.set(uptime);
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}
