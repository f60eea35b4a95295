//! Delivery of signed envelopes to the commerce counterpart.
//!
//! [`Transport`] is the seam the orchestrator sends through. [`HttpTransport`]
//! issues `PATCH` requests with the signature headers, guarded by a
//! timeout and a circuit breaker. It never retries on its own: a retry needs
//! a fresh signature, which only the orchestrator can produce.

use crate::{
    config::CounterpartConfig,
    models::{SignedEnvelope, SyncResponse},
    services::circuit_breaker::{CircuitBreaker, CircuitState},
    utils::http::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use async_trait::async_trait;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use reqwest::{Client, RequestBuilder};
use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::{error, info, warn};
use url::Url;

/// Longest response body excerpt kept in errors and logs
const BODY_EXCERPT_LEN: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid counterpart URL: {0}")]
    InvalidUrl(String),

    #[error("Response does not follow the sync contract: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    fn outcome(&self) -> &'static str {
        match self {
            TransportError::Network(_) => "network_error",
            TransportError::Timeout(_) => "timeout",
            TransportError::CircuitOpen(_) => "circuit_open",
            TransportError::UnexpectedStatus { .. } => "unexpected_status",
            TransportError::InvalidUrl(_) => "invalid_url",
            TransportError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Sends one signed envelope and returns the counterpart's structured answer
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, envelope: &SignedEnvelope) -> Result<SyncResponse, TransportError>;
}

/// Metrics for outbound webhook deliveries
#[derive(Clone)]
pub struct TransportMetrics {
    /// Deliveries by destination and outcome
    pub requests_total: CounterVec,
    pub request_duration_seconds: HistogramVec,
    pub timeouts_total: CounterVec,
    /// Circuit breaker state by destination (0=closed, 1=open, 2=half-open)
    pub circuit_breaker_state: GaugeVec,
}

impl TransportMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "reward_sync_transport_requests_total",
                "Outbound sync deliveries by destination and outcome",
            ),
            &["destination", "outcome"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "reward_sync_transport_request_duration_seconds",
                "Duration of outbound sync deliveries",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["destination"],
        )?;

        let timeouts_total = CounterVec::new(
            Opts::new(
                "reward_sync_transport_timeouts_total",
                "Outbound sync deliveries that timed out",
            ),
            &["destination"],
        )?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "reward_sync_transport_circuit_state",
                "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            &["destination"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            timeouts_total,
            circuit_breaker_state,
        })
    }
}

/// `reqwest`-backed transport to a single counterpart endpoint
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    destination: String,
    timeout: Duration,
    detailed_logging: bool,
    breaker: Mutex<CircuitBreaker>,
    metrics: Option<TransportMetrics>,
}

impl HttpTransport {
    pub fn new(
        config: &CounterpartConfig,
        metrics: Option<TransportMetrics>,
    ) -> Result<Self, TransportError> {
        let endpoint = config
            .endpoint()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let destination = endpoint.host_str().unwrap_or("unknown").to_string();
        let timeout = Duration::from_secs(config.request_timeout_seconds);

        // The overall deadline is enforced around the whole exchange in `deliver`
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            destination,
            timeout,
            detailed_logging: config.enable_detailed_logging,
            breaker: Mutex::new(CircuitBreaker::new(config.circuit_breaker.clone())),
            metrics,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    fn allow_request(&self) -> bool {
        let (allowed, state) = {
            let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
            let allowed = breaker.allow_request();
            (allowed, breaker.state())
        };
        self.record_circuit_state(state);
        allowed
    }

    fn record_result(&self, success: bool) {
        let state = {
            let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
            if success {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
            breaker.state()
        };
        self.record_circuit_state(state);
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<SyncResponse, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<SyncResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => Err(TransportError::InvalidResponse(e.to_string())),
            Err(_) => Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body: excerpt(&body),
            }),
        }
    }

    fn record_circuit_state(&self, state: CircuitState) {
        if let Some(metrics) = &self.metrics {
            metrics
                .circuit_breaker_state
                .with_label_values(&[self.destination.as_str()])
                .set(state.gauge_value());
        }
    }

    fn record_delivery(&self, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics
                .requests_total
                .with_label_values(&[self.destination.as_str(), outcome])
                .inc();
            metrics
                .request_duration_seconds
                .with_label_values(&[self.destination.as_str()])
                .observe(duration.as_secs_f64());
            if outcome == "timeout" {
                metrics
                    .timeouts_total
                    .with_label_values(&[self.destination.as_str()])
                    .inc();
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, envelope: &SignedEnvelope) -> Result<SyncResponse, TransportError> {
        let transaction_id = envelope.payload.transaction_id.as_str();

        if !self.allow_request() {
            warn!(
                destination = %self.destination,
                transaction_id = %transaction_id,
                "Circuit breaker is open, rejecting delivery"
            );
            self.record_delivery("circuit_open", Duration::ZERO);
            return Err(TransportError::CircuitOpen(self.destination.clone()));
        }

        let request = self
            .client
            .patch(self.endpoint.clone())
            .header(SIGNATURE_HEADER, envelope.signature.as_str())
            .header(TIMESTAMP_HEADER, envelope.timestamp.to_string())
            .json(&envelope.payload);

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                self.record_result(true);
                self.record_delivery("delivered", duration);
                if self.detailed_logging {
                    info!(
                        destination = %self.destination,
                        url = %self.endpoint,
                        transaction_id = %transaction_id,
                        status = ?response.status,
                        duration_ms = duration.as_millis(),
                        "Sync delivered"
                    );
                }
            }
            Err(err) => {
                self.record_result(false);
                self.record_delivery(err.outcome(), duration);
                error!(
                    destination = %self.destination,
                    url = %self.endpoint,
                    transaction_id = %transaction_id,
                    error = %err,
                    duration_ms = duration.as_millis(),
                    "Sync delivery failed"
                );
            }
        }

        result
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}
