//! Circuit breaker guarding the outbound webhook.
//!
//! After `failure_threshold` consecutive transport failures the circuit opens
//! and deliveries fail fast. Once `open_seconds` have passed a probe is let
//! through; `success_threshold` successful probes close the circuit again,
//! while any failed probe reopens it.

use crate::config::CircuitBreakerConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = open, 2 = half-open
    pub fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    opened_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            config,
        }
    }

    /// Whether a request may be sent now; moves an expired open circuit to half-open
    pub fn allow_request(&mut self) -> bool {
        self.allow_request_at(Instant::now())
    }

    fn allow_request_at(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = self.opened_at.is_none_or(|opened| {
                    now.saturating_duration_since(opened) >= Duration::from_secs(self.config.open_seconds)
                });
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;

        if self.state == CircuitState::HalfOpen {
            self.success_count += 1;
            if self.success_count >= self.config.success_threshold {
                self.state = CircuitState::Closed;
                self.opened_at = None;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&mut self, now: Instant) {
        self.failure_count += 1;

        let trips = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trips {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
            self.success_count = 0;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }
}
