//! Circuit breaker
//!
//! Guards the LLM provider: after `failure_threshold` consecutive failures
//! the breaker opens and every call fails fast with
//! `AppError::CircuitBreakerOpen` until `reset_secs` has elapsed, at which
//! point the next call is let through. A single failure while open resets
//! the open timer; there is no half-open probe state.

use bookrag_common::errors::{AppError, Result};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    reset_secs: u64,
    failure_count: AtomicU32,
    opened_at: AtomicU64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, failure_threshold: u32, reset_secs: u64) -> Self {
        Self {
            service: service.into(),
            failure_threshold,
            reset_secs,
            failure_count: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
        }
    }

    /// Errors with `CircuitBreakerOpen` if the breaker is currently tripped
    /// and the reset window has not yet elapsed.
    pub fn check(&self) -> Result<()> {
        let opened_at = self.opened_at.load(Ordering::SeqCst);
        if opened_at == 0 {
            return Ok(());
        }

        if now_secs().saturating_sub(opened_at) >= self.reset_secs {
            self.opened_at.store(0, Ordering::SeqCst);
            self.failure_count.store(0, Ordering::SeqCst);
            return Ok(());
        }

        Err(AppError::CircuitBreakerOpen {
            service: self.service.clone(),
        })
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.opened_at.store(0, Ordering::SeqCst);
        bookrag_common::metrics::record_circuit_state(false);
    }

    /// Increments the failure count; trips the breaker once it reaches the
    /// threshold. A failure recorded while already open re-stamps the open
    /// time, extending the outage window.
    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.failure_threshold || self.opened_at.load(Ordering::SeqCst) != 0 {
            self.opened_at.store(now_secs(), Ordering::SeqCst);
        }
        bookrag_common::metrics::record_circuit_state(self.is_open());
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.load(Ordering::SeqCst) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new("generator", 5, 60);
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new("generator", 5, 60);
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        assert!(breaker.check().is_err());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new("generator", 5, 60);
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_another_failure_while_open_extends_window() {
        let breaker = CircuitBreaker::new("generator", 1, 60);
        breaker.record_failure();
        assert!(breaker.is_open());
        let first_open = breaker.opened_at.load(Ordering::SeqCst);
        breaker.record_failure();
        let second_open = breaker.opened_at.load(Ordering::SeqCst);
        assert!(second_open >= first_open);
    }
}
