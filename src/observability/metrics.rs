//! Metrics collection.
//!
//! # Metrics
//! - `galf_requests_total` (counter): finished calls by method, outcome
//! - `galf_request_duration_seconds` (histogram): call latency including retries
//! - `galf_retries_total` (counter): retries by reason
//! - `galf_breaker_rejections_total` (counter): rejected calls by breaker, reason
//! - `galf_breaker_timeouts_total` (counter): breaker timeouts by breaker
//! - `galf_breaker_open` (gauge): 1=open, 0=closed
//! - `galf_token_refreshes_total` (counter): token refreshes by outcome

use std::time::Instant;

use crate::error::Rejection;

pub fn record_request(method: &str, outcome: &str, start: Instant) {
    metrics::counter!(
        "galf_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("galf_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(reason: &'static str) {
    metrics::counter!("galf_retries_total", "reason" => reason).increment(1);
}

pub fn record_breaker_rejection(breaker: &str, reason: Rejection) {
    let reason = match reason {
        Rejection::Open => "open",
        Rejection::MaxConcurrency => "max_concurrency",
    };
    metrics::counter!(
        "galf_breaker_rejections_total",
        "breaker" => breaker.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_breaker_timeout(breaker: &str) {
    metrics::counter!("galf_breaker_timeouts_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_breaker_state(breaker: &str, open: bool) {
    metrics::gauge!("galf_breaker_open", "breaker" => breaker.to_string())
        .set(if open { 1.0 } else { 0.0 });
}

pub fn record_token_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("galf_token_refreshes_total", "outcome" => outcome).increment(1);
}
