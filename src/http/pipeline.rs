//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! request(method, url, body, options)
//!     → parse URL, check breaker is registered       (no network yet)
//!     → token manager (cached or single refresh)
//!     → merge headers, encode body                   (once per call)
//!     → attempt loop driven by RetryPlan:
//!         registry.execute(breaker, transport.send)  (fresh admission each time)
//!         401 with a token → invalidate, refetch, repeat once
//!         verdict → Success | WaitingBackoff | Failed
//!     → Response or classified Error
//! ```
//!
//! # Design Decisions
//! - A 5xx response is a failure for the breaker but is still handed back
//!   to the caller once retries are exhausted
//! - The request ID is generated once and reused by every attempt
//! - The per-call deadline wraps the whole call; dropping the future
//!   cancels any in-flight attempt or backoff sleep

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::auth::Token;
use crate::error::{Error, Result};
use crate::http::client::Client;
use crate::http::request::{Body, RequestOptions, X_REQUEST_ID};
use crate::http::response::Response;
use crate::http::transport::{TransportError, TransportRequest};
use crate::observability::logging::redact_header;
use crate::observability::metrics;
use crate::resilience::retries::is_retryable_status;
use crate::resilience::{BreakerError, RetryPhase, RetryPlan, Verdict};

/// Failure of one attempt, as seen by the breaker.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(TransportError),

    #[error("server error status {}", .0.status())]
    Status(Response),
}

impl Client {
    /// Execute one call: token, headers, body, then attempts under the
    /// configured breaker with retries and backoff.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Body,
        options: Option<&RequestOptions>,
    ) -> Result<Response> {
        let start = Instant::now();
        let deadline = options.and_then(|o| o.deadline_from(tokio::time::Instant::now()));
        let call = self.run(&method, url, body, options);

        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call).await.unwrap_or_else(|_| {
                tracing::warn!(method = %method, url = %url, "Call deadline exceeded");
                Err(Error::DeadlineExceeded)
            }),
            None => call.await,
        };

        metrics::record_request(method.as_str(), outcome_label(&result), start);
        result
    }

    async fn run(
        &self,
        method: &Method,
        url: &str,
        body: Body,
        options: Option<&RequestOptions>,
    ) -> Result<Response> {
        let client_options = &self.inner.options;

        let url = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(name) = &client_options.circuit_breaker {
            if !self.inner.registry.contains(name) {
                tracing::warn!(breaker = %name, url = %url, "Circuit breaker config not found");
                return Err(Error::ConfigNotFound(name.clone()));
            }
        }

        let body = body.encode(&client_options.content_type)?;
        let request_id = Uuid::new_v4().to_string();

        let mut token = match &self.inner.tokens {
            Some(manager) => Some(manager.get_token().await?),
            None => None,
        };
        let mut headers = self.build_headers(&request_id, token.as_deref(), options)?;

        let plan = RetryPlan::new(client_options.max_retries, client_options.backoff);
        let mut phase = plan.start();
        let mut reauthenticated = false;

        loop {
            match phase {
                RetryPhase::Attempting { attempt } => {
                    if client_options.show_debug {
                        log_request(&request_id, method, &url, attempt, &headers, body.as_deref());
                    }
                    let started = Instant::now();
                    let result = self.attempt(method, &url, &headers, body.as_ref()).await;
                    if client_options.show_debug {
                        log_outcome(&request_id, attempt, started, &result);
                    }

                    let unauthorized = matches!(&result, Ok(response) if response.status() == 401);
                    if unauthorized && !reauthenticated {
                        if let (Some(manager), Some(stale)) = (self.inner.tokens.as_ref(), token.clone()) {
                            reauthenticated = true;
                            tracing::info!(request_id = %request_id, "Token rejected, re-authenticating");
                            manager.invalidate(&stale);
                            let fresh = manager.get_token().await?;
                            headers = self.build_headers(&request_id, Some(fresh.as_ref()), options)?;
                            token = Some(fresh);
                            continue;
                        }
                    }

                    phase = plan.after_attempt(attempt, self.verdict(&result));
                    if phase.is_terminal() {
                        return result;
                    }
                    let reason = retry_reason(&result);
                    tracing::debug!(request_id = %request_id, attempt, reason, "Attempt failed, will retry");
                    metrics::record_retry(reason);
                }
                RetryPhase::WaitingBackoff { attempt, delay } => {
                    tracing::debug!(
                        request_id = %request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off"
                    );
                    tokio::time::sleep(delay).await;
                    phase = plan.after_backoff(attempt);
                }
                RetryPhase::Success | RetryPhase::Failed => {
                    unreachable!("terminal phases return from the attempt arm")
                }
            }
        }
    }

    /// One attempt, under the configured breaker if there is one.
    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&Vec<u8>>,
    ) -> Result<Response> {
        let request = TransportRequest {
            method: method.clone(),
            url: url.clone(),
            headers: headers.clone(),
            body: body.cloned(),
            timeout: self.inner.options.timeout,
        };
        let transport = Arc::clone(&self.inner.transport);

        let Some(name) = self.inner.options.circuit_breaker.as_deref() else {
            return transport
                .send(request)
                .await
                .map_err(|e| self.transport_error(e));
        };

        let result = self
            .inner
            .registry
            .execute(name, || async move {
                match transport.send(request).await {
                    Ok(response) if response.status_code().is_server_error() => {
                        Err(AttemptError::Status(response))
                    }
                    Ok(response) => Ok(response),
                    Err(e) => Err(AttemptError::Transport(e)),
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(BreakerError::Inner(AttemptError::Status(response))) => Ok(response),
            Err(BreakerError::Inner(AttemptError::Transport(e))) => Err(self.transport_error(e)),
            Err(BreakerError::NotFound(name)) => Err(Error::ConfigNotFound(name)),
            Err(BreakerError::Rejected { name, reason }) => Err(Error::CircuitOpen { name, reason }),
            Err(BreakerError::Timeout { timeout, .. }) => Err(Error::Timeout(timeout)),
        }
    }

    fn transport_error(&self, e: TransportError) -> Error {
        match e {
            TransportError::Timeout(_) => Error::Timeout(self.inner.options.timeout),
            other => Error::Transport(other),
        }
    }

    fn verdict(&self, result: &Result<Response>) -> Verdict {
        match result {
            Ok(response)
                if is_retryable_status(response.status(), &self.inner.options.retryable_statuses) =>
            {
                Verdict::Retryable
            }
            Ok(_) => Verdict::Succeeded,
            Err(e) if e.is_retryable() => Verdict::Retryable,
            Err(_) => Verdict::Fatal,
        }
    }

    /// Defaults, then `Authorization`, then caller headers; later wins.
    fn build_headers(
        &self,
        request_id: &str,
        token: Option<&Token>,
        options: Option<&RequestOptions>,
    ) -> Result<HeaderMap> {
        let client_options = &self.inner.options;
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, USER_AGENT.as_str(), &client_options.user_agent)?;
        insert_header(&mut headers, CONTENT_TYPE.as_str(), &client_options.content_type)?;
        insert_header(&mut headers, X_REQUEST_ID, request_id)?;

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token.authorization())
                .map_err(|_| Error::InvalidHeader(AUTHORIZATION.as_str().to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(options) = options {
            for (name, value) in options.headers() {
                insert_header(&mut headers, name, value)?;
            }
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn retry_reason(result: &Result<Response>) -> &'static str {
    match result {
        Ok(_) => "status",
        Err(Error::Timeout(_)) => "timeout",
        Err(_) => "transport",
    }
}

fn outcome_label(result: &Result<Response>) -> &'static str {
    match result {
        Ok(response) if response.status() < 400 => "success",
        Ok(_) => "http_error",
        Err(Error::Auth(_)) => "auth",
        Err(Error::ConfigNotFound(_)) => "config_not_found",
        Err(Error::CircuitOpen { .. }) => "circuit_open",
        Err(Error::Timeout(_)) => "timeout",
        Err(Error::Transport(_)) => "transport",
        Err(Error::DeadlineExceeded) => "deadline",
        Err(_) => "invalid_request",
    }
}

fn log_request(
    request_id: &str,
    method: &Method,
    url: &Url,
    attempt: u32,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) {
    let headers: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            format!("{}: {}", name, redact_header(name.as_str(), value))
        })
        .collect();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        url = %url,
        attempt,
        headers = ?headers,
        body_len = body.map_or(0, <[u8]>::len),
        "Sending request"
    );
}

fn log_outcome(request_id: &str, attempt: u32, started: Instant, result: &Result<Response>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(response) => tracing::debug!(
            request_id = %request_id,
            attempt,
            status = response.status(),
            body_len = response.body().len(),
            elapsed_ms,
            "Received response"
        ),
        Err(e) => tracing::debug!(
            request_id = %request_id,
            attempt,
            error = %e,
            elapsed_ms,
            "Attempt failed"
        ),
    }
}
