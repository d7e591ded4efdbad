//! Token-issuing endpoint.
//!
//! # Responsibilities
//! - Define the seam the token manager refreshes through
//! - Implement the OAuth2 client-credentials grant over HTTP
//!
//! # Design Decisions
//! - Lifetime is measured from when the request was sent, not received
//! - Missing `expires_in` falls back to one hour, missing `token_type` to Bearer
//! - `expires_in` is capped at one year
//! - Error bodies are truncated before they are stored

use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use url::Url;

use crate::auth::token::MAX_LIFETIME;
use crate::auth::{AuthError, Token};
use crate::error::Error;

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
const BODY_PREVIEW_SIZE: usize = 200;

/// Something that can issue a fresh token.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch_token(&self) -> BoxFuture<'_, Result<Token, AuthError>>;
}

/// Settings of an OAuth2 client-credentials endpoint.
#[derive(Clone)]
pub struct OAuthSettings {
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    /// Timeout of one token request.
    pub timeout: Duration,
    /// How long before expiry a token stops being handed out.
    pub refresh_margin: Duration,
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Client-credentials token source.
#[derive(Debug)]
pub struct OAuthTokenSource {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthTokenSource {
    pub fn new(settings: OAuthSettings) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Build(format!("token client: {e}")))?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    async fn request_token(&self) -> Result<Token, AuthError> {
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "client_credentials");
            if let Some(scope) = &self.settings.scope {
                form.append_pair("scope", scope);
            }
            form.finish()
        };

        let requested_at = Instant::now();
        let response = self
            .http
            .post(self.settings.token_url.clone())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthError::Endpoint {
                status: status.as_u16(),
                body: text.chars().take(BODY_PREVIEW_SIZE).collect(),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::Malformed("empty access_token".to_string()));
        }

        let token_type = match parsed.token_type.as_deref() {
            None | Some("") => "Bearer".to_string(),
            Some(t) if t.eq_ignore_ascii_case("bearer") => "Bearer".to_string(),
            Some(t) => t.to_string(),
        };
        let lifetime = parsed
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs)
            .min(MAX_LIFETIME);

        tracing::debug!(
            token_url = %self.settings.token_url,
            lifetime_secs = lifetime.as_secs(),
            "Token issued"
        );

        Ok(Token::new(
            format!("{token_type} {}", parsed.access_token),
            requested_at,
            lifetime,
            self.settings.refresh_margin,
        ))
    }
}

impl TokenSource for OAuthTokenSource {
    fn fetch_token(&self) -> BoxFuture<'_, Result<Token, AuthError>> {
        self.request_token().boxed()
    }
}
