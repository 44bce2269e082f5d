//! Authentication and authorization for write operations
//!
//! Provides:
//! - Bearer token extraction
//! - Token introspection against the identity provider (`TokenVerifier`)
//! - The `Authorizer` deciding whether a principal may upload
//! - An axum extractor yielding an `AuthorizedPrincipal`

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity of the caller for the duration of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPrincipal {
    pub email: String,
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    InvalidToken,
    DomainNotApproved,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing-token",
            DenyReason::InvalidToken => "invalid-token",
            DenyReason::DomainNotApproved => "domain-not-approved",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::MissingToken => AppError::Unauthorized {
                message: "Missing bearer token".to_string(),
            },
            DenyReason::InvalidToken => AppError::Unauthorized {
                message: "Invalid or expired token".to_string(),
            },
            DenyReason::DomainNotApproved => AppError::Forbidden {
                message: "Email domain is not approved for uploads".to_string(),
            },
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized(AuthorizedPrincipal),
    Denied(DenyReason),
}

/// Claims returned by token introspection
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Audience (OAuth client id the token was issued for)
    pub aud: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub email_verified: bool,

    /// Expiry (Unix timestamp, seconds)
    #[serde(deserialize_with = "lenient_i64")]
    pub exp: i64,
}

/// Token introspection capability of the identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Introspect a bearer token. Errors mean the token could not be
    /// verified, for whatever reason.
    async fn verify(&self, token: &str) -> Result<TokenClaims>;
}

/// Google OAuth `tokeninfo` client
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
}

impl GoogleTokenVerifier {
    /// Create a new verifier against the given introspection endpoint
    pub fn new(tokeninfo_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            tokeninfo_url: tokeninfo_url.into(),
        })
    }
}

/// Describe a failed tokeninfo call. The request URL is dropped so
/// nothing derived from the token reaches the logs.
fn introspection_error(context: &str, err: reqwest::Error) -> AppError {
    AppError::IdentityProvider {
        message: format!("{}: {}", context, err.without_url()),
    }
}

#[async_trait]
impl TokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims> {
        // Form body rather than query string: URLs end up in error text
        let response = self
            .client
            .post(&self.tokeninfo_url)
            .form(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| introspection_error("Request failed", e))?;

        if !response.status().is_success() {
            return Err(AppError::IdentityProvider {
                message: format!("tokeninfo returned {}", response.status()),
            });
        }

        response
            .json::<TokenClaims>()
            .await
            .map_err(|e| introspection_error("Failed to parse tokeninfo response", e))
    }
}

/// Decides whether a bearer credential may perform uploads
pub struct Authorizer {
    verifier: Arc<dyn TokenVerifier>,
    client_id: String,
    approved_domains: Vec<String>,
}

impl Authorizer {
    /// `approved_domains` entries are compared case-insensitively
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        client_id: impl Into<String>,
        approved_domains: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            client_id: client_id.into(),
            approved_domains: approved_domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Authorize a request given its raw `Authorization` header value
    pub async fn authorize(&self, auth_header: Option<&str>) -> AuthDecision {
        self.authorize_at(auth_header, Utc::now().timestamp()).await
    }

    /// Authorize against an explicit clock (Unix seconds)
    pub async fn authorize_at(&self, auth_header: Option<&str>, now: i64) -> AuthDecision {
        let decision = self.decide(auth_header, now).await;
        crate::metrics::record_auth_decision(match &decision {
            AuthDecision::Authorized(_) => "authorized",
            AuthDecision::Denied(reason) => reason.as_str(),
        });
        decision
    }

    /// Authorize and convert a denial into the matching `AppError`
    pub async fn require(&self, auth_header: Option<&str>) -> Result<AuthorizedPrincipal> {
        match self.authorize(auth_header).await {
            AuthDecision::Authorized(principal) => Ok(principal),
            AuthDecision::Denied(reason) => Err(reason.into()),
        }
    }

    async fn decide(&self, auth_header: Option<&str>, now: i64) -> AuthDecision {
        let Some(token) = auth_header.and_then(extract_bearer_token) else {
            tracing::warn!(outcome = "missing-token", "Upload authorization denied");
            return AuthDecision::Denied(DenyReason::MissingToken);
        };

        // Reject garbage before spending a round trip on it.
        if jsonwebtoken::decode_header(token).is_err() {
            tracing::warn!(outcome = "invalid-token", "Malformed bearer token");
            return AuthDecision::Denied(DenyReason::InvalidToken);
        }

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(outcome = "invalid-token", error = %e, "Token introspection failed");
                return AuthDecision::Denied(DenyReason::InvalidToken);
            }
        };

        let email = match self.check_claims(&claims, now) {
            Ok(email) => email,
            Err(problem) => {
                tracing::warn!(
                    outcome = "invalid-token",
                    email = claims.email.as_deref().unwrap_or("-"),
                    problem,
                    "Token claims rejected"
                );
                return AuthDecision::Denied(DenyReason::InvalidToken);
            }
        };

        let approved = email_domain(&email)
            .map(|domain| self.approved_domains.iter().any(|d| *d == domain))
            .unwrap_or(false);

        if approved {
            tracing::info!(email = %email, outcome = "authorized", "Upload authorized");
            AuthDecision::Authorized(AuthorizedPrincipal { email })
        } else {
            tracing::warn!(email = %email, outcome = "domain-not-approved", "Upload authorization denied");
            AuthDecision::Denied(DenyReason::DomainNotApproved)
        }
    }

    fn check_claims(&self, claims: &TokenClaims, now: i64) -> std::result::Result<String, &'static str> {
        if claims.aud != self.client_id {
            return Err("audience mismatch");
        }
        if claims.exp <= now {
            return Err("token expired");
        }
        if !claims.email_verified {
            return Err("email not verified");
        }
        match claims.email.as_deref() {
            Some(email) if !email.trim().is_empty() => Ok(email.trim().to_string()),
            _ => Err("email claim missing"),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Domain part of an email (after the last `@`), lower-cased
pub fn email_domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
}

/// Axum extractor: runs the authorizer against the request's
/// `Authorization` header before any body is read.
impl<S> FromRequestParts<S> for AuthorizedPrincipal
where
    Arc<Authorizer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let authorizer = Arc::<Authorizer>::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        authorizer.require(header).await
    }
}

// Google's tokeninfo encodes booleans and numbers as strings.

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        _ => Ok(false),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("exp is not an integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom("exp is not an integer")),
        _ => Err(D::Error::custom("exp must be a number or numeric string")),
    }
}
