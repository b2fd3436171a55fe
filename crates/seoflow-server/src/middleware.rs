use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use seoflow_core::{Caller, Role};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const API_KEYS_VAR: &str = "SEOFLOW_API_KEYS";

/// Correlation id for one request, echoed in every response envelope.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Clone)]
struct ApiKey {
    digest: [u8; 32],
    caller: Caller,
}

/// Bearer tokens and the role each one grants. Only token digests are kept.
#[derive(Clone)]
pub struct AuthState {
    keys: Arc<Vec<ApiKey>>,
    pub enabled: bool,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("keys", &self.keys.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl AuthState {
    /// Builds auth config from `SEOFLOW_API_KEYS`.
    ///
    /// # Errors
    ///
    /// See [`Self::parse`].
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::parse(&raw, is_development)
    }

    /// Parses comma-separated `token:role` pairs.
    ///
    /// In development, an empty value disables auth and every request acts
    /// as owner. Elsewhere an empty value fails startup.
    ///
    /// # Errors
    ///
    /// Malformed pairs, unknown roles, and missing keys outside development.
    pub fn parse(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((token, role)) = pair.rsplit_once(':') else {
                anyhow::bail!("{API_KEYS_VAR} entries must look like token:role");
            };
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("{API_KEYS_VAR} contains an empty token");
            }
            let role: Role = role.parse()?;
            let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
            keys.push(ApiKey {
                digest,
                caller: Caller::new(format!("key:{}", hex::encode(&digest[..4])), role),
            });
        }

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "{API_KEYS_VAR} not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    keys: Arc::new(Vec::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "{API_KEYS_VAR} is required outside development; provide comma-separated token:role pairs"
            );
        }

        Ok(Self {
            keys: Arc::new(keys),
            enabled: true,
        })
    }

    /// Every key is compared so timing does not reveal which one matched.
    fn authenticate(&self, token: &str) -> Option<Caller> {
        let digest = Sha256::digest(token.as_bytes());
        let mut found = None;
        for key in self.keys.iter() {
            if bool::from(key.digest.as_slice().ct_eq(digest.as_slice())) {
                found = Some(key.caller.clone());
            }
        }
        found
    }
}

fn development_caller() -> Caller {
    Caller::new("development", Role::Owner)
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// Reuses the caller's `x-request-id` when present, otherwise mints a
/// `UUIDv4`. The id lands in request extensions and on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolves the bearer token to a [`Caller`] and stores it as a request
/// extension. Handlers check the caller's role themselves.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        req.extensions_mut().insert(development_caller());
        return next.run(req).await;
    }

    let caller = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .and_then(|token| auth.authenticate(token));

    match caller {
        Some(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        None => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Fixed-window limit shared by every protected route.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
