use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tracing::warn;

use super::TokenStore;

/// Process-wide rate-limit state (spec §3 `RateLimitState`), updated from
/// every API response's headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Applies GitHub auth headers to outgoing requests and tracks the rate
/// limit observed in responses (spec §4.2). This is the one piece of
/// process-wide mutable state besides the advisory lock (spec §9).
pub struct AuthManager {
    token: Option<String>,
    state: Mutex<RateLimitState>,
}

impl AuthManager {
    /// Loads the token from the OS keyring, if available.
    pub fn from_keyring() -> Self {
        Self { token: TokenStore::get(), state: Mutex::new(RateLimitState::default()) }
    }

    pub fn authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The token in the shape `octocrab`'s builder wants it, if any.
    pub fn token_for_octocrab(&self) -> Option<String> {
        self.token.clone()
    }

    /// Records rate-limit state from `GET /rate_limit`, the supplementary
    /// call used in place of per-response header interception (octocrab's
    /// typed release endpoints don't expose raw response headers).
    pub fn record_core_rate_limit(&self, remaining: u32, limit: u32, reset_epoch_secs: i64) {
        let state = RateLimitState {
            remaining: Some(remaining),
            limit: Some(limit),
            reset_at: DateTime::from_timestamp(reset_epoch_secs, 0),
            last_updated: Some(Utc::now()),
        };

        if remaining < 10 {
            warn!(remaining, "GitHub API rate limit is nearly exhausted");
        }

        *self.state.lock().expect("rate limit mutex poisoned") = state;
    }

    /// Applies the headers spec §6 names to a request builder.
    pub fn apply_headers(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder = builder
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, user_agent());

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        builder
    }

    /// Parses `X-RateLimit-*` headers from a response and records them.
    /// Emits a warning when `remaining < 10`, per spec §4.2.
    pub fn observe_response(&self, headers: &HeaderMap) -> RateLimitState {
        let remaining = header_u32(headers, "x-ratelimit-remaining");
        let limit = header_u32(headers, "x-ratelimit-limit");
        let reset_at = header_u32(headers, "x-ratelimit-reset")
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0));

        let state = RateLimitState { remaining, limit, reset_at, last_updated: Some(Utc::now()) };

        if let Some(remaining) = state.remaining
            && remaining < 10
        {
            warn!(remaining, "GitHub API rate limit is nearly exhausted");
        }

        *self.state.lock().expect("rate limit mutex poisoned") = state.clone();
        state
    }

    pub fn rate_limit(&self) -> RateLimitState {
        self.state.lock().expect("rate limit mutex poisoned").clone()
    }
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

pub(crate) fn user_agent() -> String {
    format!("my-unicorn/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;

    #[test]
    fn observe_response_parses_rate_limit_headers() {
        let manager = AuthManager { token: None, state: Mutex::new(RateLimitState::default()) };

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let state = manager.observe_response(&headers);
        assert_eq!(state.remaining, Some(42));
        assert_eq!(state.limit, Some(60));
        assert!(state.reset_at.is_some());
    }
}
