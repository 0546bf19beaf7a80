//! Admission control driven by collector policy.
//!
//! # Decision Table (first match wins)
//! ```text
//! tracer disabled              → 400 "Tracer disabled"
//! apiEnabled                   → 403 "API Enabled by config"
//! schedule on, now outside     → 403 "Outside schedule window"
//! requestLimit on, blocked     → 429 "Rate limit exceeded"
//! otherwise                    → allow
//! ```
//!
//! # Design Decisions
//! - A failed policy or rate-limit fetch lets the request through un-gated;
//!   the protected service stays available when the collector is not
//! - The schedule check compares zero-padded "HH:MM" strings in local time

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Local;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::capture::suppressed;
use crate::config::TrackerConfig;
use crate::observability::metrics;
use crate::policy::cache::PolicyCache;
use crate::policy::types::{Policy, RateStatus};
use crate::transmit::API_KEY_HEADER;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub error: &'static str,
}

impl Rejection {
    pub const TRACER_DISABLED: Rejection = Rejection {
        status: StatusCode::BAD_REQUEST,
        error: "Tracer disabled",
    };
    pub const API_ENABLED: Rejection = Rejection {
        status: StatusCode::FORBIDDEN,
        error: "API Enabled by config",
    };
    pub const OUTSIDE_SCHEDULE: Rejection = Rejection {
        status: StatusCode::FORBIDDEN,
        error: "Outside schedule window",
    };
    pub const RATE_LIMITED: Rejection = Rejection {
        status: StatusCode::TOO_MANY_REQUESTS,
        error: "Rate limit exceeded",
    };

    /// JSON body sent to the client and recorded as the response.
    pub fn body(&self) -> Value {
        json!({ "error": self.error })
    }
}

/// Outcome of the static part of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Reject(Rejection),
    /// Rules 1-3 passed and the rate limiter has to be asked.
    CheckRateLimit,
    Allow,
}

/// What the middleware should do with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Reject(Rejection),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("policy fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Evaluate rules 1-3 against `now_hhmm` and say whether rule 4 applies.
pub fn evaluate(policy: &Policy, now_hhmm: &str) -> Verdict {
    if !policy.tracer_enabled {
        return Verdict::Reject(Rejection::TRACER_DISABLED);
    }
    if policy.api_enabled {
        return Verdict::Reject(Rejection::API_ENABLED);
    }
    if let Some(schedule) = policy.schedule.as_ref().filter(|s| s.enabled) {
        if !schedule.allows(now_hhmm) {
            return Verdict::Reject(Rejection::OUTSIDE_SCHEDULE);
        }
    }
    if policy.request_limit.as_ref().is_some_and(|l| l.enabled) {
        return Verdict::CheckRateLimit;
    }
    Verdict::Allow
}

/// Current local time as zero-padded "HH:MM".
pub fn local_hhmm() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Fetches policy per request path and applies the decision table.
#[derive(Debug)]
pub struct PolicyGate {
    client: Client,
    config_url: String,
    rate_url: String,
    api_key: String,
    cache: Option<PolicyCache>,
}

impl PolicyGate {
    pub fn new(config: &TrackerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.collector_timeout_ms))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &TrackerConfig) -> Self {
        let cache = (config.policy_cache_ttl_ms > 0)
            .then(|| {
                PolicyCache::new(
                    Duration::from_millis(config.policy_cache_ttl_ms),
                    config.policy_cache_max_entries,
                )
            });

        Self {
            client,
            config_url: format!("{}/api/config", config.base_url()),
            rate_url: format!("{}/api/requestCount", config.base_url()),
            api_key: config.api_key.clone(),
            cache,
        }
    }

    /// Decide whether the request for `path` may proceed.
    pub async fn check(&self, path: &str) -> GateDecision {
        self.check_at(path, &local_hhmm()).await
    }

    /// `check` with an explicit wall-clock reading.
    pub async fn check_at(&self, path: &str, now_hhmm: &str) -> GateDecision {
        let decision = match self.decide(path, now_hhmm).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Tracking error, request passes un-gated");
                metrics::record_gate_decision("ungated");
                return GateDecision::Allow;
            }
        };

        match decision {
            GateDecision::Allow => metrics::record_gate_decision("allow"),
            GateDecision::Reject(rejection) => {
                tracing::info!(
                    path = %path,
                    status = rejection.status.as_u16(),
                    reason = rejection.error,
                    "Request rejected by policy"
                );
                metrics::record_gate_decision("reject");
            }
        }
        decision
    }

    async fn decide(&self, path: &str, now_hhmm: &str) -> Result<GateDecision, GateError> {
        let policy = self.policy_for(path).await?;

        match evaluate(&policy, now_hhmm) {
            Verdict::Allow => Ok(GateDecision::Allow),
            Verdict::Reject(rejection) => Ok(GateDecision::Reject(rejection)),
            Verdict::CheckRateLimit => {
                let status = self.fetch_rate_status(path).await?;
                if status.blocked {
                    Ok(GateDecision::Reject(Rejection::RATE_LIMITED))
                } else {
                    Ok(GateDecision::Allow)
                }
            }
        }
    }

    async fn policy_for(&self, path: &str) -> Result<Policy, GateError> {
        if let Some(policy) = self.cache.as_ref().and_then(|c| c.get(path)) {
            return Ok(policy);
        }
        let policy = self.fetch_policy(path).await?;
        if let Some(cache) = &self.cache {
            cache.insert(path, policy.clone());
        }
        Ok(policy)
    }

    /// `GET {base}/api/config?path=<path>`.
    pub async fn fetch_policy(&self, path: &str) -> Result<Policy, GateError> {
        self.fetch(&self.config_url, path).await
    }

    /// `GET {base}/api/requestCount?path=<path>`.
    pub async fn fetch_rate_status(&self, path: &str) -> Result<RateStatus, GateError> {
        self.fetch(&self.rate_url, path).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, path: &str) -> Result<T, GateError> {
        let request = async {
            self.client
                .get(url)
                .query(&[("path", path)])
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?
                .error_for_status()?
                .json::<T>()
                .await
        };
        Ok(suppressed(request).await?)
    }
}
