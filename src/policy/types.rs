//! Policy documents served by the collector.

use serde::{Deserialize, Serialize};

/// Policy for one request path, from `GET /api/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Missing counts as disabled.
    #[serde(rename = "tracer", alias = "tracerEnabled")]
    pub tracer_enabled: bool,

    pub api_enabled: bool,

    #[serde(rename = "scheduling", alias = "schedule")]
    pub schedule: Option<Schedule>,

    pub request_limit: Option<RequestLimit>,
}

/// Daily window in local time, inclusive at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Schedule {
    pub enabled: bool,
    /// Zero-padded "HH:MM".
    pub start_time: String,
    /// Zero-padded "HH:MM".
    pub end_time: String,
}

impl Schedule {
    /// Lexicographic comparison of zero-padded "HH:MM" strings.
    pub fn allows(&self, now_hhmm: &str) -> bool {
        now_hhmm >= self.start_time.as_str() && now_hhmm <= self.end_time.as_str()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimit {
    pub enabled: bool,
}

/// Answer of `GET /api/requestCount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateStatus {
    pub blocked: bool,
}
