//! Outbound call interception.
//!
//! # Responsibilities
//! - Wrap a `reqwest::Client` and time every call from dispatch to completion
//! - Record an `OutboundCallEvent` for successes and failures alike
//! - Skip calls aimed at the collector's own ingestion endpoint
//!
//! # Design Decisions
//! - Errors are handed back to the caller unchanged after capture
//! - The body is read once here so it can be recorded; callers get it back
//!   through `TracedResponse`

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::correlation::Correlator;
use crate::events::{body_value, OutboundCallEvent};

/// A `reqwest::Client` whose calls are reported to the correlator.
#[derive(Debug, Clone)]
pub struct TracedClient {
    client: Client,
    correlator: Correlator,
    excluded: Option<Arc<Url>>,
    body_limit: usize,
}

impl TracedClient {
    pub fn new(
        client: Client,
        correlator: Correlator,
        track_endpoint: impl Into<String>,
        body_limit: usize,
    ) -> Self {
        Self {
            client,
            correlator,
            excluded: Url::parse(&track_endpoint.into()).ok().map(Arc::new),
            body_limit,
        }
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> TracedRequest {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> TracedRequest {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> TracedRequest {
        self.request(Method::PUT, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> TracedRequest {
        self.request(Method::DELETE, url)
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> TracedRequest {
        TracedRequest {
            client: self.clone(),
            builder: self.client.request(method, url),
        }
    }

    /// The wrapped client, for calls that must not be recorded.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Same scheme, host, port and path as the ingestion endpoint; the query
    /// does not matter.
    fn is_excluded(&self, url: &Url) -> bool {
        self.excluded
            .as_deref()
            .is_some_and(|ex| url.origin() == ex.origin() && url.path() == ex.path())
    }

    /// Dispatch a built request.
    pub async fn execute(&self, request: Request) -> Result<TracedResponse, reqwest::Error> {
        let method = request.method().to_string();
        let url = request.url().clone();
        let tracked = !self.is_excluded(&url);
        let started = Instant::now();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                if tracked {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
                    self.report(&method, &url, status, started.elapsed(), None, Some(&e));
                }
                return Err(e);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        match response.bytes().await {
            Ok(body) => {
                if tracked {
                    let captured = body_value(&body, self.body_limit);
                    self.report(&method, &url, status.as_u16(), started.elapsed(), captured, None);
                }
                Ok(TracedResponse {
                    status,
                    headers,
                    url: final_url,
                    body,
                })
            }
            Err(e) => {
                if tracked {
                    self.report(&method, &url, status.as_u16(), started.elapsed(), None, Some(&e));
                }
                Err(e)
            }
        }
    }

    fn report(
        &self,
        method: &str,
        url: &Url,
        status: u16,
        elapsed: Duration,
        response_body: Option<serde_json::Value>,
        error: Option<&reqwest::Error>,
    ) {
        self.correlator.record_call(OutboundCallEvent {
            method: method.to_string(),
            url: url.to_string(),
            status,
            duration_ms: elapsed.as_millis() as u64,
            response_body,
            error: error.map(ToString::to_string),
            timestamp: Utc::now(),
        });
    }
}

/// Builder mirroring `reqwest::RequestBuilder`; `send` goes through the tracer.
#[derive(Debug)]
pub struct TracedRequest {
    client: TracedClient,
    builder: RequestBuilder,
}

impl TracedRequest {
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<axum::http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<axum::http::Error>,
    {
        self.map(|b| b.header(key, value))
    }

    pub fn headers(self, headers: HeaderMap) -> Self {
        self.map(|b| b.headers(headers))
    }

    pub fn query<T: Serialize + ?Sized>(self, query: &T) -> Self {
        self.map(|b| b.query(query))
    }

    pub fn json<T: Serialize + ?Sized>(self, json: &T) -> Self {
        self.map(|b| b.json(json))
    }

    pub fn body<T: Into<reqwest::Body>>(self, body: T) -> Self {
        self.map(|b| b.body(body))
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|b| b.timeout(timeout))
    }

    fn map(self, f: impl FnOnce(RequestBuilder) -> RequestBuilder) -> Self {
        Self {
            client: self.client,
            builder: f(self.builder),
        }
    }

    pub async fn send(self) -> Result<TracedResponse, reqwest::Error> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct TracedResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Bytes,
}

impl TracedResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
