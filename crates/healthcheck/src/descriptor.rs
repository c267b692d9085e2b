//! Endpoint descriptors and their load-time validation.
//!
//! [`EndpointConfig`] is the raw record produced by a configuration loader.
//! Turning it into an [`EndpointDescriptor`] checks every invariant once, so
//! the probe executor and the scheduler only ever see valid targets.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use thiserror::Error;

use crate::types::EndpointId;

/// Timeout used when a record does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Status accepted when a record does not list any
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// Descriptor validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("endpoint id must not be empty")]
    EmptyId,

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),

    #[error("unsupported HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("body is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("expected_status must not be empty")]
    EmptyExpectedStatus,

    #[error("invalid HTTP status code {0}")]
    InvalidStatusCode(u16),

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("timeout {timeout:?} exceeds interval {interval:?}")]
    TimeoutExceedsInterval { timeout: Duration, interval: Duration },

    #[error("max_latency must be greater than zero")]
    ZeroMaxLatency,

    #[error("duplicate endpoint id `{0}`")]
    DuplicateId(String),
}

impl From<DescriptorError> for common::Error {
    fn from(err: DescriptorError) -> Self {
        common::Error::config(err)
    }
}

/// Raw endpoint record as read from configuration.
///
/// Every field is optional at this level so that a missing `url` or
/// `interval` is reported as a [`DescriptorError`] rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Identifier; falls back to the URL
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON request body, sent for POST, PUT and PATCH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<Vec<u16>>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Responses at or above this latency are DOWN
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<Duration>,

    #[serde(default)]
    pub follow_redirects: bool,
}

impl EndpointConfig {
    /// Start a record with the two required fields
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            url: Some(url.into()),
            interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_expected_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status = Some(codes.into_iter().collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = Some(max_latency);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Label used in diagnostics before the record is validated
    pub fn label(&self) -> Option<&str> {
        self.id.as_deref().or(self.url.as_deref())
    }

    /// Validate the record and build an immutable descriptor
    pub fn build(&self) -> Result<EndpointDescriptor, DescriptorError> {
        let raw_url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(DescriptorError::MissingField("url"))?;
        let url = Url::parse(raw_url).map_err(|e| DescriptorError::InvalidUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DescriptorError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(DescriptorError::InvalidUrl {
                url: raw_url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let id = match self.id.as_deref() {
            Some(id) if id.trim().is_empty() => return Err(DescriptorError::EmptyId),
            Some(id) => id.trim().to_string(),
            None => raw_url.to_string(),
        };

        let method = parse_method(self.method.as_deref())?;
        let headers = parse_headers(&self.headers)?;

        if let Some(body) = &self.body {
            serde_json::from_str::<serde_json::Value>(body)
                .map_err(|e| DescriptorError::InvalidBody(e.to_string()))?;
        }

        let expected_status = match &self.expected_status {
            None => BTreeSet::from([DEFAULT_EXPECTED_STATUS]),
            Some(codes) if codes.is_empty() => return Err(DescriptorError::EmptyExpectedStatus),
            Some(codes) => {
                if let Some(bad) = codes.iter().find(|c| !(100..=599).contains(*c)) {
                    return Err(DescriptorError::InvalidStatusCode(*bad));
                }
                codes.iter().copied().collect()
            }
        };

        let interval = self.interval.ok_or(DescriptorError::MissingField("interval"))?;
        if interval.is_zero() {
            return Err(DescriptorError::ZeroInterval);
        }
        let timeout = match self.timeout {
            Some(t) if t.is_zero() => return Err(DescriptorError::ZeroTimeout),
            Some(t) if t > interval => {
                return Err(DescriptorError::TimeoutExceedsInterval {
                    timeout: t,
                    interval,
                });
            }
            Some(t) => t,
            None => DEFAULT_TIMEOUT.min(interval),
        };

        if self.max_latency.is_some_and(|l| l.is_zero()) {
            return Err(DescriptorError::ZeroMaxLatency);
        }

        Ok(EndpointDescriptor {
            id,
            url,
            method,
            headers,
            body: self.body.clone(),
            expected_status,
            interval,
            timeout,
            max_latency: self.max_latency,
            follow_redirects: self.follow_redirects,
        })
    }
}

fn parse_method(raw: Option<&str>) -> Result<Method, DescriptorError> {
    let Some(raw) = raw else {
        return Ok(Method::GET);
    };
    let upper = raw.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| DescriptorError::InvalidMethod(raw.to_string()))
}

fn parse_headers(raw: &BTreeMap<String, String>) -> Result<HeaderMap, DescriptorError> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for (name, value) in raw {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| DescriptorError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| DescriptorError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

impl TryFrom<EndpointConfig> for EndpointDescriptor {
    type Error = DescriptorError;

    fn try_from(config: EndpointConfig) -> Result<Self, Self::Error> {
        config.build()
    }
}

/// Validated, immutable configuration of one monitored endpoint
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    id: EndpointId,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<String>,
    expected_status: BTreeSet<u16>,
    interval: Duration,
    timeout: Duration,
    max_latency: Option<Duration>,
    follow_redirects: bool,
}

impl EndpointDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body to send, if the method carries one
    pub fn request_body(&self) -> Option<&str> {
        match self.method {
            Method::POST | Method::PUT | Method::PATCH => self.body.as_deref(),
            _ => None,
        }
    }

    pub fn expected_status(&self) -> &BTreeSet<u16> {
        &self.expected_status
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_latency(&self) -> Option<Duration> {
        self.max_latency
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// `host[:port]` of the target, used to group endpoints by domain.
    ///
    /// A port equal to the scheme default is dropped, so `https://host:443/`
    /// and `https://host/` share the `host` group.
    pub fn domain(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

/// How invalid records affect the rest of a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Skip invalid records and keep the valid ones
    Partial,
    /// Fail the whole load on the first invalid record
    #[default]
    AllOrNothing,
}

/// A record that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("endpoint #{index} ({label}): {error}")]
pub struct RejectedEndpoint {
    /// Position of the record in the input sequence
    pub index: usize,
    pub label: String,
    #[source]
    pub error: DescriptorError,
}

/// Result of loading a sequence of records
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub descriptors: Vec<EndpointDescriptor>,
    pub rejected: Vec<RejectedEndpoint>,
}

/// Validate records in order, enforcing unique ids.
///
/// Under [`LoadPolicy::AllOrNothing`] the first rejected record is returned as
/// the error; under [`LoadPolicy::Partial`] it is collected into
/// [`LoadOutcome::rejected`].
pub fn load_descriptors<I>(records: I, policy: LoadPolicy) -> Result<LoadOutcome, RejectedEndpoint>
where
    I: IntoIterator<Item = EndpointConfig>,
{
    let mut outcome = LoadOutcome::default();
    let mut seen = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let label = record
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{index}"));

        let checked = EndpointDescriptor::try_from(record).and_then(|descriptor| {
            if seen.insert(descriptor.id().to_string()) {
                Ok(descriptor)
            } else {
                Err(DescriptorError::DuplicateId(descriptor.id().to_string()))
            }
        });

        match checked {
            Ok(descriptor) => outcome.descriptors.push(descriptor),
            Err(error) => {
                let rejected = RejectedEndpoint { index, label, error };
                match policy {
                    LoadPolicy::AllOrNothing => return Err(rejected),
                    LoadPolicy::Partial => {
                        tracing::warn!(%rejected, "Skipping invalid endpoint");
                        outcome.rejected.push(rejected);
                    }
                }
            }
        }
    }

    Ok(outcome)
}
