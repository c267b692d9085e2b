//! Probe executors.

use crate::descriptor::EndpointDescriptor;
use crate::types::{ProbeErrorKind, ProbeResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::error::Error as StdError;
use std::io;
use std::time::{Instant, SystemTime};
use tokio::time::timeout;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("endpoint-healthcheck/", env!("CARGO_PKG_VERSION"));

/// Performs one probe of an endpoint.
///
/// Implementations must capture every network-level failure in the returned
/// [`ProbeResult`] and must return within the descriptor's timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the endpoint once
    async fn probe(&self, descriptor: &EndpointDescriptor) -> ProbeResult;

    /// Get the name of this prober
    fn name(&self) -> &str;
}

/// HTTP/HTTPS prober backed by a shared connection pool
pub struct HttpProber {
    client: Client,
    redirecting_client: Client,
}

impl HttpProber {
    /// Create a new HTTP prober
    pub fn new() -> common::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(common::Error::healthcheck)?;
        let redirecting_client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(10))
            .build()
            .map_err(common::Error::healthcheck)?;

        Ok(Self {
            client,
            redirecting_client,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, descriptor: &EndpointDescriptor) -> ProbeResult {
        let timestamp = SystemTime::now();
        let start = Instant::now();
        let id = descriptor.id();

        let client = if descriptor.follow_redirects() {
            &self.redirecting_client
        } else {
            &self.client
        };
        let mut request = client
            .request(descriptor.method().clone(), descriptor.url().clone())
            .headers(descriptor.headers().clone())
            .timeout(descriptor.timeout());
        if let Some(body) = descriptor.request_body() {
            if !descriptor.headers().contains_key(CONTENT_TYPE) {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body.to_string());
        }

        match timeout(descriptor.timeout(), request.send()).await {
            Ok(Ok(response)) => {
                let latency = start.elapsed();
                let status = response.status().as_u16();
                debug!(endpoint = %id, status, latency_ms = latency.as_millis(), "HTTP probe completed");
                ProbeResult::response(id, timestamp, status, latency)
            }
            Ok(Err(e)) => {
                let latency = start.elapsed();
                let kind = if e.is_timeout() {
                    ProbeErrorKind::Timeout
                } else {
                    classify_error(&e)
                };
                let message = error_chain(&e);
                warn!(endpoint = %id, reason = %kind, error = %message, "HTTP probe failed");
                ProbeResult::failure(id, timestamp, latency, kind, message)
            }
            Err(_) => {
                let latency = start.elapsed();
                warn!(endpoint = %id, timeout_ms = descriptor.timeout().as_millis(), "HTTP probe timed out");
                ProbeResult::timeout(id, timestamp, latency)
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Classify a transport error by walking its source chain.
pub fn classify_error(err: &(dyn StdError + 'static)) -> ProbeErrorKind {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return ProbeErrorKind::ConnectionRefused,
                io::ErrorKind::TimedOut => return ProbeErrorKind::Timeout,
                _ => {}
            }
        }

        // hyper-util reports resolver failures only as text
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
        {
            return ProbeErrorKind::DnsFailure;
        }
        if text.contains("connection refused") {
            return ProbeErrorKind::ConnectionRefused;
        }

        current = e.source();
    }
    ProbeErrorKind::Other
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}
