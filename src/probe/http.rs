//! HTTP probe implementation.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use std::time::Instant;

use super::{jitter, ProbeError, Prober};
use crate::engine::{Outcome, Target};

/// Prober that issues the target's HTTP request with a shared client.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target) -> Outcome {
        jitter().await;

        let timestamp = Utc::now();
        let start = Instant::now();
        let result = run_http_probe(&self.client, target).await;
        let elapsed = start.elapsed();

        match result {
            Ok(status) => Outcome::completed(timestamp, elapsed, status),
            Err(e) => Outcome::failed(timestamp, elapsed, e.to_string()),
        }
    }
}

/// Run an HTTP probe against the target.
///
/// Returns the response status code once the full body has been read.
pub async fn run_http_probe(client: &Client, target: &Target) -> Result<u16, ProbeError> {
    let method = Method::from_bytes(target.method.as_bytes())
        .map_err(|e| ProbeError::Config(format!("invalid method {}: {}", target.method, e)))?;

    let mut request = client.request(method, &target.url).timeout(target.timeout);
    for (name, value) in &target.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(target.timeout)
        } else {
            ProbeError::Network(e.to_string())
        }
    })?;

    let status = response.status().as_u16();

    // Read the full body to measure complete transfer time
    response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(target.timeout)
        } else {
            ProbeError::Network(e.to_string())
        }
    })?;

    Ok(status)
}
