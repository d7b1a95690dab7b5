//! Delivery strategies
//!
//! Tier (a): a beacon-style handoff that never blocks the caller and only
//! signals whether the batch was accepted for delivery. Tier (b): a
//! request-based fallback with keepalive semantics and a real
//! success/failure outcome, used when the beacon is unavailable or refuses
//! the payload.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum TransportError {
    /// Request never completed (connection, TLS, timeout).
    Request(String),
    /// Request completed with a non-success status.
    Status(u16),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(msg) => write!(f, "Request failed: {}", msg),
            TransportError::Status(code) => write!(f, "HTTP error! status: {}", code),
        }
    }
}

impl std::error::Error for TransportError {}

/// The delivery seam the reporter talks to. Implementations carry bytes to
/// the collector; the reporter owns batching, ordering, and retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget handoff. Returns true when the payload was accepted
    /// for delivery; acceptance is not a delivery guarantee, matching beacon
    /// semantics. Must not block.
    fn send_beacon(&self, body: &str) -> bool;

    /// Request-based delivery that survives page teardown. Resolves with a
    /// real outcome; the reporter applies its retry policy on failure.
    async fn send_keepalive(&self, body: &str) -> Result<(), TransportError>;
}

/// HTTP transport to the collector endpoint.
///
/// The beacon tier is realized as a bounded handoff channel drained by a
/// background sender: `try_send` gives the synchronous boolean accept signal,
/// and a full channel (delivery falling behind) reads as "beacon refused",
/// pushing the reporter onto the keepalive tier.
pub struct HttpTransport {
    client: reqwest::Client,
    report_url: String,
    beacon_tx: Option<mpsc::Sender<String>>,
}

impl HttpTransport {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    const BEACON_QUEUE_DEPTH: usize = 16;

    pub fn new(report_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            report_url: report_url.into(),
            beacon_tx: None,
        })
    }

    /// Enable the beacon tier. Spawns the background sender; requires a
    /// running tokio runtime.
    pub fn with_beacon(mut self) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(Self::BEACON_QUEUE_DEPTH);
        let client = self.client.clone();
        let url = self.report_url.clone();
        tokio::spawn(async move {
            while let Some(body) = rx.recv().await {
                // Best-effort by design: beacon acceptance already happened
                if let Err(e) = post(&client, &url, &body).await {
                    log::debug!("Beacon delivery dropped a batch: {}", e);
                }
            }
        });
        self.beacon_tx = Some(tx);
        self
    }
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    body: &str,
) -> Result<(), TransportError> {
    let response = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(reqwest::header::CONNECTION, "keep-alive")
        .body(body.to_string())
        .send()
        .await
        .map_err(|e| TransportError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(TransportError::Status(response.status().as_u16()));
    }
    Ok(())
}

#[async_trait]
impl Transport for HttpTransport {
    fn send_beacon(&self, body: &str) -> bool {
        match &self.beacon_tx {
            Some(tx) => tx.try_send(body.to_string()).is_ok(),
            None => false,
        }
    }

    async fn send_keepalive(&self, body: &str) -> Result<(), TransportError> {
        post(&self.client, &self.report_url, body).await
    }
}
