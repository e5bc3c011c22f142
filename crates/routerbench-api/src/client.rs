// Router HTTP client
//
// Wraps `reqwest::Client` with Router URL construction and response
// decoding. The transfer patterns live in `transfer.rs` as inherent methods
// to keep this module focused on transport mechanics.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ActiveHosts, StatusResponse};
use crate::transport::TransportConfig;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for the polling and streaming patterns.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Poll budget for the plain `request` flow. Offload derives its own
    /// budget from the request deadline.
    pub max_poll_attempts: u32,
    /// Pause between initiating a stream and opening it, so the producer
    /// has started emitting.
    pub stream_grace: Duration,
    /// Hard ceiling on reading a stream that never shows its marker.
    pub stream_deadline: Duration,
    /// How long to keep reading metadata once the marker has been seen.
    pub trailer_allowance: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_attempts: 60,
            stream_grace: Duration::from_millis(100),
            stream_deadline: Duration::from_secs(120),
            trailer_allowance: Duration::from_secs(2),
        }
    }
}

/// HTTP client for one Router.
///
/// Cheap to build and meant to be short-lived: the load engine creates one
/// per transfer so that no connection is shared between measurements.
#[derive(Debug, Clone)]
pub struct RouterClient {
    pub(crate) http: reqwest::Client,
    base_url: Url,
    pub(crate) options: TransferOptions,
}

impl RouterClient {
    /// Create a client with its own `reqwest::Client` built from `transport`.
    pub fn new(
        base_url: Url,
        transport: &TransportConfig,
        options: TransferOptions,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, options))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, options: TransferOptions) -> Self {
        Self {
            http,
            base_url,
            options,
        }
    }

    /// The Router base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}`, tolerant of slashes on either side.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    /// A locator handed out by the Router: absolute, or relative to the base.
    pub(crate) fn resolve(&self, locator: &str) -> Result<Url, Error> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.endpoint(locator),
            Err(e) => Err(e.into()),
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST a JSON body and decode a 200/202 JSON answer.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).timeout(timeout).json(body).send().await?;

        parse_json(resp).await
    }

    /// GET and decode a 200/202 JSON answer.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;

        parse_json(resp).await
    }

    // ── Auxiliary endpoints ──────────────────────────────────────────

    /// Current state of a request.
    ///
    /// `GET /datasets/{id}/status`
    pub async fn get_status(&self, request_id: &str) -> Result<StatusResponse, Error> {
        let url = self.endpoint(&format!("datasets/{request_id}/status"))?;
        self.get_json(url).await
    }

    /// Connectors currently attached to the Router.
    ///
    /// `GET /hosts/active`
    pub async fn list_active_hosts(&self) -> Result<ActiveHosts, Error> {
        let url = self.endpoint("hosts/active")?;
        self.get_json(url).await
    }

    /// `true` when `GET /health` answers 200 within five seconds.
    pub async fn health_check(&self) -> bool {
        let Ok(url) = self.endpoint("health") else {
            return false;
        };
        debug!("GET {}", url);
        match self.http.get(url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

/// 200/202 → decoded body, anything else → `Error::Protocol` with the body
/// captured verbatim.
pub(crate) async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status != StatusCode::OK && status != StatusCode::ACCEPTED {
        return Err(Error::Protocol {
            status: status.as_u16(),
            body,
        });
    }

    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => Err(Error::Deserialization {
            message: e.to_string(),
            body,
        }),
    }
}

/// Any 2xx passes; otherwise the body becomes an `Error::Protocol`.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Protocol {
        status: status.as_u16(),
        body,
    })
}
