// Router wire types
//
// One struct per endpoint. The Router omits fields freely depending on the
// request state, so nearly everything is `Option` with `#[serde(default)]`:
// an absent key is an explicit "unset", never a parse failure.

use serde::{Deserialize, Serialize};

// ── Requests ─────────────────────────────────────────────────────────

/// Body shared by every dataset initiation call.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetRequest<'a> {
    pub mac_address: &'a str,
    pub dataset_name: &'a str,
}

// ── Initiation responses ─────────────────────────────────────────────

/// `POST /datasets/request` and `POST /datasets/request-offload`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestAccepted {
    #[serde(default)]
    pub request_id: String,
}

/// `POST /datasets/request-stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTicket {
    #[serde(default)]
    pub request_id: String,
    /// Absolute URL, or a path relative to the Router base URL.
    #[serde(default)]
    pub stream_url: Option<String>,
}

// ── Producer timestamps ──────────────────────────────────────────────

/// Producer-side marks relayed by the Router, in seconds since the epoch.
///
/// `t1`: Router received the request. `t2`: connector received it.
/// `t3`: connector started sending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTimestamps {
    #[serde(default)]
    pub t1_received: Option<f64>,
    #[serde(default)]
    pub t2_received: Option<f64>,
    #[serde(default)]
    pub t3_start_send: Option<f64>,
}

impl RemoteTimestamps {
    /// `true` when none of the marks were reported.
    pub fn is_empty(&self) -> bool {
        self.t1_received.is_none() && self.t2_received.is_none() && self.t3_start_send.is_none()
    }

    /// Time spent inside the Router (`t2 - t1`).
    pub fn router_latency(&self) -> Option<f64> {
        Some(self.t2_received? - self.t1_received?)
    }

    /// Time spent inside the connector before sending (`t3 - t2`).
    pub fn connector_latency(&self) -> Option<f64> {
        Some(self.t3_start_send? - self.t2_received?)
    }

    /// `None` when empty, so absent marks never masquerade as reported ones.
    pub(crate) fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Request state as reported by the Router. Unknown values count as pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl RouterStatus {
    /// `completed` or `error`: polling stops here.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// `GET /datasets/{id}/status`, also the body of `request-sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub status: RouterStatus,
    /// Inline dataset content. Usually a string, occasionally raw JSON.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub data_size_bytes: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub timestamps: Option<RemoteTimestamps>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl StatusResponse {
    /// Reported size, falling back to the length of the inline data.
    pub fn payload_size(&self) -> Option<u64> {
        self.data_size_bytes.or_else(|| {
            self.data.as_ref().map(|data| match data {
                serde_json::Value::String(s) => s.len() as u64,
                other => other.to_string().len() as u64,
            })
        })
    }
}

// ── Hosts ────────────────────────────────────────────────────────────

/// `GET /hosts/active`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveHosts {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub connectors: Vec<Connector>,
}

/// A connector (producer device) currently attached to the Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub mac_address: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub last_ping: Option<String>,
}
