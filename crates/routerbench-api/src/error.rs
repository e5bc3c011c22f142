use thiserror::Error;

/// Top-level error type for the `routerbench-api` crate.
///
/// Covers every failure mode of a Router exchange: transport, unexpected
/// status codes, client-side deadlines and malformed bodies. The transfer
/// patterns never return these to callers; they fold them into a terminal
/// [`TransferResult`](crate::TransferResult) instead.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Client-side deadline exceeded.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Router answered with an unexpected status code. Body kept verbatim.
    #[error("HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    /// A response was missing a field the exchange cannot proceed without.
    #[error("Response missing required field `{0}`")]
    MissingField(&'static str),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Trailing stream metadata could not be parsed. Never fatal.
    #[error("Stream metadata parse error: {0}")]
    MetadataParse(String),

    // ── Sink ────────────────────────────────────────────────────────
    /// Writing received payload to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if a client-side deadline was exceeded.
    ///
    /// Timeouts are reported as `timeout` results, distinct from errors.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the Router could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    /// HTTP status code of a protocol error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_renders_status_and_body_verbatim() {
        let err = Error::Protocol {
            status: 503,
            body: "{\"detail\":\"connector offline\"}".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 503: {\"detail\":\"connector offline\"}"
        );
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_timeout());
    }
}
