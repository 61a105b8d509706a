use thiserror::Error;

/// Errors returned by carrier adapters.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// The adapter has no credentials and cannot make network calls.
    #[error("carrier {0} is not configured")]
    NotConfigured(&'static str),

    /// The carrier rejected the request. Carries the HTTP status and
    /// the raw response body for diagnostics.
    #[error("carrier API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The token endpoint rejected the client-credentials exchange.
    #[error("carrier authentication failed (status {status}): {body}")]
    Auth { status: u16, body: String },

    /// Transport-level failure (DNS, TLS, timeout). A timeout during a
    /// label purchase leaves the carrier-side outcome unknown; callers
    /// must not retry automatically.
    #[error("carrier request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The carrier answered with a body we could not interpret.
    #[error("unexpected carrier response: {0}")]
    Decode(String),
}

/// Result type for carrier operations.
pub type Result<T> = std::result::Result<T, CarrierError>;
