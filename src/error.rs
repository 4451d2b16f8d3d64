//! Error taxonomy for provider acquisition runs.
//!
//! Only run-fatal conditions live here. Per-channel enrichment failures,
//! cache corruption and per-artifact archival failures are contained where
//! they occur and reported as warnings instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// The provider rejected the credentials. Never retried.
    #[error("authentication failed for {server}")]
    AuthenticationFailed { server: String },

    /// Transport failures or non-success statuses that survived the whole
    /// retry budget.
    #[error("provider unreachable after {attempts} attempt(s): {reason}")]
    ProviderUnreachable { attempts: u32, reason: String },

    /// The provider answered, but with an unparseable or unexpected payload.
    /// Not retried: this is a provider-side bug, not a transient fault.
    #[error("invalid {what} response: {reason}")]
    InvalidResponse { what: String, reason: String },

    /// The snapshot directory could not be created at all.
    #[error("snapshot archival failed: {0}")]
    Archive(#[from] std::io::Error),

    /// Stream probing was requested but the probe tool is missing or broken.
    #[error("stream probe unavailable: {0}")]
    ProbeUnavailable(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
