// ============================================================================
// TOM (Target Observation Manager) Configuration
// ============================================================================

use crate::constants::*;

/// Connection and retry configuration for the TOM tracking service.
///
/// The TOM is notified after each exposure and night boundary with the list
/// of alert ids that were just published.  Retry is two-tier: `retry_attempts`
/// bounds both the inner post loop and the outer re-login loop.
#[derive(Clone, Debug)]
pub struct TomConfig {
    /// Base URL, no trailing slash (e.g. "https://desc-tom.lbl.gov")
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Endpoint (relative to base_url) receiving the JSON id array
    pub notify_endpoint: String,
    /// Attempts per retry tier
    pub retry_attempts: u32,
    /// Backoff between attempts (seconds)
    pub retry_backoff_secs: f64,
}

impl TomConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            base_url: std::env::var("TOM_URL").unwrap_or_else(|_| DEFAULT_TOM_URL.to_string()),
            username: std::env::var("TOM_USERNAME").unwrap_or_default(),
            password: std::env::var("TOM_PASSWORD").unwrap_or_default(),
            notify_endpoint: std::env::var("TOM_NOTIFY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_TOM_NOTIFY_ENDPOINT.to_string()),
            retry_attempts: std::env::var("TOM_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| DEFAULT_TOM_RETRY_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(DEFAULT_TOM_RETRY_ATTEMPTS),
            retry_backoff_secs: std::env::var("TOM_RETRY_BACKOFF_SECS")
                .unwrap_or_else(|_| DEFAULT_TOM_RETRY_BACKOFF_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_TOM_RETRY_BACKOFF_SECS),
        }
    }
}
