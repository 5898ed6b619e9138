// ============================================================================
// TOM Client - tracking-service notification
// ============================================================================
//
// The TOM (Target Observation Manager) records which alerts have been
// published.  Sessions are cookie-based with Django CSRF protection: GET the
// login page for a csrftoken cookie, POST credentials with that token, then
// send the token in an X-CSRFToken header on every later request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use elasticc_config::TomConfig;

use crate::error::{StreamError, StreamResult};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Notification seam the streamer is written against.
#[async_trait]
pub trait AlertTracker: Send {
    /// Report published alert ids.  Must be a no-op for an empty list.
    async fn notify(&mut self, ids: &[i64]) -> StreamResult<()>;
}

#[derive(Debug, Deserialize)]
struct TomResponse {
    status: String,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    exception: Option<String>,
    #[serde(default)]
    traceback: Option<String>,
}

/// HTTP client holding one logged-in TOM session.
///
/// Notification retry is two-tier: an inner post loop for transient HTTP
/// failures and bad responses, and an outer loop that re-establishes the
/// session (re-login) before retrying the inner loop.  Exhausting the outer
/// loop is fatal to the caller's current night.
pub struct TomClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    notify_endpoint: String,
    retry: RetryPolicy,
    csrf_token: Option<String>,
}

impl TomClient {
    pub fn new(config: &TomConfig) -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            notify_endpoint: config.notify_endpoint.clone(),
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_secs_f64(config.retry_backoff_secs),
            ),
            csrf_token: None,
        })
    }

    /// Establish (or re-establish) the session.
    pub async fn login(&mut self) -> StreamResult<()> {
        let url = format!("{}/accounts/login/", self.base_url);
        debug!(%url, "logging into tom");

        let res = self.client.get(&url).send().await?;
        let csrf = res
            .cookies()
            .find(|c| c.name() == "csrftoken")
            .map(|c| c.value().to_string())
            .ok_or_else(|| {
                StreamError::Tom("login page did not set a csrftoken cookie".to_string())
            })?;

        let res = self
            .client
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("csrfmiddlewaretoken", csrf.as_str()),
            ])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(StreamError::Tom(format!(
                "login failed with status {}",
                res.status()
            )));
        }
        // Django rotates the token on login; prefer the fresh one.
        let rotated = res
            .cookies()
            .find(|c| c.name() == "csrftoken")
            .map(|c| c.value().to_string());
        let body = res.text().await?;
        if body.contains("Please enter a correct") {
            return Err(StreamError::Tom("login rejected, check credentials".to_string()));
        }
        self.csrf_token = Some(rotated.unwrap_or(csrf));
        info!("tom session established");
        Ok(())
    }

    async fn post_ids(&self, ids: &[i64]) -> StreamResult<()> {
        let url = format!("{}/{}", self.base_url, self.notify_endpoint);
        let mut request = self.client.post(&url).json(&ids);
        if let Some(token) = &self.csrf_token {
            request = request.header("X-CSRFToken", token.as_str());
        }
        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(StreamError::Tom(format!(
                "notify returned status {}",
                res.status()
            )));
        }
        let body: TomResponse = res.json().await?;
        if body.status != "ok" {
            error!(
                status = %body.status,
                message = ?body.message,
                exception = ?body.exception,
                traceback = ?body.traceback,
                "tom rejected notification"
            );
            return Err(StreamError::Tom(format!(
                "notify returned status '{}'",
                body.status
            )));
        }
        Ok(())
    }

    async fn post_ids_with_retry(&mut self, ids: &[i64]) -> StreamResult<()> {
        let policy = self.retry;
        let ids = ids.to_vec();
        retry_with_backoff(policy, "tom notify post", self, move |tom, _attempt| {
            let ids = ids.clone();
            Box::pin(async move { tom.post_ids(&ids).await })
        })
        .await
    }
}

#[async_trait]
impl AlertTracker for TomClient {
    async fn notify(&mut self, ids: &[i64]) -> StreamResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "notifying tom of published alerts");
        let policy = self.retry;
        let ids = ids.to_vec();
        retry_with_backoff(policy, "tom notify", self, move |tom, attempt| {
            let ids = ids.clone();
            Box::pin(async move {
                // First attempt rides the existing session (or creates one);
                // later attempts assume the session went bad and re-login.
                if attempt > 1 || tom.csrf_token.is_none() {
                    tom.login().await?;
                }
                tom.post_ids_with_retry(&ids).await
            })
        })
        .await
    }
}

/// Tracker that records nothing; wiring stand-in for dry runs.
#[derive(Default)]
pub struct NoopTracker {
    pub notified: u64,
}

#[async_trait]
impl AlertTracker for NoopTracker {
    async fn notify(&mut self, ids: &[i64]) -> StreamResult<()> {
        if !ids.is_empty() {
            self.notified += ids.len() as u64;
            debug!(count = ids.len(), "noop notify");
        }
        Ok(())
    }
}
