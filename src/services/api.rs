use std::sync::RwLock;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::auth::AuthToken;
use crate::models::job::{JobRequest, JobStatus};
use crate::models::profile::ProfileResponse;
use crate::models::social::{Provider, SocialConnections};

/// Client for the Posting Expert backend REST API.
///
/// One instance is shared by every orchestrator; the bearer token is
/// attached to each request while a live one is present.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<AuthToken>>,
}

/// Response from `POST /queue/enqueue`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

/// Response from `GET /queue/status/{job_id}`.
///
/// The backend has shipped the result/error fields both nested under `meta`
/// and at the top level; both shapes are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusResponse {
    /// `None` when the backend reports a status this client does not know;
    /// the poller keeps waiting rather than failing the job.
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub meta: Option<JobStatusMeta>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<JobStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|status| serde_json::from_value(serde_json::Value::String(status)).ok()))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusMeta {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusResponse {
    /// Result payload: `meta.result`, then `result`, then `output`.
    pub fn extract_result(&self) -> Option<serde_json::Value> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.result.clone())
            .or_else(|| self.result.clone())
            .or_else(|| self.output.clone())
    }

    /// Error message: `meta.error`, then `error`.
    pub fn extract_error(&self) -> Option<String> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.error.clone())
            .or_else(|| self.error.clone())
    }
}

/// Response from `POST /social/{provider}/callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackExchange {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub instagram_username: Option<String>,
    #[serde(default)]
    pub instagram_user_id: Option<String>,
    #[serde(default)]
    pub page_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DisconnectResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with an error message; surfaced verbatim.
    #[error("{0}")]
    Backend(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_base_url.clone())
    }

    /// Install the login token; replaces any previous one.
    pub fn set_token(&self, token: AuthToken) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let guard = self.token.read().expect("token lock poisoned");
        match guard.as_ref() {
            Some(token) if !token.is_expired() => builder.bearer_auth(&token.token),
            _ => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit a content-generation request to the remote queue.
    pub async fn enqueue(&self, request: &JobRequest) -> Result<EnqueueResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.url("/queue/enqueue")))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch the current status of a queued job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("/queue/status/{job_id}")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Exchange an authorization code for a linked account (popup-side step).
    pub async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<CallbackExchange, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/social/{provider}/callback")))
            .json(&serde_json::json!({ "code": code, "state": state }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Sever a provider link for the given app user.
    pub async fn disconnect(&self, provider: Provider, app_user: &str) -> Result<(), ApiError> {
        let response = self
            .authorize(self.http.post(self.url(&format!("/social/{provider}/disconnect"))))
            .json(&serde_json::json!({ "app_user": app_user }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: DisconnectResponse = response.json().await?;
        if body.success {
            Ok(())
        } else {
            Err(ApiError::Backend(
                body.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Fetch the full connection set for one app user.
    pub async fn social_status(&self, app_user: &str) -> Result<SocialConnections, ApiError> {
        let response = self
            .authorize(self.http.get(self.url("/social/status")))
            .query(&[("app_user", app_user)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch the signed-in user's profile.
    pub async fn user_profile(&self) -> Result<ProfileResponse, ApiError> {
        let response = self
            .authorize(self.http.get(self.url("/user/profile")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Map a non-2xx response to the backend's `error` body field when
    /// present, else a generic message carrying the status code.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Err(ApiError::Backend(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_precedence_meta_first() {
        let response: JobStatusResponse = serde_json::from_value(json!({
            "status": "completed",
            "meta": { "result": { "image_urls": ["a"] } },
            "result": { "image_urls": ["b"] },
            "output": { "image_urls": ["c"] }
        }))
        .unwrap();
        assert_eq!(response.extract_result().unwrap()["image_urls"][0], "a");
    }

    #[test]
    fn test_result_precedence_falls_through() {
        let response: JobStatusResponse = serde_json::from_value(json!({
            "status": "completed",
            "output": { "image_urls": ["c"] }
        }))
        .unwrap();
        assert_eq!(response.extract_result().unwrap()["image_urls"][0], "c");
    }

    #[test]
    fn test_unknown_status_maps_to_none() {
        let response: JobStatusResponse =
            serde_json::from_value(json!({ "status": "warming_up" })).unwrap();
        assert!(response.status.is_none());

        let response: JobStatusResponse =
            serde_json::from_value(json!({ "status": "in_progress" })).unwrap();
        assert_eq!(response.status, Some(JobStatus::InProgress));
    }

    #[test]
    fn test_error_precedence() {
        let response: JobStatusResponse = serde_json::from_value(json!({
            "status": "failed",
            "meta": { "error": "model overloaded" },
            "error": "generic"
        }))
        .unwrap();
        assert_eq!(response.extract_error().as_deref(), Some("model overloaded"));

        let response: JobStatusResponse =
            serde_json::from_value(json!({ "status": "failed", "error": "generic" })).unwrap();
        assert_eq!(response.extract_error().as_deref(), Some("generic"));

        let response: JobStatusResponse =
            serde_json::from_value(json!({ "status": "failed" })).unwrap();
        assert!(response.extract_error().is_none());
    }
}
