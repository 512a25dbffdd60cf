//! HTTP submission client for the verification backend REST API.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use async_trait::async_trait;
use fieldmark_core::errors::{Error, Result as CoreResult};
use fieldmark_core::sync::{
    AttendancePayload, BiometricPayload, RemoteResult, RemoteSyncClient, VerificationPayload,
};

use crate::config::RemoteConfig;
use crate::error::{RemoteApiError, Result};

const IDEMPOTENCY_HEADER: &str = "x-fm-idempotency-key";
const MAX_LOG_BODY_CHARS: usize = 512;

/// Structured error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

/// Client for the backend field submission endpoints.
#[derive(Debug, Clone)]
pub struct HttpRemoteSyncClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpRemoteSyncClient {
    pub fn new(config: RemoteConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("Failed building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
        })
    }

    fn headers(&self, idempotency_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| RemoteApiError::invalid_request("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let key_value = HeaderValue::from_str(idempotency_key)
            .map_err(|_| RemoteApiError::invalid_request("Invalid idempotency key format"))?;
        headers.insert(IDEMPOTENCY_HEADER, key_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[RemoteSync] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[RemoteSync] Response error ({}): {}", status, preview);
    }

    /// Treats any 2xx as an acknowledgement; error bodies are surfaced with
    /// the backend's code and message when they parse.
    async fn parse_ack(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if status.is_success() {
            return Ok(());
        }

        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(RemoteApiError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            ));
        }
        Err(RemoteApiError::api(
            status.as_u16(),
            format!("Request failed: {}", body),
        ))
    }

    async fn post_submission<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        idempotency_key: &str,
        payload: &T,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(idempotency_key)?)
            .json(payload)
            .send()
            .await?;

        Self::parse_ack(response).await
    }
}

#[async_trait]
impl RemoteSyncClient for HttpRemoteSyncClient {
    /// POST /api/v1/field/attendance
    async fn submit_attendance(
        &self,
        idempotency_key: &str,
        payload: &AttendancePayload,
    ) -> RemoteResult {
        self.post_submission("/api/v1/field/attendance", idempotency_key, payload)
            .await
            .map_err(Into::into)
    }

    /// POST /api/v1/field/biometrics
    async fn submit_biometric(
        &self,
        idempotency_key: &str,
        payload: &BiometricPayload,
    ) -> RemoteResult {
        self.post_submission("/api/v1/field/biometrics", idempotency_key, payload)
            .await
            .map_err(Into::into)
    }

    /// POST /api/v1/field/verifications
    async fn submit_verification(
        &self,
        idempotency_key: &str,
        payload: &VerificationPayload,
    ) -> RemoteResult {
        self.post_submission("/api/v1/field/verifications", idempotency_key, payload)
            .await
            .map_err(Into::into)
    }
}
