//! Remote Transport
//!
//! The sync engine talks to the server only through [`RemoteTransport`], so
//! tests and alternative backends can stand in for HTTP.
//!
//! [`HttpTransport`] is the production implementation. It attaches a bearer
//! token from a [`CredentialProvider`]; on HTTP 401 it asks the provider to
//! refresh once and retries the request once. Any other status is handed back
//! to the caller untouched.

use crate::shared::config::AppConfig;
use crate::shared::error::TransportError;
use crate::tracking::ExerciseTracking;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Connectivity probe endpoint
pub const HEALTH_PATH: &str = "/api/health";

/// Characters escaped inside a single URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Upsert endpoint for one plan's completions
pub fn exercise_tracking_path(plan_id: &str) -> String {
    format!(
        "/api/plans/{}/exercise-tracking",
        utf8_percent_encode(plan_id, PATH_SEGMENT)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::status(self.status, self.body.trim()))
        }
    }
}

/// Request/response exchange with the server
#[async_trait]
pub trait RemoteTransport: Send + Sync + fmt::Debug {
    /// Send one request. Returns `Ok` for any HTTP response, including errors;
    /// `Err` means no usable response arrived.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<RemoteResponse, TransportError>;
}

/// Source of bearer tokens
#[async_trait]
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Current token, if signed in
    async fn token(&self) -> Option<String>;

    /// Obtain a fresh token after a 401. Returns `true` if one is available.
    async fn refresh(&self) -> bool;
}

/// Fixed token from configuration. Cannot refresh.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }

    async fn refresh(&self) -> bool {
        false
    }
}

/// Wire form of a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub id: Uuid,
    pub plan_id: String,
    pub session_id: String,
    pub exercise_id: String,
    pub completion_key: String,
    pub exercise_title: String,
    pub date: DateTime<Utc>,
    pub notes: String,
}

impl From<&ExerciseTracking> for CompletionPayload {
    fn from(record: &ExerciseTracking) -> Self {
        Self {
            id: record.id,
            plan_id: record.plan_id.clone(),
            session_id: record.session_id.clone(),
            exercise_id: record.exercise_id.clone(),
            completion_key: record.completion_key.to_string(),
            exercise_title: record.display_title.clone(),
            date: record.date,
            notes: record.notes.clone(),
        }
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: AppConfig,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTransport {
    /// Build a client with the configured timeout and static token.
    pub fn new(config: &AppConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
            credentials: Arc::new(StaticToken::new(config.api_token.clone())),
        })
    }

    /// Replace the credential source.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<RemoteResponse, TransportError> {
        let url = self.config.api_url(path);
        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RemoteResponse { status, body })
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<RemoteResponse, TransportError> {
        let token = self.credentials.token().await;
        let response = self
            .execute(method, path, body.as_ref(), token.as_deref())
            .await?;
        if response.status != 401 {
            return Ok(response);
        }

        tracing::debug!(path, "request unauthorized; refreshing credentials");
        if !self.credentials.refresh().await {
            return Err(TransportError::unauthorized(response.body.trim()));
        }

        let token = self.credentials.token().await;
        let retried = self
            .execute(method, path, body.as_ref(), token.as_deref())
            .await?;
        if retried.status == 401 {
            tracing::warn!(path, "request still unauthorized after refresh");
            return Err(TransportError::unauthorized(retried.body.trim()));
        }
        Ok(retried)
    }
}
