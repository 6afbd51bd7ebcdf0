// REST + SSE client for the host-control backend

pub mod sse;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use crate::actions::{ActionExecutor, ActionKind};
use crate::config::ApiConfig;
use crate::models::{
    ContainerList, ContainerSnapshot, EntityId, EntityKind, ServiceDetails, ServiceList,
};
use sse::EventStream;

/// Transport error. Payloads are plain strings so one failure can be handed
/// to every caller waiting on the same fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("Server-Sent Events are not supported by this endpoint")]
    UnsupportedStream,
    #[error("invalid url: {0}")]
    Url(String),
}

impl ApiError {
    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(timeout)
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Remote resource a polling subscription keeps fresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Services,
    Service(String),
    Containers,
    Container(String),
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKey::Services => f.write_str("services"),
            ResourceKey::Service(name) => write!(f, "service {}", name),
            ResourceKey::Containers => f.write_str("containers"),
            ResourceKey::Container(id) => write!(f, "container {}", id),
        }
    }
}

/// Explicitly constructed backend client; clone it into each pipeline.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    services_path: String,
    containers_path: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Url(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url(config.base_url.clone()));
        }
        let timeout = config.request_timeout();
        // No client-wide timeout: it would cut long-lived log streams.
        // REST calls set it per request instead.
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(crate::version::user_agent())
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            timeout,
            services_path: config.services_path.clone(),
            containers_path: config.containers_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn kind_path(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Service => &self.services_path,
            EntityKind::Container => &self.containers_path,
        }
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn resource_url(&self, key: &ResourceKey) -> Result<Url, ApiError> {
        match key {
            ResourceKey::Services => self.endpoint(&[self.services_path.as_str()]),
            ResourceKey::Service(name) => self.endpoint(&[self.services_path.as_str(), name.as_str()]),
            ResourceKey::Containers => self.endpoint(&[self.containers_path.as_str()]),
            ResourceKey::Container(id) => self.endpoint(&[self.containers_path.as_str(), id.as_str()]),
        }
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    #[instrument(skip(self), fields(operation = "fetch_resource"))]
    pub async fn fetch_resource<T: DeserializeOwned>(
        &self,
        key: &ResourceKey,
    ) -> Result<T, ApiError> {
        let url = self.resource_url(key)?;
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))
    }

    pub async fn list_services(&self) -> Result<ServiceList, ApiError> {
        self.fetch_resource(&ResourceKey::Services).await
    }

    pub async fn get_service(&self, name: &str) -> Result<ServiceDetails, ApiError> {
        self.fetch_resource(&ResourceKey::Service(name.to_string()))
            .await
    }

    pub async fn list_containers(&self) -> Result<ContainerList, ApiError> {
        self.fetch_resource(&ResourceKey::Containers).await
    }

    pub async fn get_container(&self, id: &str) -> Result<ContainerSnapshot, ApiError> {
        self.fetch_resource(&ResourceKey::Container(id.to_string()))
            .await
    }

    /// POST /{kind}/{id}/{start|stop|restart}
    #[instrument(skip(self), fields(operation = "perform_action", entity = %target))]
    pub async fn perform_action(
        &self,
        action: ActionKind,
        target: &EntityId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&[
            self.kind_path(target.kind),
            target.id.as_str(),
            action.as_str(),
        ])?;
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Opens the log stream: GET /{kind}/{id}/logs?lines=N
    #[instrument(skip(self), fields(operation = "stream_logs", entity = %target))]
    pub async fn stream_logs(&self, target: &EntityId, lines: u32) -> Result<EventStream, ApiError> {
        let mut url = self.endpoint(&[self.kind_path(target.kind), target.id.as_str(), "logs"])?;
        url.query_pairs_mut()
            .append_pair("lines", &lines.to_string());
        self.open_stream(url).await
    }

    /// POST /{containers}/{id}/exec with `{"command": ...}`.
    #[instrument(skip(self), fields(operation = "start_exec"))]
    pub async fn start_exec(&self, container_id: &str, command: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[self.containers_path.as_str(), container_id, "exec"])?;
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// GET /{containers}/{id}/exec/output
    pub async fn exec_output(&self, container_id: &str) -> Result<EventStream, ApiError> {
        let url = self.endpoint(&[
            self.containers_path.as_str(),
            container_id,
            "exec",
            "output",
        ])?;
        self.open_stream(url).await
    }

    async fn open_stream(&self, url: Url) -> Result<EventStream, ApiError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;
        let response = Self::check_status(response).await?;
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if !is_event_stream {
            return Err(ApiError::UnsupportedStream);
        }
        tracing::debug!(url = %response.url(), "event stream open");
        Ok(sse::decode_stream(response.bytes_stream()))
    }
}

impl ActionExecutor for ApiClient {
    async fn perform(&self, action: ActionKind, target: &EntityId) -> Result<(), ApiError> {
        self.perform_action(action, target).await
    }
}
