//! Typed client for the registry API over any [`RequestExecutor`].

use std::fmt;

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::handlers::{CreateResourceProviderInput, UpdateResourceProviderInput};
use crate::api::transport::{RequestExecutor, TransportError};
use crate::entity::ResourceProvider;
use crate::types::PrefixedId;

pub struct RegistryClient<E> {
    executor: E,
}

impl<E: RequestExecutor> RegistryClient<E> {
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Send a request and return the raw response, whatever its status.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response<Bytes>, ClientError> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.map(Bytes::from).unwrap_or_default())
            .map_err(ClientError::Request)?;
        Ok(self.executor.execute(request).await?)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, ClientError> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ClientError::Encode)?;
        let response = expect_success(self.send(method, path, body).await?)?;
        serde_json::from_slice(response.body()).map_err(ClientError::Decode)
    }

    pub async fn health(&self) -> Result<bool, ClientError> {
        let body: serde_json::Value = self.call(Method::GET, "/healthz", None::<&()>).await?;
        Ok(body["ok"] == true)
    }

    pub async fn create_resource_provider(
        &self,
        input: &CreateResourceProviderInput,
    ) -> Result<ResourceProvider, ClientError> {
        self.call(Method::POST, "/resource-providers", Some(input))
            .await
    }

    pub async fn resource_provider(&self, id: &PrefixedId) -> Result<ResourceProvider, ClientError> {
        self.call(Method::GET, &format!("/resource-providers/{id}"), None::<&()>)
            .await
    }

    pub async fn update_resource_provider(
        &self,
        id: &PrefixedId,
        input: &UpdateResourceProviderInput,
    ) -> Result<ResourceProvider, ClientError> {
        self.call(Method::PATCH, &format!("/resource-providers/{id}"), Some(input))
            .await
    }

    pub async fn delete_resource_provider(&self, id: &PrefixedId) -> Result<(), ClientError> {
        let response = self
            .send(Method::DELETE, &format!("/resource-providers/{id}"), None)
            .await?;
        expect_success(response).map(drop)
    }

    pub async fn resource_providers_for_tenant(
        &self,
        organizational_unit_id: &PrefixedId,
    ) -> Result<Vec<ResourceProvider>, ClientError> {
        self.call(
            Method::GET,
            &format!("/organizational-units/{organizational_unit_id}/resource-providers"),
            None::<&()>,
        )
        .await
    }
}

fn expect_success(response: Response<Bytes>) -> Result<Response<Bytes>, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = serde_json::from_slice::<serde_json::Value>(response.body())
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(response.body()).into_owned());
    Err(ClientError::Status { status, message })
}

#[derive(Debug)]
pub enum ClientError {
    Request(axum::http::Error),
    Transport(TransportError),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    /// The server answered with a non-success status.
    Status { status: StatusCode, message: String },
}

impl ClientError {
    /// The response status, if the server answered with an error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "invalid request: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Encode(e) => write!(f, "failed encoding request body: {e}"),
            Self::Decode(e) => write!(f, "failed decoding response body: {e}"),
            Self::Status { status, message } => write!(f, "{status}: {message}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Encode(e) | Self::Decode(e) => Some(e),
            Self::Status { .. } => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
