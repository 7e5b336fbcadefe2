//! Request handlers for the registry API.
//!
//! Store calls are synchronous (the Postgres client blocks on its own
//! runtime), so every handler hops onto a blocking thread before touching
//! the store.

use std::any::Any;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::AppState;
use crate::entity::{
    EntityError, ResourceProvider, ResourceProviderCreate, ResourceProviderUpdate,
    delete_resource_provider,
};
use crate::types::PrefixedId;

/// Body of `POST /resource-providers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceProviderInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "organizationalUnitID")]
    pub organizational_unit_id: PrefixedId,
}

/// Body of `PATCH /resource-providers/{id}`. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceProviderInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_description: bool,
}

/// An error rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<EntityError> for ApiError {
    fn from(e: EntityError) -> Self {
        match e {
            EntityError::MissingField(_) | EntityError::Validation { .. } => {
                Self::Unprocessable(e.to_string())
            }
            EntityError::NotFound(_) => Self::NotFound(e.to_string()),
            EntityError::Store(_) => {
                tracing::error!("store error while serving request: {e}");
                Self::Internal(e.to_string())
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<PrefixedId, ApiError> {
    PrefixedId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("request task failed: {e}")))?
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

pub async fn create_resource_provider(
    State(state): State<AppState>,
    Json(input): Json<CreateResourceProviderInput>,
) -> Result<(StatusCode, Json<ResourceProvider>), ApiError> {
    let provider = blocking(move || {
        let mut create = ResourceProviderCreate::new()
            .name(input.name)
            .organizational_unit_id(input.organizational_unit_id);
        if let Some(description) = input.description {
            create = create.description(description);
        }
        Ok(create.save(state.store.as_ref(), &state.runtime)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

pub async fn get_resource_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResourceProvider>, ApiError> {
    let id = parse_id(&id)?;
    let provider = blocking(move || {
        state
            .store
            .resource_provider(&id)
            .map_err(EntityError::from)?
            .ok_or_else(|| EntityError::NotFound(id).into())
    })
    .await?;
    Ok(Json(provider))
}

pub async fn update_resource_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateResourceProviderInput>,
) -> Result<Json<ResourceProvider>, ApiError> {
    let id = parse_id(&id)?;
    let provider = blocking(move || {
        let mut update = ResourceProviderUpdate::new(id);
        if let Some(name) = input.name {
            update = update.name(name);
        }
        if input.clear_description {
            update = update.clear_description();
        } else if let Some(description) = input.description {
            update = update.description(description);
        }
        Ok(update.save(state.store.as_ref(), &state.runtime)?)
    })
    .await?;
    Ok(Json(provider))
}

pub async fn delete_resource_provider_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || Ok(delete_resource_provider(state.store.as_ref(), &id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_resource_providers(
    State(state): State<AppState>,
    Path(organizational_unit_id): Path<String>,
) -> Result<Json<Vec<ResourceProvider>>, ApiError> {
    let organizational_unit_id = parse_id(&organizational_unit_id)?;
    let providers = blocking(move || {
        Ok(state
            .store
            .resource_providers_for_tenant(&organizational_unit_id)
            .map_err(EntityError::from)?)
    })
    .await?;
    Ok(Json(providers))
}

/// Turn a handler panic into a JSON 500 so it shows up in the response.
#[allow(clippy::needless_pass_by_value)]
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {detail}");
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
