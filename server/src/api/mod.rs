//! The registry's JSON API and the executors that drive it.
//!
//! # Routes
//!
//! - `GET /healthz`
//! - `POST /resource-providers`
//! - `GET | PATCH | DELETE /resource-providers/{id}`
//! - `GET /organizational-units/{id}/resource-providers`

mod client;
mod handlers;
mod transport;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;

pub use client::{ClientError, RegistryClient};
pub use handlers::{ApiError, CreateResourceProviderInput, UpdateResourceProviderInput};
pub use transport::{InProcessExecutor, RequestExecutor, SocketExecutor, TransportError};

use crate::entity::EntityRuntime;
use crate::lifecycle::Environment;
use crate::store::StoreHandle;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreHandle>,
    pub runtime: Arc<EntityRuntime>,
}

impl AppState {
    #[must_use]
    pub fn from_environment(environment: &Environment) -> Self {
        Self {
            store: Arc::clone(environment.store()),
            runtime: Arc::clone(environment.runtime()),
        }
    }
}

/// Build the API router. Handler panics become JSON 500 responses.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/resource-providers",
            post(handlers::create_resource_provider),
        )
        .route(
            "/resource-providers/{id}",
            get(handlers::get_resource_provider)
                .patch(handlers::update_resource_provider)
                .delete(handlers::delete_resource_provider_handler),
        )
        .route(
            "/organizational-units/{id}/resource-providers",
            get(handlers::list_resource_providers),
        )
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;
    use axum::http::{Method, Request, StatusCode};

    use super::*;
    use crate::testing::{TENANT_PREFIX, memory_environment};
    use crate::types::PrefixedId;

    fn request(method: Method, path: &str, body: &str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Bytes::from(body.to_string()))
            .unwrap()
    }

    fn executor() -> InProcessExecutor {
        let environment = memory_environment().unwrap();
        InProcessExecutor::new(router(AppState::from_environment(&environment)))
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = executor()
            .execute(request(Method::GET, "/healthz", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let executor = executor();
        let tenant = PrefixedId::generate(TENANT_PREFIX);
        let body = format!(r#"{{"name":"compute","organizationalUnitID":"{tenant}"}}"#);

        let created = executor
            .execute(request(Method::POST, "/resource-providers", &body))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created: serde_json::Value = serde_json::from_slice(created.body()).unwrap();
        assert_eq!(created["name"], "compute");

        let path = format!("/resource-providers/{}", created["id"].as_str().unwrap());
        let fetched = executor
            .execute(request(Method::GET, &path, ""))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let fetched: serde_json::Value = serde_json::from_slice(fetched.body()).unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_empty_name_is_unprocessable() {
        let tenant = PrefixedId::generate(TENANT_PREFIX);
        let body = format!(r#"{{"name":"","organizationalUnitID":"{tenant}"}}"#);
        let response = executor()
            .execute(request(Method::POST, "/resource-providers", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(error["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let response = executor()
            .execute(request(Method::GET, "/resource-providers/not-an-id", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let id = PrefixedId::generate(crate::entity::RESOURCE_PROVIDER_PREFIX);
        let response = executor()
            .execute(request(Method::DELETE, &format!("/resource-providers/{id}"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn boom() -> &'static str {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_handler_panic_is_captured_in_response() {
        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handlers::panic_response));
        let response = InProcessExecutor::new(app)
            .execute(request(Method::GET, "/boom", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(error["error"], "handler panicked: kaboom");
    }
}
