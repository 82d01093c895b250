//! HTTP surface
//!
//! | route | auth | purpose |
//! |---|---|---|
//! | `GET /.well-known/oauth-protected-resource` | none | RFC 9728 metadata |
//! | `GET /healthz` | none | liveness |
//! | `POST /mcp` | bearer | MCP tools endpoint |

pub mod auth;
pub mod mcp;
pub mod metadata;

pub use auth::{AuthRejection, bearer_token, require_bearer};
pub use mcp::GatewayHandler;
pub use metadata::ProtectedResourceMetadata;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use graphgate_auth::TokenVerifier;

use crate::config::PROTECTED_RESOURCE_PATH;
use crate::tools::ToolRunner;

/// Path of the MCP endpoint
pub const MCP_PATH: &str = "/mcp";

/// Path of the liveness check
pub const HEALTH_PATH: &str = "/healthz";

/// Largest accepted request body
pub const MAX_REQUEST_BODY: usize = 1024 * 1024;

/// Shared, immutable per-process state
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    verifier: Arc<dyn TokenVerifier>,
    tools: ToolRunner,
    metadata: ProtectedResourceMetadata,
    resource_metadata_url: String,
}

impl AppState {
    /// Create state for the router
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        tools: ToolRunner,
        metadata: ProtectedResourceMetadata,
        resource_metadata_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                verifier,
                tools,
                metadata,
                resource_metadata_url: resource_metadata_url.into(),
            }),
        }
    }

    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.inner.verifier.as_ref()
    }

    pub fn tools(&self) -> &ToolRunner {
        &self.inner.tools
    }

    pub fn metadata(&self) -> &ProtectedResourceMetadata {
        &self.inner.metadata
    }

    /// Absolute URL advertised in bearer challenges
    pub fn resource_metadata_url(&self) -> &str {
        &self.inner.resource_metadata_url
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(MCP_PATH, post(mcp::handle))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route(PROTECTED_RESOURCE_PATH, get(serve_metadata))
        .route(HEALTH_PATH, get(health))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_metadata(State(state): State<AppState>) -> Json<ProtectedResourceMetadata> {
    Json(state.metadata().clone())
}

async fn health() -> &'static str {
    "ok"
}
