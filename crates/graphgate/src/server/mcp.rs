//! MCP endpoint
//!
//! The bearer middleware has already verified the caller. Each request is
//! routed through the shared `turbomcp-core` router against a
//! [`GatewayHandler`] bound to the caller's [`Principal`].
//!
//! Single messages only. A message without `id` is a notification: it is
//! accepted with `202` and no body. Protocol errors are answered with HTTP
//! `200` and a JSON-RPC error object.

use std::future::Future;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;
use turbomcp_core::context::{RequestContext, TransportType};
use turbomcp_core::error::{McpError, McpResult};
use turbomcp_core::handler::McpHandler;
use turbomcp_core::jsonrpc::{JSONRPC_VERSION, JsonRpcIncoming, JsonRpcOutgoing};
use turbomcp_core::marker::MaybeSend;
use turbomcp_core::router::{RouteConfig, route_request};
use turbomcp_types::{Prompt, PromptResult, Resource, ResourceResult, ServerInfo, Tool, ToolResult};

use graphgate_auth::Principal;

use super::AppState;
use crate::tools;

/// Protocol revisions this gateway speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-11-25", "2025-06-18", "2025-03-26", "2024-11-05"];

/// Revision offered when the client asks for none or an unknown one
pub const LATEST_PROTOCOL_VERSION: &str = "2025-11-25";

/// Pick the revision announced by `initialize`
///
/// A supported client revision is echoed back; anything else falls back to
/// [`LATEST_PROTOCOL_VERSION`].
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|requested| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|supported| *supported == requested)
        })
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

/// Tools of this gateway, acting for one verified caller
#[derive(Clone)]
pub struct GatewayHandler {
    state: AppState,
    principal: Principal,
}

impl std::fmt::Debug for GatewayHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandler")
            .field("server", &self.state.metadata().resource_name)
            .field("client_id", &self.principal.client_id())
            .finish_non_exhaustive()
    }
}

impl GatewayHandler {
    pub fn new(state: AppState, principal: Principal) -> Self {
        Self { state, principal }
    }
}

#[allow(clippy::manual_async_fn)]
impl McpHandler for GatewayHandler {
    fn server_info(&self) -> ServerInfo {
        ServerInfo::new(
            self.state.metadata().resource_name.clone(),
            env!("CARGO_PKG_VERSION"),
        )
    }

    fn list_tools(&self) -> Vec<Tool> {
        tools::Tool::ALL
            .into_iter()
            .map(tools::Tool::definition)
            .collect()
    }

    fn list_resources(&self) -> Vec<Resource> {
        Vec::new()
    }

    fn list_prompts(&self) -> Vec<Prompt> {
        Vec::new()
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        args: Value,
        _ctx: &'a RequestContext,
    ) -> impl Future<Output = McpResult<ToolResult>> + MaybeSend + 'a {
        async move {
            let tool = tools::Tool::from_name(name).ok_or_else(|| McpError::tool_not_found(name))?;
            tool.check_arguments(&args)?;
            Ok(self.state.tools().call(tool, &self.principal).await)
        }
    }

    fn read_resource<'a>(
        &'a self,
        uri: &'a str,
        _ctx: &'a RequestContext,
    ) -> impl Future<Output = McpResult<ResourceResult>> + MaybeSend + 'a {
        async move { Err(McpError::resource_not_found(uri)) }
    }

    fn get_prompt<'a>(
        &'a self,
        name: &'a str,
        _args: Option<Value>,
        _ctx: &'a RequestContext,
    ) -> impl Future<Output = McpResult<PromptResult>> + MaybeSend + 'a {
        async move { Err(McpError::prompt_not_found(name)) }
    }
}

/// `POST /mcp`
pub async fn handle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            return reply(JsonRpcOutgoing::error(
                Some(Value::Null),
                McpError::parse_error(format!("Invalid JSON: {e}")),
            ));
        }
    };

    let id_hint = Some(message.get("id").cloned().unwrap_or(Value::Null));
    let request: JsonRpcIncoming = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            return reply(JsonRpcOutgoing::error(
                id_hint,
                McpError::invalid_request(e.to_string()),
            ));
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return reply(JsonRpcOutgoing::error(
            id_hint,
            McpError::invalid_request(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{}'",
                request.jsonrpc
            )),
        ));
    }

    if request.is_notification() {
        debug!(method = %request.method, "Notification accepted");
        return StatusCode::ACCEPTED.into_response();
    }

    let protocol_version = (request.method == "initialize").then(|| {
        negotiate_protocol_version(
            request
                .params
                .as_ref()
                .and_then(|params| params.get("protocolVersion"))
                .and_then(Value::as_str),
        )
    });
    let request_id = request
        .id
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();

    debug!(
        method = %request.method,
        client_id = %principal.client_id(),
        "Dispatching request"
    );

    let handler = GatewayHandler::new(state, principal);
    let ctx = RequestContext::with_id_and_transport(request_id, TransportType::Http);
    let config = RouteConfig { protocol_version };
    let response = route_request(&handler, request, &ctx, &config).await;

    if response.should_send() {
        reply(response)
    } else {
        StatusCode::ACCEPTED.into_response()
    }
}

fn reply(response: JsonRpcOutgoing) -> Response {
    Json(response).into_response()
}
