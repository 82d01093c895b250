//! Tools exposed over MCP
//!
//! Each tool issues one downstream `GET` with the caller's downstream token
//! and renders the JSON answer as text. Neither tool takes arguments.

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info};
use turbomcp_core::error::{McpError, McpResult};
use turbomcp_types::{Tool as ToolDefinition, ToolInputSchema, ToolResult};

use graphgate_auth::Principal;

use crate::downstream::{DownstreamClient, DownstreamCredentials};
use crate::error::{GatewayError, GatewayResult};

/// Path of the signed-in user's profile
pub const PROFILE_PATH: &str = "/me";

/// Five most recent junk folder messages, reduced to the rendered fields
pub const JUNK_EMAILS_PATH: &str =
    "/me/mailFolders/junkemail/messages?$top=5&$select=subject,from,receivedDateTime";

/// Available tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Greet the caller by profile name
    Hello,
    /// List recent junk emails
    ListJunkEmails,
}

impl Tool {
    /// Every tool, in listing order
    pub const ALL: [Tool; 2] = [Tool::Hello, Tool::ListJunkEmails];

    /// Tool name on the wire
    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::ListJunkEmails => "list_junk_emails",
        }
    }

    /// Look a tool up by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Human readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::Hello => "Say hello using your Microsoft profile name.",
            Self::ListJunkEmails => "List your 5 most recent junk emails.",
        }
    }

    /// Downstream path the tool reads
    pub fn path(self) -> &'static str {
        match self {
            Self::Hello => PROFILE_PATH,
            Self::ListJunkEmails => JUNK_EMAILS_PATH,
        }
    }

    /// Object schema without properties; additional properties are refused
    pub fn input_schema(self) -> ToolInputSchema {
        ToolInputSchema::empty()
    }

    /// `tools/list` entry
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_schema(self.input_schema())
    }

    /// Check call arguments against the input schema
    ///
    /// Absent arguments are accepted. Only declared properties are checked,
    /// not their types.
    ///
    /// # Errors
    ///
    /// Returns an invalid params [`McpError`] for non-object arguments or a
    /// property the schema does not declare while refusing additional ones.
    pub fn check_arguments(self, args: &Value) -> McpResult<()> {
        let args = match args {
            Value::Null => return Ok(()),
            Value::Object(args) => args,
            _ => return Err(McpError::invalid_params("Arguments must be an object or null")),
        };

        let schema = self.input_schema();
        let declared = schema.properties.as_ref().and_then(Value::as_object);
        if schema.additional_properties == Some(Value::Bool(false))
            && let Some(unexpected) = args
                .keys()
                .find(|key| !declared.is_some_and(|props| props.contains_key(key.as_str())))
        {
            return Err(McpError::invalid_params(format!(
                "Unexpected argument '{unexpected}' for tool {}",
                self.name()
            )));
        }
        Ok(())
    }

    /// Render the downstream answer
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Tool`] when the answer lacks a field the tool
    /// cannot do without.
    pub fn render(self, body: &Value) -> GatewayResult<String> {
        match self {
            Self::Hello => body
                .get("displayName")
                .and_then(Value::as_str)
                .map(|name| format!("Hello, {name}!"))
                .ok_or_else(|| GatewayError::tool("profile has no displayName")),
            Self::ListJunkEmails => Ok(format_junk_emails(body)),
        }
    }
}

/// Render a message listing as one line per message
pub fn format_junk_emails(body: &Value) -> String {
    let messages = body
        .get("value")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if messages.is_empty() {
        return "No junk emails found.".to_string();
    }

    messages
        .iter()
        .map(|message| {
            let subject = message
                .get("subject")
                .and_then(Value::as_str)
                .unwrap_or("(no subject)");
            let sender = message
                .pointer("/from/emailAddress/address")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let received = message
                .get("receivedDateTime")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("- {subject} (from: {sender}, {received})")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs tools for a verified caller
#[derive(Debug, Clone)]
pub struct ToolRunner {
    downstream: DownstreamClient,
    credentials: DownstreamCredentials,
}

impl ToolRunner {
    /// Create a runner over a downstream client and credential mode
    pub fn new(downstream: DownstreamClient, credentials: DownstreamCredentials) -> Self {
        Self {
            downstream,
            credentials,
        }
    }

    /// Run a tool and return its text
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Exchange`] when no downstream token could be
    /// obtained, [`GatewayError::Upstream`] when the downstream call fails, or
    /// [`GatewayError::Tool`] when the answer cannot be rendered.
    pub async fn run(&self, tool: Tool, principal: &Principal) -> GatewayResult<String> {
        debug!(
            tool = tool.name(),
            mode = self.credentials.mode(),
            client_id = %principal.client_id(),
            "Running tool"
        );

        let token = self.credentials.token_for(principal).await?;
        let body = self
            .downstream
            .get_json(token.expose_secret(), tool.path())
            .await?;
        tool.render(&body)
    }

    /// Run a tool, reporting failures as an error result
    pub async fn call(&self, tool: Tool, principal: &Principal) -> ToolResult {
        match self.run(tool, principal).await {
            Ok(text) => ToolResult::text(text),
            Err(error) => {
                info!(tool = tool.name(), error = %error, "Tool call failed");
                ToolResult::error(error.to_string())
            }
        }
    }
}
