//! # graphgate - Tool-Calling Gateway
//!
//! Serves MCP tools over HTTP behind bearer authentication. Inbound tokens
//! are verified by [`graphgate_auth`]; each tool call then reaches Microsoft
//! Graph with either the caller's own token or one obtained through the
//! on-behalf-of exchange.
//!
//! ## Modules
//!
//! - [`cli`] - Flags, environment variables and tracing setup
//! - [`config`] - Validated [`GatewayConfig`] with strategy-dependent defaults
//! - [`server`] - Router, bearer middleware, metadata document and MCP endpoint
//! - [`tools`] - `hello` and `list_junk_emails`
//! - [`downstream`] - Downstream API client and credential selection
//! - [`app`] - Startup and graceful shutdown
//! - [`error`] - Gateway error types

pub mod app;
pub mod cli;
pub mod config;
pub mod downstream;
pub mod error;
pub mod server;
pub mod tools;

pub use app::{build_router, run};
pub use cli::Cli;
pub use config::{DownstreamMode, GatewayConfig};
pub use downstream::{DownstreamClient, DownstreamCredentials};
pub use error::{ConfigError, GatewayError, GatewayResult, UpstreamApiError};
pub use server::{AppState, ProtectedResourceMetadata, router};
pub use tools::{Tool, ToolRunner};
