//! Command-line and environment configuration surface
//!
//! Every flag can also be set through an environment variable, so the gateway
//! runs unchanged from a shell, a container or a `.env`-driven supervisor.

use clap::{CommandFactory, FromArgMatches, Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use graphgate_auth::VerificationStrategy;
use graphgate_auth::discovery::DEFAULT_AUTHORITY;

/// Default downstream resource API
pub const DEFAULT_DOWNSTREAM_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default scope requested by the on-behalf-of exchange
pub const DEFAULT_DOWNSTREAM_SCOPE: &str = "https://graph.microsoft.com/.default";

/// graphgate - verify bearer tokens and call Microsoft Graph on the user's behalf
#[derive(Parser, Debug)]
#[command(
    name = "graphgate",
    version,
    about = "Tool-calling gateway with bearer token verification and on-behalf-of exchange",
    long_about = "Serves JSON-RPC tools over HTTP. Inbound bearer tokens are verified against\n\
                  the tenant's published metadata, then used directly or exchanged for a\n\
                  downstream token to call Microsoft Graph."
)]
pub struct Cli {
    /// Directory (tenant) id or domain
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: String,

    /// Application (client) id of this gateway
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret used for the on-behalf-of exchange
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Public base URL of this gateway
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Listen address
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Identity provider authority
    #[arg(long, env = "AZURE_AUTHORITY", default_value = DEFAULT_AUTHORITY)]
    pub authority: String,

    /// Token verification strategy
    #[arg(long, env = "GRAPHGATE_VERIFICATION", value_enum, default_value = "signature")]
    pub verification: VerificationArg,

    /// Accept claims-only verification, which does not check token signatures
    #[arg(long, env = "GRAPHGATE_ALLOW_UNVERIFIED")]
    pub allow_unverified_signatures: bool,

    /// Expected `aud` claim [default: client id, or the Graph app id for claims-only]
    #[arg(long, env = "GRAPHGATE_AUDIENCE")]
    pub audience: Option<String>,

    /// Accepted `iss` claim; repeatable [default: discovered issuer, or sts.windows.net for claims-only]
    #[arg(long = "issuer", env = "GRAPHGATE_ISSUERS", value_delimiter = ',')]
    pub issuers: Vec<String>,

    /// Scope every token must carry; repeatable, space or comma separated
    #[arg(long = "required-scope", env = "GRAPHGATE_REQUIRED_SCOPES", value_delimiter = ',')]
    pub required_scopes: Vec<String>,

    /// Namespace for short-form scopes [default: api://{client id}]
    #[arg(long, env = "GRAPHGATE_SCOPE_NAMESPACE")]
    pub scope_namespace: Option<String>,

    /// Qualify short-form token scopes before comparison [default: on for signature]
    #[arg(
        long,
        env = "GRAPHGATE_NORMALIZE_SCOPES",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub normalize_scopes: Option<bool>,

    /// How the downstream token is obtained [default: on-behalf-of for signature]
    #[arg(long, env = "GRAPHGATE_DOWNSTREAM", value_enum)]
    pub downstream: Option<DownstreamArg>,

    /// Downstream resource API base URL
    #[arg(long, env = "GRAPHGATE_DOWNSTREAM_BASE_URL", default_value = DEFAULT_DOWNSTREAM_BASE_URL)]
    pub downstream_base_url: String,

    /// Scope requested by the exchange; repeatable
    #[arg(
        long = "downstream-scope",
        env = "GRAPHGATE_DOWNSTREAM_SCOPES",
        value_delimiter = ',',
        default_value = DEFAULT_DOWNSTREAM_SCOPE
    )]
    pub downstream_scopes: Vec<String>,

    /// Name advertised in protected resource metadata
    #[arg(long, env = "GRAPHGATE_RESOURCE_NAME", default_value = "graphgate")]
    pub resource_name: String,

    /// Timeout for every outbound HTTP call, in seconds
    #[arg(long, env = "GRAPHGATE_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Log presented versus expected token claims at debug level
    #[arg(long, env = "GRAPHGATE_DIAGNOSTICS")]
    pub diagnostics: bool,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Verification strategy as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerificationArg {
    /// Verify signatures against the tenant key set
    Signature,
    /// Trust claims without checking signatures
    ClaimsOnly,
}

impl From<VerificationArg> for VerificationStrategy {
    fn from(arg: VerificationArg) -> Self {
        match arg {
            VerificationArg::Signature => Self::Signature,
            VerificationArg::ClaimsOnly => Self::ClaimsOnly,
        }
    }
}

/// Downstream credential mode as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DownstreamArg {
    /// Forward the verified inbound token
    PassThrough,
    /// Exchange the inbound token for a downstream token on every call
    OnBehalfOf,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// Parse `argv` alone, ignoring every `env` fallback
    ///
    /// Settings then depend only on the arguments given, whatever the
    /// process environment holds.
    ///
    /// # Errors
    ///
    /// Returns the [`clap::Error`] for missing or invalid arguments.
    pub fn try_parse_args_only<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command_without_env().try_get_matches_from(argv)?;
        Self::from_arg_matches(&matches)
    }

    fn command_without_env() -> clap::Command {
        Self::command().mut_args(|arg| arg.env(None::<&str>))
    }

    /// Log level selected by `-v`/`-q`
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        }
    }

    /// Initialize the tracing subscriber; `RUST_LOG` overrides the verbosity flags
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level().as_str().to_lowercase()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false);

        match self.log_format {
            LogFormat::Text => builder.init(),
            LogFormat::Json => builder.json().init(),
        }
    }
}
