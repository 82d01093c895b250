//! Validated gateway configuration
//!
//! [`GatewayConfig::from_cli`] applies the strategy-dependent defaults and
//! rejects combinations the gateway cannot serve.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use graphgate_auth::{ScopeNamespace, ScopeSet, VerificationStrategy, VerifierConfig};

use crate::cli::{Cli, DownstreamArg};
use crate::error::ConfigError;

/// Application id of Microsoft Graph, the audience of Graph-issued tokens
pub const GRAPH_APP_ID: &str = "00000003-0000-0000-c000-000000000000";

/// Scope name exposed by the gateway's own app registration
pub const ACCESS_AS_USER: &str = "access_as_user";

/// Scopes required of Graph-audience tokens by default
pub const CLAIMS_ONLY_REQUIRED_SCOPES: &str = "User.Read Mail.Read";

/// Path of the protected resource metadata document
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// How the downstream bearer token is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamMode {
    /// Forward the verified inbound token
    PassThrough,
    /// Exchange the inbound token on every call
    OnBehalfOf,
}

/// Fully resolved gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub tenant_id: String,
    pub authority: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// Public base URL without trailing slash
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub resource_name: String,
    pub verifier: VerifierConfig,
    pub downstream: DownstreamMode,
    /// Downstream API base URL without trailing slash
    pub downstream_base_url: String,
    pub downstream_scopes: ScopeSet,
    pub http_timeout: Duration,
}

impl GatewayConfig {
    /// Resolve defaults and validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a blank tenant, a missing client id or
    /// secret, claims-only without acknowledgement, empty scope lists,
    /// unparsable URLs or a zero timeout.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let tenant_id = non_blank(Some(&cli.tenant_id)).ok_or(ConfigError::Missing("tenant id"))?;
        let client_id = non_blank(cli.client_id.as_ref());
        let client_secret = non_blank(cli.client_secret.as_ref()).map(SecretString::new);
        let strategy = VerificationStrategy::from(cli.verification);

        match strategy {
            VerificationStrategy::Signature if client_id.is_none() => {
                return Err(ConfigError::MissingClientId("signature verification"));
            }
            VerificationStrategy::ClaimsOnly if !cli.allow_unverified_signatures => {
                return Err(ConfigError::UnverifiedSignaturesNotAcknowledged);
            }
            _ => {}
        }

        if cli.http_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let base_url = parse_url("--base-url", &cli.base_url)?;
        let authority = parse_url("--authority", &cli.authority)?;
        let downstream_base_url = parse_url("--downstream-base-url", &cli.downstream_base_url)?;

        let scope_namespace = non_blank(cli.scope_namespace.as_ref())
            .or_else(|| client_id.as_ref().map(|id| format!("api://{id}")))
            .map(ScopeNamespace::new);

        let normalize_scopes = cli
            .normalize_scopes
            .unwrap_or_else(|| strategy.normalizes_scopes_by_default());
        if normalize_scopes && scope_namespace.is_none() {
            return Err(ConfigError::MissingScopeNamespace);
        }

        let audience = non_blank(cli.audience.as_ref()).unwrap_or_else(|| match strategy {
            VerificationStrategy::Signature => client_id.clone().unwrap_or_default(),
            VerificationStrategy::ClaimsOnly => GRAPH_APP_ID.to_string(),
        });

        let mut issuers: Vec<String> = cli
            .issuers
            .iter()
            .filter_map(|issuer| non_blank(Some(issuer)))
            .collect();
        if issuers.is_empty() && strategy == VerificationStrategy::ClaimsOnly {
            issuers.push(format!("https://sts.windows.net/{tenant_id}/"));
        }

        let required_scopes = if cli.required_scopes.is_empty() {
            match (strategy, &scope_namespace) {
                (VerificationStrategy::Signature, Some(namespace)) => {
                    ScopeSet::parse(&format!("{namespace}/{ACCESS_AS_USER}"))
                }
                (VerificationStrategy::Signature, None) => ScopeSet::parse(ACCESS_AS_USER),
                (VerificationStrategy::ClaimsOnly, _) => {
                    ScopeSet::parse(CLAIMS_ONLY_REQUIRED_SCOPES)
                }
            }
        } else {
            ScopeSet::parse(&cli.required_scopes.join(" "))
        };
        if required_scopes.is_empty() {
            return Err(ConfigError::EmptyRequiredScopes);
        }

        let downstream = match cli.downstream {
            Some(DownstreamArg::PassThrough) => DownstreamMode::PassThrough,
            Some(DownstreamArg::OnBehalfOf) => DownstreamMode::OnBehalfOf,
            None => match strategy {
                VerificationStrategy::Signature => DownstreamMode::OnBehalfOf,
                VerificationStrategy::ClaimsOnly => DownstreamMode::PassThrough,
            },
        };

        let downstream_scopes = ScopeSet::parse(&cli.downstream_scopes.join(" "));
        if downstream == DownstreamMode::OnBehalfOf {
            if client_id.is_none() {
                return Err(ConfigError::MissingClientId("on-behalf-of exchange"));
            }
            if client_secret.is_none() {
                return Err(ConfigError::MissingClientSecret);
            }
            if downstream_scopes.is_empty() {
                return Err(ConfigError::EmptyDownstreamScopes);
            }
        }

        let verifier = VerifierConfig {
            strategy,
            audience,
            issuers,
            required_scopes,
            scope_namespace,
            normalize_scopes,
            allow_unverified_signatures: cli.allow_unverified_signatures,
            diagnostics: cli.diagnostics,
        };

        Ok(Self {
            tenant_id,
            authority,
            client_id,
            client_secret,
            base_url,
            host: cli.host.clone(),
            port: cli.port,
            resource_name: cli.resource_name.clone(),
            verifier,
            downstream,
            downstream_base_url,
            downstream_scopes,
            http_timeout: Duration::from_secs(cli.http_timeout_secs),
        })
    }

    /// Socket address string to bind
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Authorization server advertised to clients
    pub fn authorization_server(&self) -> String {
        format!("{}/{}/v2.0", self.authority, self.tenant_id)
    }

    /// Absolute URL of the protected resource metadata document
    pub fn resource_metadata_url(&self) -> String {
        format!("{}{}", self.base_url, PROTECTED_RESOURCE_PATH)
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_url(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid_url(field, value, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_url(field, value, "scheme must be http or https"));
    }
    Ok(value.trim_end_matches('/').to_string())
}
