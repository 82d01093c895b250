//! Startup, serving and shutdown

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use graphgate_auth::{
    ClientCredentials, IdentityMetadata, MetadataLoader, OnBehalfOfExchange, SharedHttpClient,
};

use crate::cli::Cli;
use crate::config::{DownstreamMode, GatewayConfig};
use crate::downstream::{DownstreamClient, DownstreamCredentials};
use crate::error::{ConfigError, GatewayResult};
use crate::server::{self, AppState, ProtectedResourceMetadata};
use crate::tools::ToolRunner;

/// Resolve configuration, load provider metadata and serve until shutdown
///
/// # Errors
///
/// Returns [`GatewayError`](crate::GatewayError) for invalid configuration,
/// unavailable provider metadata or a listener failure. All are fatal.
pub async fn run(cli: &Cli) -> GatewayResult<()> {
    let config = GatewayConfig::from_cli(cli)?;
    let http = SharedHttpClient::new(config.http_timeout);

    let result = serve(&config, &http).await;

    if http.close() {
        info!("Shared HTTP client released");
    }
    result
}

async fn serve(config: &GatewayConfig, http: &SharedHttpClient) -> GatewayResult<()> {
    let metadata = MetadataLoader::new(http.clone(), &config.authority)?
        .load(&config.tenant_id)
        .await?;

    let app = build_router(config, &metadata, http)?;

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        strategy = %config.verifier.strategy,
        downstream = ?config.downstream,
        resource_metadata = %config.resource_metadata_url(),
        "Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Assemble verifier, credentials and tools into a router
///
/// # Errors
///
/// Returns [`ConfigError`] when the verifier cannot be built from `config`
/// or on-behalf-of credentials are incomplete.
pub fn build_router(
    config: &GatewayConfig,
    metadata: &IdentityMetadata,
    http: &SharedHttpClient,
) -> Result<Router, ConfigError> {
    let verifier = config.verifier.build(metadata, http)?;

    let credentials = match config.downstream {
        DownstreamMode::PassThrough => DownstreamCredentials::PassThrough,
        DownstreamMode::OnBehalfOf => {
            let client_id = config
                .client_id
                .clone()
                .ok_or(ConfigError::MissingClientId("on-behalf-of exchange"))?;
            let client_secret = config
                .client_secret
                .clone()
                .ok_or(ConfigError::MissingClientSecret)?;
            DownstreamCredentials::OnBehalfOf {
                exchange: OnBehalfOfExchange::from_metadata(
                    metadata,
                    ClientCredentials::new(client_id, client_secret),
                    http.clone(),
                ),
                scopes: config.downstream_scopes.clone(),
            }
        }
    };

    let downstream = DownstreamClient::new(&config.downstream_base_url, http.clone());
    let state = AppState::new(
        verifier,
        ToolRunner::new(downstream, credentials),
        ProtectedResourceMetadata::from_config(config),
        config.resource_metadata_url(),
    );

    Ok(server::router(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received, initiating shutdown");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
