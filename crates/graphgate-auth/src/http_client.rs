//! Shared HTTP client handle
//!
//! One `reqwest::Client` serves discovery, key set, token endpoint and
//! downstream API calls. The handle is cheap to clone and is injected into
//! every component that performs outbound I/O.
//!
//! ## Lifecycle
//!
//! - The client is built on the first [`SharedHttpClient::get`] call, guarded
//!   by a `OnceLock`. Nothing else is mutated afterwards, so no lock is held on
//!   the request path.
//! - [`SharedHttpClient::close`] releases the handle. Only the first call
//!   returns `true`; every later `get` fails with [`HttpClientError::Closed`].
//!
//! ## Security Configuration
//!
//! - Redirects disabled (token and discovery endpoints must answer directly)
//! - Every call bounded by the configured timeout
//! - rustls for TLS

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::{Host, Url};

/// Default upper bound for a single outbound call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client errors
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The handle was released at shutdown
    #[error("HTTP client has been closed")]
    Closed,

    /// Client construction failed (TLS backend initialization)
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug)]
struct Inner {
    timeout: Duration,
    client: OnceLock<reqwest::Client>,
    closed: AtomicBool,
}

/// Lazily constructed, concurrency-safe HTTP client handle
#[derive(Debug, Clone)]
pub struct SharedHttpClient {
    inner: Arc<Inner>,
}

impl SharedHttpClient {
    /// Create a handle; no client is built until first use
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                timeout,
                client: OnceLock::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the client, building it on first use
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::Closed`] after [`close`](Self::close), or
    /// [`HttpClientError::Build`] if the client cannot be constructed.
    pub fn get(&self) -> Result<reqwest::Client, HttpClientError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(HttpClientError::Closed);
        }

        if let Some(client) = self.inner.client.get() {
            return Ok(client.clone());
        }

        let built = reqwest::Client::builder()
            .timeout(self.inner.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("graphgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // A concurrent first call may have won the race; its client is kept
        let client = self.inner.client.get_or_init(|| built);
        debug!(timeout_ms = self.inner.timeout.as_millis(), "Shared HTTP client constructed");
        Ok(client.clone())
    }

    /// Release the handle. Returns `true` only for the call that released it.
    pub fn close(&self) -> bool {
        let released = !self.inner.closed.swap(true, Ordering::AcqRel);
        if released {
            info!(
                initialized = self.inner.client.get().is_some(),
                "Shared HTTP client released"
            );
        }
        released
    }

    /// Whether the client has been built
    pub fn is_initialized(&self) -> bool {
        self.inner.client.get().is_some()
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Configured per-call timeout
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

impl Default for SharedHttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// HTTPS, or plain HTTP to a loopback host (local development and tests)
pub fn is_secure_or_loopback(url: &Url) -> bool {
    match url.scheme() {
        "https" => true,
        "http" => match url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    }
}
