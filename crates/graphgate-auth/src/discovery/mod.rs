//! # Identity Provider Discovery
//!
//! Loads the OpenID Connect discovery document of a tenant once at startup.
//! The document supplies the three values the core needs:
//!
//! - `issuer` - expected `iss` of signature-verified tokens
//! - `jwks_uri` - where signing keys are published
//! - `token_endpoint` - where the on-behalf-of exchange is posted
//!
//! A load failure is fatal; the gateway must not serve requests without it.

mod loader;
mod types;

pub use loader::{DEFAULT_AUTHORITY, DISCOVERY_PATH, MetadataLoader};
pub use types::IdentityMetadata;
