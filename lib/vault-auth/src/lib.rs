//! vault-auth - Vault authentication negotiation and token lifecycle
//!
//! Picks the configured auth mechanism in a fixed priority order:
//! 1. token from a secret
//! 2. AppRole
//! 3. Kubernetes
//! 4. LDAP
//! 5. username/password
//! 6. JWT
//! 7. TLS certificate
//! 8. AWS IAM
//!
//! A held token is reused while it is valid, and revoked on teardown.

pub mod auth;
mod authenticator;
mod client;
pub mod config;
mod error;
pub mod kube;
pub mod metrics;
mod models;
mod namespace;
pub mod secrets;
mod validator;

pub use authenticator::{Authenticator, AuthenticatorBuilder};
pub use client::{VaultClient, VaultClientBuilder};
pub use config::{AuthConfig, Mechanism, ProviderConfig, StoreKind};
pub use error::AuthError;
pub use models::{BATCH_TOKEN_TYPE, EXPIRY_BUFFER_SECONDS, LoginLease, TokenIntrospection};
pub use namespace::NamespaceScope;
pub use validator::{SelfLookup, check_token};
