mod approle;
mod cert;
mod iam;
mod jwt;
mod kubernetes;
mod password;
mod token;

pub use approle::AppRoleAuth;
pub use cert::CertAuth;
pub use iam::{AwsCredentialSource, IamAuth, IamLoginPayload, IamLoginSigner, IamSigningRequest};
pub use jwt::JwtAuth;
pub use kubernetes::KubernetesAuth;
pub use password::{LdapAuth, UserPassAuth};
pub use token::TokenSecretRefAuth;

use crate::client::VaultClient;
use crate::config::{AuthConfig, Mechanism, SecretKeySelector, ServiceAccountSelector, StoreKind};
use crate::kube::{ServiceAccountTokenIssuer, ServiceAccountTokenRequest, request_service_account_token};
use crate::metrics::{CALL_LOGIN, CallObserver, PROVIDER_VAULT};
use crate::models::LoginLease;
use crate::secrets::SecretResolver;
use crate::AuthError;
use async_trait::async_trait;
use serde_json::Value;

/// Outcome of one strategy in the chain.
#[derive(Debug)]
pub enum Attempt {
    /// Mechanism not configured, try the next one.
    Skipped,
    Acquired,
    Failed(AuthError),
}

impl Attempt {
    pub(crate) fn from_result(mechanism: Mechanism, reference: String, result: Result<(), AuthError>) -> Self {
        match result {
            Ok(()) => Attempt::Acquired,
            Err(e) => Attempt::Failed(AuthError::mechanism(mechanism, reference, e)),
        }
    }
}

/// A token-acquisition strategy for one auth mechanism.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn mechanism(&self) -> Mechanism;

    /// Returns [`Attempt::Skipped`] when `auth` holds no config for this
    /// mechanism. Otherwise acquires a token into `client`.
    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt;
}

/// The chain in priority order.
pub fn default_chain() -> Vec<Box<dyn AuthStrategy>> {
    vec![
        Box::new(TokenSecretRefAuth),
        Box::new(AppRoleAuth),
        Box::new(KubernetesAuth::default()),
        Box::new(LdapAuth),
        Box::new(UserPassAuth),
        Box::new(JwtAuth),
        Box::new(CertAuth),
        Box::new(IamAuth),
    ]
}

/// Collaborators and store scope shared by every strategy of one negotiation.
pub struct LoginEnv<'a> {
    pub store_kind: StoreKind,
    /// Namespace of the resource the store belongs to.
    pub namespace: &'a str,
    pub secrets: Option<&'a dyn SecretResolver>,
    pub service_accounts: Option<&'a dyn ServiceAccountTokenIssuer>,
    pub iam_signer: Option<&'a dyn IamLoginSigner>,
    pub observer: &'a dyn CallObserver,
}

impl LoginEnv<'_> {
    pub async fn secret(&self, selector: &SecretKeySelector, default_key: &str) -> Result<String, AuthError> {
        let secrets = self
            .secrets
            .ok_or_else(|| AuthError::InvalidConfig("no secret resolver configured".to_string()))?;
        let namespace = self
            .store_kind
            .resolve_namespace(self.namespace, selector.namespace.as_deref());
        secrets
            .secret_value(namespace, &selector.name, selector.key_or(default_key))
            .await
    }

    pub async fn service_account_token(
        &self,
        selector: &ServiceAccountSelector,
        additional_audiences: &[String],
        expiration_seconds: i64,
    ) -> Result<String, AuthError> {
        let issuer = self.service_accounts.ok_or_else(|| {
            AuthError::InvalidConfig("no service account token issuer configured".to_string())
        })?;
        let request = ServiceAccountTokenRequest::new(
            selector,
            additional_audiences,
            expiration_seconds,
            self.store_kind,
            self.namespace,
        );
        request_service_account_token(issuer, &request).await
    }

    pub(crate) async fn login(
        &self,
        client: &mut VaultClient,
        mount: &str,
        suffix: Option<&str>,
        body: &Value,
    ) -> Result<(), AuthError> {
        let result = client.login(mount, suffix, body).await;
        self.observe_login(result)
    }

    pub(crate) async fn login_with_identity(
        &self,
        client: &mut VaultClient,
        mount: &str,
        identity: reqwest::Identity,
        body: &Value,
    ) -> Result<(), AuthError> {
        let result = client.login_with_identity(mount, identity, body).await;
        self.observe_login(result)
    }

    fn observe_login(&self, result: Result<LoginLease, AuthError>) -> Result<(), AuthError> {
        self.observer
            .observe(PROVIDER_VAULT, CALL_LOGIN, result.as_ref().map(|_| ()));
        let lease = result?;
        tracing::debug!(
            lease_secs = lease.lease_duration.as_secs(),
            renewable = lease.renewable,
            "Vault issued a new token"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_follows_priority() {
        let order: Vec<Mechanism> = default_chain().iter().map(|s| s.mechanism()).collect();
        assert_eq!(order, Mechanism::PRIORITY.to_vec());
    }

    #[test]
    fn test_failed_attempt_is_wrapped() {
        let attempt = Attempt::from_result(
            Mechanism::Ldap,
            "ldap (user alice)".to_string(),
            Err(AuthError::RequestError("timeout".to_string())),
        );
        match attempt {
            Attempt::Failed(AuthError::Mechanism { mechanism, reference, .. }) => {
                assert_eq!(mechanism, Mechanism::Ldap);
                assert_eq!(reference, "ldap (user alice)");
            }
            other => panic!("unexpected attempt: {:?}", other),
        }
    }
}
