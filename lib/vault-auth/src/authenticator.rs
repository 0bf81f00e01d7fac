use crate::auth::{Attempt, AuthStrategy, IamLoginSigner, LoginEnv, default_chain};
use crate::client::VaultClient;
use crate::config::{ProviderConfig, StoreKind};
use crate::error::AuthError;
use crate::kube::ServiceAccountTokenIssuer;
use crate::metrics::{CALL_REVOKE_SELF, CallObserver, PROVIDER_VAULT, TracingObserver};
use crate::namespace::NamespaceScope;
use crate::secrets::SecretResolver;
use crate::validator::check_token;
use std::sync::Arc;

pub struct AuthenticatorBuilder {
    chain: Option<Vec<Box<dyn AuthStrategy>>>,
    store_kind: StoreKind,
    namespace: String,
    secrets: Option<Arc<dyn SecretResolver>>,
    service_accounts: Option<Arc<dyn ServiceAccountTokenIssuer>>,
    iam_signer: Option<Arc<dyn IamLoginSigner>>,
    observer: Option<Arc<dyn CallObserver>>,
}

impl AuthenticatorBuilder {
    fn new() -> Self {
        Self {
            chain: None,
            store_kind: StoreKind::default(),
            namespace: String::new(),
            secrets: None,
            service_accounts: None,
            iam_signer: None,
            observer: None,
        }
    }

    /// Replaces the default chain. Strategies run in the given order.
    pub fn chain(mut self, chain: Vec<Box<dyn AuthStrategy>>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn store_kind(mut self, kind: StoreKind) -> Self {
        self.store_kind = kind;
        self
    }

    /// Namespace of the resource owning the store.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn secrets(mut self, secrets: Arc<dyn SecretResolver>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn service_accounts(mut self, issuer: Arc<dyn ServiceAccountTokenIssuer>) -> Self {
        self.service_accounts = Some(issuer);
        self
    }

    pub fn iam_signer(mut self, signer: Arc<dyn IamLoginSigner>) -> Self {
        self.iam_signer = Some(signer);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Authenticator {
        Authenticator {
            chain: self.chain.unwrap_or_else(default_chain),
            store_kind: self.store_kind,
            namespace: self.namespace,
            secrets: self.secrets,
            service_accounts: self.service_accounts,
            iam_signer: self.iam_signer,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
        }
    }
}

/// Negotiates and tears down the credential of a [`VaultClient`].
///
/// Holds no session state of its own; one authenticator can serve many
/// clients as long as each client is driven by a single task.
pub struct Authenticator {
    chain: Vec<Box<dyn AuthStrategy>>,
    store_kind: StoreKind,
    namespace: String,
    secrets: Option<Arc<dyn SecretResolver>>,
    service_accounts: Option<Arc<dyn ServiceAccountTokenIssuer>>,
    iam_signer: Option<Arc<dyn IamLoginSigner>>,
    observer: Arc<dyn CallObserver>,
}

impl Authenticator {
    pub fn builder() -> AuthenticatorBuilder {
        AuthenticatorBuilder::new()
    }

    fn login_env(&self) -> LoginEnv<'_> {
        LoginEnv {
            store_kind: self.store_kind,
            namespace: &self.namespace,
            secrets: self.secrets.as_deref(),
            service_accounts: self.service_accounts.as_deref(),
            iam_signer: self.iam_signer.as_deref(),
            observer: self.observer.as_ref(),
        }
    }

    /// Makes sure `client` holds a usable token.
    ///
    /// Reuses a held token when it passes validation, otherwise walks the
    /// chain and returns the outcome of the first configured mechanism.
    /// Nothing is retried here.
    pub async fn ensure_authenticated(
        &self,
        client: &mut VaultClient,
        provider: &ProviderConfig,
    ) -> Result<(), AuthError> {
        let Some(auth) = provider.auth.as_ref() else {
            return Ok(());
        };

        if let Some(namespace) = provider.namespace.as_deref() {
            client.set_namespace(namespace);
        }

        let mut scope = NamespaceScope::enter(client, provider.namespace.as_deref(), auth.namespace.as_deref());

        if scope.has_token() {
            match check_token(&*scope, self.observer.as_ref()).await {
                Ok(true) => {
                    tracing::debug!("Re-using existing token");
                    return Ok(());
                }
                Ok(false) => tracing::debug!("Existing token can not be reused"),
                Err(e) => tracing::warn!(error = %e, "Existing token could not be validated"),
            }
        }

        tracing::debug!(
            mechanism = ?auth.selected(),
            namespace = scope.namespace(),
            auth_namespace = scope.is_switched(),
            "Negotiating Vault token"
        );
        let env = self.login_env();
        for strategy in &self.chain {
            match strategy.try_acquire(&mut scope, auth, &env).await {
                Attempt::Skipped => continue,
                Attempt::Acquired => {
                    tracing::info!(mechanism = %strategy.mechanism(), "Retrieved new token");
                    return Ok(());
                }
                Attempt::Failed(e) => {
                    tracing::warn!(mechanism = %strategy.mechanism(), error = %e, "Vault login failed");
                    return Err(e);
                }
            }
        }

        Err(AuthError::NoAuthMethodConfigured)
    }

    /// Revokes the held token if it is still valid and forgets it.
    ///
    /// An absent or already unusable token is not an error.
    pub async fn revoke_if_valid(&self, client: &mut VaultClient) -> Result<(), AuthError> {
        if !client.has_token() {
            return Ok(());
        }

        let valid = check_token(&*client, self.observer.as_ref())
            .await
            .map_err(|e| AuthError::Revocation(Box::new(e)))?;
        if !valid {
            tracing::debug!("Token is no longer valid, nothing to revoke");
            return Ok(());
        }

        let result = client.revoke_self().await;
        self.observer
            .observe(PROVIDER_VAULT, CALL_REVOKE_SELF, result.as_ref().map(|_| ()));
        result.map_err(|e| AuthError::Revocation(Box::new(e)))?;

        client.clear_token();
        tracing::info!("Revoked Vault token");
        Ok(())
    }
}
