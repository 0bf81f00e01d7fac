use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, Mechanism, SecretKeySelector};
use crate::AuthError;
use async_trait::async_trait;

const DEFAULT_TOKEN_KEY: &str = "token";

/// Static token read from a secret. No login call is made.
pub struct TokenSecretRefAuth;

impl TokenSecretRefAuth {
    async fn set_token(
        client: &mut VaultClient,
        selector: &SecretKeySelector,
        env: &LoginEnv<'_>,
    ) -> Result<(), AuthError> {
        let token = env.secret(selector, DEFAULT_TOKEN_KEY).await?;
        if token.is_empty() {
            return Err(AuthError::InvalidConfig(format!(
                "secret {} holds an empty token",
                selector.name
            )));
        }
        client.set_token(token);
        Ok(())
    }
}

#[async_trait]
impl AuthStrategy for TokenSecretRefAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::TokenSecretRef
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(selector) = auth.token_secret_ref.as_ref() else {
            return Attempt::Skipped;
        };
        let result = Self::set_token(client, selector, env).await;
        Attempt::from_result(self.mechanism(), format!("secret {}", selector.name), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopObserver;
    use crate::secrets::StaticSecretResolver;
    use crate::config::StoreKind;

    fn client() -> VaultClient {
        VaultClient::builder().base_url("http://vault:8200").build().unwrap()
    }

    #[tokio::test]
    async fn test_static_token_from_secret() {
        let secrets = StaticSecretResolver::new().with_secret("team-a", "vault-token", "token", "s.static");
        let env = LoginEnv {
            store_kind: StoreKind::SecretStore,
            namespace: "team-a",
            secrets: Some(&secrets),
            service_accounts: None,
            iam_signer: None,
            observer: &NoopObserver,
        };
        let auth = AuthConfig {
            token_secret_ref: Some(SecretKeySelector {
                name: "vault-token".to_string(),
                namespace: None,
                key: None,
            }),
            ..Default::default()
        };

        let mut client = client();
        let attempt = TokenSecretRefAuth.try_acquire(&mut client, &auth, &env).await;
        assert!(matches!(attempt, Attempt::Acquired));
        assert_eq!(client.token(), Some("s.static"));
    }

    #[tokio::test]
    async fn test_skipped_without_secret_ref() {
        let env = LoginEnv {
            store_kind: StoreKind::SecretStore,
            namespace: "team-a",
            secrets: None,
            service_accounts: None,
            iam_signer: None,
            observer: &NoopObserver,
        };
        let mut client = client();
        let attempt = TokenSecretRefAuth
            .try_acquire(&mut client, &AuthConfig::default(), &env)
            .await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert!(!client.has_token());
    }
}
