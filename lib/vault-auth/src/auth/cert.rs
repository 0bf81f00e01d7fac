use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, CertConfig, Mechanism};
use crate::AuthError;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_CERT_KEY: &str = "tls.crt";
const DEFAULT_PRIVATE_KEY_KEY: &str = "tls.key";

/// TLS client certificate login.
pub struct CertAuth;

impl CertAuth {
    async fn login(client: &mut VaultClient, config: &CertConfig, env: &LoginEnv<'_>) -> Result<(), AuthError> {
        let cert = env.secret(&config.client_cert, DEFAULT_CERT_KEY).await?;
        let key = env.secret(&config.secret_ref, DEFAULT_PRIVATE_KEY_KEY).await?;

        let pem = format!("{}\n{}\n", cert.trim_end(), key.trim_end());
        let identity = reqwest::Identity::from_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidConfig(format!("invalid client certificate: {}", e)))?;

        let body = match config.role.as_deref() {
            Some(role) => json!({"name": role}),
            None => json!({}),
        };
        env.login_with_identity(client, &config.path, identity, &body)
            .await
    }
}

#[async_trait]
impl AuthStrategy for CertAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Cert
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.cert.as_ref() else {
            return Attempt::Skipped;
        };
        let result = Self::login(client, config, env).await;
        let reference = format!("{} (certificate {})", config.path, config.client_cert.name);
        Attempt::from_result(self.mechanism(), reference, result)
    }
}
