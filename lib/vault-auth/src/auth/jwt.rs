use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, JwtConfig, Mechanism};
use crate::AuthError;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_JWT_KEY: &str = "jwt";
const DEFAULT_AUDIENCE: &str = "vault";
const DEFAULT_EXPIRATION_SECONDS: i64 = 600;

/// JWT/OIDC role login with a JWT from a secret or a minted service account token.
pub struct JwtAuth;

impl JwtAuth {
    async fn jwt(config: &JwtConfig, env: &LoginEnv<'_>) -> Result<String, AuthError> {
        if let Some(secret_ref) = config.secret_ref.as_ref() {
            return env.secret(secret_ref, DEFAULT_JWT_KEY).await;
        }
        if let Some(source) = config.kubernetes_service_account_token.as_ref() {
            let audiences = source
                .audiences
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_AUDIENCE.to_string()]);
            let expiration = source.expiration_seconds.unwrap_or(DEFAULT_EXPIRATION_SECONDS);
            return env
                .service_account_token(&source.service_account_ref, &audiences, expiration)
                .await;
        }
        Err(AuthError::InvalidConfig(
            "JWT auth requires secretRef or kubernetesServiceAccountToken".to_string(),
        ))
    }

    async fn login(client: &mut VaultClient, config: &JwtConfig, env: &LoginEnv<'_>) -> Result<(), AuthError> {
        let jwt = Self::jwt(config, env).await?;
        let role = config.role.as_deref().unwrap_or_default();
        env.login(client, &config.path, None, &json!({"role": role, "jwt": jwt}))
            .await
    }
}

#[async_trait]
impl AuthStrategy for JwtAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Jwt
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.jwt.as_ref() else {
            return Attempt::Skipped;
        };
        let result = Self::login(client, config, env).await;
        let reference = format!(
            "{} (role {})",
            config.path,
            config.role.as_deref().unwrap_or("default")
        );
        Attempt::from_result(self.mechanism(), reference, result)
    }
}
