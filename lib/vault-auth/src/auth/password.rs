use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, Mechanism, SecretKeySelector};
use crate::AuthError;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_PASSWORD_KEY: &str = "password";

/// `POST auth/<path>/login/<username>` with a password read from a secret.
async fn password_login(
    client: &mut VaultClient,
    env: &LoginEnv<'_>,
    path: &str,
    username: &str,
    secret_ref: &SecretKeySelector,
) -> Result<(), AuthError> {
    let password = env.secret(secret_ref, DEFAULT_PASSWORD_KEY).await?;
    env.login(client, path, Some(username), &json!({"password": password}))
        .await
}

pub struct LdapAuth;

#[async_trait]
impl AuthStrategy for LdapAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Ldap
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.ldap.as_ref() else {
            return Attempt::Skipped;
        };
        let result = password_login(client, env, &config.path, &config.username, &config.secret_ref).await;
        Attempt::from_result(
            self.mechanism(),
            format!("{} (user {})", config.path, config.username),
            result,
        )
    }
}

pub struct UserPassAuth;

#[async_trait]
impl AuthStrategy for UserPassAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::UserPass
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.user_pass.as_ref() else {
            return Attempt::Skipped;
        };
        let result = password_login(client, env, &config.path, &config.username, &config.secret_ref).await;
        Attempt::from_result(
            self.mechanism(),
            format!("{} (user {})", config.path, config.username),
            result,
        )
    }
}
