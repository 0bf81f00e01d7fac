use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AppRoleConfig, AuthConfig, Mechanism};
use crate::AuthError;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_ROLE_ID_KEY: &str = "role_id";
const DEFAULT_SECRET_ID_KEY: &str = "secret_id";

pub struct AppRoleAuth;

impl AppRoleAuth {
    async fn login(client: &mut VaultClient, config: &AppRoleConfig, env: &LoginEnv<'_>) -> Result<(), AuthError> {
        let role_id = match (config.role_id.as_deref(), config.role_ref.as_ref()) {
            (Some(role_id), _) if !role_id.is_empty() => role_id.to_string(),
            (_, Some(role_ref)) => env.secret(role_ref, DEFAULT_ROLE_ID_KEY).await?,
            _ => {
                return Err(AuthError::InvalidConfig(
                    "AppRole auth requires roleId or roleRef".to_string(),
                ));
            }
        };
        let secret_id = env.secret(&config.secret_ref, DEFAULT_SECRET_ID_KEY).await?;

        env.login(
            client,
            &config.path,
            None,
            &json!({"role_id": role_id, "secret_id": secret_id}),
        )
        .await
    }

    fn reference(config: &AppRoleConfig) -> String {
        match (config.role_id.as_deref(), config.role_ref.as_ref()) {
            (Some(role_id), _) if !role_id.is_empty() => format!("{} (role id {})", config.path, role_id),
            (_, Some(role_ref)) => format!("{} (role id from secret {})", config.path, role_ref.name),
            _ => config.path.clone(),
        }
    }
}

#[async_trait]
impl AuthStrategy for AppRoleAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::AppRole
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.app_role.as_ref() else {
            return Attempt::Skipped;
        };
        let result = Self::login(client, config, env).await;
        Attempt::from_result(self.mechanism(), Self::reference(config), result)
    }
}
