use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, KubernetesConfig, Mechanism};
use crate::AuthError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_JWT_KEY: &str = "token";
const SERVICE_ACCOUNT_TOKEN_EXPIRATION: i64 = 600;

/// Kubernetes authentication
///
/// The JWT comes from, in order: a freshly requested service account token,
/// a secret, or the token file projected into the pod.
pub struct KubernetesAuth {
    jwt_path: PathBuf,
}

impl Default for KubernetesAuth {
    fn default() -> Self {
        Self {
            jwt_path: PathBuf::from(DEFAULT_JWT_PATH),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    role: &'a str,
    jwt: &'a str,
}

impl KubernetesAuth {
    pub fn with_jwt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.jwt_path = path.into();
        self
    }

    async fn read_jwt(&self) -> Result<String, AuthError> {
        tokio::fs::read_to_string(&self.jwt_path)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| {
                AuthError::InvalidConfig(format!(
                    "failed to read JWT from {}: {}",
                    self.jwt_path.display(),
                    e
                ))
            })
    }

    async fn jwt(&self, config: &KubernetesConfig, env: &LoginEnv<'_>) -> Result<String, AuthError> {
        if let Some(service_account) = config.service_account_ref.as_ref() {
            return env
                .service_account_token(service_account, &[], SERVICE_ACCOUNT_TOKEN_EXPIRATION)
                .await;
        }
        if let Some(secret_ref) = config.secret_ref.as_ref() {
            return env.secret(secret_ref, DEFAULT_JWT_KEY).await;
        }
        self.read_jwt().await
    }

    async fn login(&self, client: &mut VaultClient, config: &KubernetesConfig, env: &LoginEnv<'_>) -> Result<(), AuthError> {
        let jwt = self.jwt(config, env).await?;
        let body = serde_json::to_value(LoginRequest {
            role: &config.role,
            jwt: &jwt,
        })?;
        env.login(client, &config.mount_path, None, &body).await
    }
}

#[async_trait]
impl AuthStrategy for KubernetesAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Kubernetes
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.kubernetes.as_ref() else {
            return Attempt::Skipped;
        };
        let result = self.login(client, config, env).await;
        let reference = match config.service_account_ref.as_ref() {
            Some(sa) => format!("{} (role {}, service account {})", config.mount_path, config.role, sa.name),
            None => format!("{} (role {})", config.mount_path, config.role),
        };
        Attempt::from_result(self.mechanism(), reference, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_jwt_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "my-jwt-token").unwrap();

        let auth = KubernetesAuth::default().with_jwt_path(file.path());

        let jwt = auth.read_jwt().await.unwrap();
        assert_eq!(jwt, "my-jwt-token");
    }

    #[tokio::test]
    async fn test_read_jwt_missing_file() {
        let auth = KubernetesAuth::default().with_jwt_path("/nonexistent/path");

        let result = auth.read_jwt().await;
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }
}
