use super::{Attempt, AuthStrategy, LoginEnv};
use crate::client::VaultClient;
use crate::config::{AuthConfig, IamConfig, Mechanism};
use crate::AuthError;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const DEFAULT_ACCESS_KEY_ID_KEY: &str = "access-key";
const DEFAULT_SECRET_ACCESS_KEY_KEY: &str = "secret-access-key";
const DEFAULT_SESSION_TOKEN_KEY: &str = "session-token";
const STS_AUDIENCE: &str = "sts.amazonaws.com";
const WEB_IDENTITY_EXPIRATION_SECONDS: i64 = 600;

/// AWS credentials the signer should use.
#[derive(Debug)]
pub enum AwsCredentialSource {
    Static {
        access_key_id: String,
        secret_access_key: SecretString,
        session_token: Option<SecretString>,
    },
    /// Service account token to exchange through `AssumeRoleWithWebIdentity`.
    WebIdentity { token: SecretString },
    /// Whatever the signer finds in its environment.
    Ambient,
}

#[derive(Debug)]
pub struct IamSigningRequest {
    pub region: String,
    /// Value for the `X-Vault-AWS-IAM-Server-ID` header, when the mount requires one.
    pub server_id: Option<String>,
    pub credentials: AwsCredentialSource,
}

/// Signed `sts:GetCallerIdentity` request, base64 fields as Vault expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamLoginPayload {
    pub iam_http_request_method: String,
    pub iam_request_url: String,
    pub iam_request_body: String,
    pub iam_request_headers: String,
}

/// Produces the signed STS request for an IAM login.
#[async_trait]
pub trait IamLoginSigner: Send + Sync {
    async fn sign(&self, request: &IamSigningRequest) -> Result<IamLoginPayload, AuthError>;
}

pub struct IamAuth;

impl IamAuth {
    async fn credentials(config: &IamConfig, env: &LoginEnv<'_>) -> Result<AwsCredentialSource, AuthError> {
        if let Some(refs) = config.secret_ref.as_ref() {
            let access_key_id = env
                .secret(&refs.access_key_id_secret_ref, DEFAULT_ACCESS_KEY_ID_KEY)
                .await?;
            let secret_access_key = env
                .secret(&refs.secret_access_key_secret_ref, DEFAULT_SECRET_ACCESS_KEY_KEY)
                .await?;
            let session_token = match refs.session_token_secret_ref.as_ref() {
                Some(selector) => Some(SecretString::new(
                    env.secret(selector, DEFAULT_SESSION_TOKEN_KEY).await?,
                )),
                None => None,
            };
            return Ok(AwsCredentialSource::Static {
                access_key_id,
                secret_access_key: SecretString::new(secret_access_key),
                session_token,
            });
        }
        if let Some(jwt) = config.jwt.as_ref() {
            let token = env
                .service_account_token(
                    &jwt.service_account_ref,
                    &[STS_AUDIENCE.to_string()],
                    WEB_IDENTITY_EXPIRATION_SECONDS,
                )
                .await?;
            return Ok(AwsCredentialSource::WebIdentity {
                token: SecretString::new(token),
            });
        }
        Ok(AwsCredentialSource::Ambient)
    }

    async fn login(client: &mut VaultClient, config: &IamConfig, env: &LoginEnv<'_>) -> Result<(), AuthError> {
        let signer = env
            .iam_signer
            .ok_or_else(|| AuthError::InvalidConfig("no IAM login signer configured".to_string()))?;

        let request = IamSigningRequest {
            region: config.region.clone(),
            server_id: config.vault_aws_iam_server_id.clone(),
            credentials: Self::credentials(config, env).await?,
        };
        let payload = signer.sign(&request).await?;

        let mut body = serde_json::to_value(&payload)?;
        body["role"] = serde_json::Value::String(config.role.clone());
        env.login(client, &config.path, None, &body).await
    }
}

#[async_trait]
impl AuthStrategy for IamAuth {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Iam
    }

    async fn try_acquire(&self, client: &mut VaultClient, auth: &AuthConfig, env: &LoginEnv<'_>) -> Attempt {
        let Some(config) = auth.iam.as_ref() else {
            return Attempt::Skipped;
        };
        let result = Self::login(client, config, env).await;
        let reference = format!("{} (role {}, region {})", config.path, config.role, config.region);
        Attempt::from_result(self.mechanism(), reference, result)
    }
}
