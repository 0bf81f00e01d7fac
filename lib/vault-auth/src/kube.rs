//! Short-lived service account tokens from the Kubernetes TokenRequest API.

use crate::AuthError;
use crate::config::{ServiceAccountSelector, StoreKind};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const IN_CLUSTER_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const IN_CLUSTER_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Input for one token request. Built fresh per attempt and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountTokenRequest {
    pub service_account: String,
    pub namespace: String,
    pub audiences: Vec<String>,
    pub expiration_seconds: i64,
}

impl ServiceAccountTokenRequest {
    /// Audiences are the selector's own plus `additional_audiences`, without
    /// duplicates. Cluster stores honour the selector's namespace.
    pub fn new(
        selector: &ServiceAccountSelector,
        additional_audiences: &[String],
        expiration_seconds: i64,
        store_kind: StoreKind,
        ambient_namespace: &str,
    ) -> Self {
        let mut audiences: Vec<String> = Vec::new();
        for audience in selector.audiences.iter().chain(additional_audiences) {
            if !audiences.contains(audience) {
                audiences.push(audience.clone());
            }
        }

        Self {
            service_account: selector.name.clone(),
            namespace: store_kind
                .resolve_namespace(ambient_namespace, selector.namespace.as_deref())
                .to_string(),
            audiences,
            expiration_seconds,
        }
    }
}

#[async_trait]
pub trait ServiceAccountTokenIssuer: Send + Sync {
    async fn create_token(&self, request: &ServiceAccountTokenRequest) -> Result<String, AuthError>;
}

/// Issues the request and wraps any failure with the service account name.
pub async fn request_service_account_token(
    issuer: &dyn ServiceAccountTokenIssuer,
    request: &ServiceAccountTokenRequest,
) -> Result<String, AuthError> {
    issuer
        .create_token(request)
        .await
        .map_err(|e| AuthError::ServiceAccountToken {
            name: request.service_account.clone(),
            message: e.to_string(),
        })
}

/// TokenRequest client talking to the Kubernetes API server.
pub struct KubeTokenIssuer {
    api_url: String,
    bearer_token: SecretString,
    http: reqwest::Client,
}

impl KubeTokenIssuer {
    pub fn new(api_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        Ok(Self::with_http(api_url, bearer_token, http))
    }

    fn with_http(api_url: impl Into<String>, bearer_token: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bearer_token: SecretString::new(bearer_token.into()),
            http,
        }
    }

    /// Uses the pod's own service account and the cluster CA.
    pub fn in_cluster() -> Result<Self, AuthError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            AuthError::InvalidConfig("KUBERNETES_SERVICE_HOST not set".to_string())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        let token = std::fs::read_to_string(IN_CLUSTER_TOKEN_PATH)?;
        let ca = std::fs::read(IN_CLUSTER_CA_PATH)?;
        let ca = reqwest::Certificate::from_pem(&ca)
            .map_err(|e| AuthError::InvalidConfig(format!("invalid cluster CA: {}", e)))?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .build()
            .map_err(|e| AuthError::RequestError(e.to_string()))?;

        Ok(Self::with_http(
            format!("https://{}:{}", host, port),
            token.trim().to_string(),
            http,
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestBody<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: TokenRequestSpec<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestSpec<'a> {
    audiences: &'a [String],
    expiration_seconds: i64,
}

#[derive(Deserialize)]
struct TokenRequestResponse {
    status: TokenRequestStatus,
}

#[derive(Deserialize)]
struct TokenRequestStatus {
    token: String,
}

#[async_trait]
impl ServiceAccountTokenIssuer for KubeTokenIssuer {
    async fn create_token(&self, request: &ServiceAccountTokenRequest) -> Result<String, AuthError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/serviceaccounts/{}/token",
            self.api_url, request.namespace, request.service_account
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bearer_token.expose_secret())
            .json(&TokenRequestBody {
                api_version: "authentication.k8s.io/v1",
                kind: "TokenRequest",
                spec: TokenRequestSpec {
                    audiences: &request.audiences,
                    expiration_seconds: request.expiration_seconds,
                },
            })
            .send()
            .await
            .map_err(|e| AuthError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::ClientError { status, message });
        }

        let body: TokenRequestResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("invalid TokenRequest response: {}", e)))?;
        Ok(body.status.token)
    }
}
