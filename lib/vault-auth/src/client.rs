use crate::error::AuthError;
use crate::models::LoginLease;
use crate::validator::SelfLookup;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

pub struct VaultClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    namespace: Option<String>,
    application_name: Option<String>,
    request_timeout: Duration,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            namespace: None,
            application_name: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Upper bound for every backend call made through the client.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<VaultClient, AuthError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("VAULT_ADDR").ok())
            .ok_or(AuthError::VaultNotDetected)?;

        let namespace = self
            .namespace
            .or_else(|| std::env::var("VAULT_NAMESPACE").ok())
            .unwrap_or_default();

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AuthError::RequestError(e.to_string()))?;

        Ok(VaultClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace,
            token: self.token.filter(|t| !t.is_empty()).map(SecretString::new),
            application_name: self.application_name,
            request_timeout: self.request_timeout,
            http,
        })
    }
}

/// Session handle towards one Vault server.
///
/// Holds the credential and the active namespace. Callers own the client
/// exclusively (`&mut`) for the duration of an auth negotiation.
pub struct VaultClient {
    base_url: String,
    namespace: String,
    token: Option<SecretString>,
    application_name: Option<String>,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl VaultClient {
    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active namespace, empty when requests go to the root namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret().as_str())
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.token = if token.is_empty() {
            None
        } else {
            Some(SecretString::new(token))
        };
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if !self.namespace.is_empty() {
            request = request.header(NAMESPACE_HEADER, &self.namespace);
        }
        if let Some(ref app_name) = self.application_name {
            request = request.header("User-Agent", app_name);
        }
        request
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.decorate(self.http.request(method, self.url(path)));
        if let Some(ref token) = self.token {
            request = request.header(TOKEN_HEADER, token.expose_secret());
        }
        request
    }

    /// `POST auth/token/revoke-self` for the held token.
    pub async fn revoke_self(&self) -> Result<(), AuthError> {
        let response = self
            .request(Method::POST, "auth/token/revoke-self")
            .send()
            .await
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        error_for_status(response).await?;
        Ok(())
    }

    /// Logs in at `auth/<mount>/login[/<suffix>]` and stores the issued token.
    pub async fn login(
        &mut self,
        mount: &str,
        suffix: Option<&str>,
        body: &Value,
    ) -> Result<LoginLease, AuthError> {
        let http = self.http.clone();
        self.login_via(&http, mount, suffix, body).await
    }

    /// Same as [`login`](Self::login) but presents a TLS client certificate.
    pub async fn login_with_identity(
        &mut self,
        mount: &str,
        identity: reqwest::Identity,
        body: &Value,
    ) -> Result<LoginLease, AuthError> {
        let http = reqwest::Client::builder()
            .identity(identity)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        self.login_via(&http, mount, None, body).await
    }

    async fn login_via(
        &mut self,
        http: &reqwest::Client,
        mount: &str,
        suffix: Option<&str>,
        body: &Value,
    ) -> Result<LoginLease, AuthError> {
        let mount = mount.trim_matches('/');
        let path = match suffix {
            Some(suffix) => format!("auth/{}/login/{}", mount, suffix),
            None => format!("auth/{}/login", mount),
        };

        let response = self
            .decorate(http.post(self.url(&path)))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        let response = error_for_status(response).await?;

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            auth: Option<AuthData>,
        }
        #[derive(serde::Deserialize)]
        struct AuthData {
            client_token: String,
            #[serde(default)]
            lease_duration: u64,
            #[serde(default)]
            renewable: bool,
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("invalid login response: {}", e)))?;
        let auth = login
            .auth
            .filter(|a| !a.client_token.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("login response carries no token".to_string()))?;

        self.set_token(auth.client_token);
        Ok(LoginLease {
            lease_duration: Duration::from_secs(auth.lease_duration),
            renewable: auth.renewable,
        })
    }
}

#[async_trait]
impl SelfLookup for VaultClient {
    async fn lookup_self(&self) -> Result<Option<Map<String, Value>>, AuthError> {
        let response = self
            .request(Method::GET, "auth/token/lookup-self")
            .send()
            .await
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        let response = error_for_status(response).await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        #[derive(serde::Deserialize)]
        struct LookupResponse {
            #[serde(default)]
            data: Option<Map<String, Value>>,
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("invalid lookup response: {}", e)))?;
        Ok(lookup.data)
    }
}

async fn error_for_status(response: Response) -> Result<Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(AuthError::ClientError { status, message })
}
