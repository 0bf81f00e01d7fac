//! Operator-facing configuration for a Vault provider and its auth mechanism.
//!
//! The shape follows the store resource operators write: an optional
//! operating namespace and an `auth` block with one mechanism sub-config.
//! Upstream validation is trusted to allow at most one mechanism.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Auth mechanisms in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    TokenSecretRef,
    AppRole,
    Kubernetes,
    Ldap,
    UserPass,
    Jwt,
    Cert,
    Iam,
}

impl Mechanism {
    /// Fixed priority. When several sub-configs are present the first one wins.
    pub const PRIORITY: [Mechanism; 8] = [
        Mechanism::TokenSecretRef,
        Mechanism::AppRole,
        Mechanism::Kubernetes,
        Mechanism::Ldap,
        Mechanism::UserPass,
        Mechanism::Jwt,
        Mechanism::Cert,
        Mechanism::Iam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::TokenSecretRef => "token",
            Mechanism::AppRole => "AppRole",
            Mechanism::Kubernetes => "Kubernetes",
            Mechanism::Ldap => "LDAP",
            Mechanism::UserPass => "userPass",
            Mechanism::Jwt => "JWT",
            Mechanism::Cert => "certificate",
            Mechanism::Iam => "IAM",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of the store owning the configuration. Cluster-scoped stores may
/// point references at other namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    #[default]
    SecretStore,
    ClusterSecretStore,
}

impl StoreKind {
    /// Namespace a reference resolves in: the reference's own namespace for
    /// cluster stores, the ambient namespace otherwise.
    pub fn resolve_namespace<'a>(&self, ambient: &'a str, reference: Option<&'a str>) -> &'a str {
        match (self, reference) {
            (StoreKind::ClusterSecretStore, Some(namespace)) => namespace,
            _ => ambient,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Vault address. Falls back to `VAULT_ADDR` when absent.
    #[serde(default)]
    pub server: Option<String>,
    /// Operating namespace used for every non-auth call.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Namespace to log in under when it differs from the operating one.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub token_secret_ref: Option<SecretKeySelector>,
    #[serde(default)]
    pub app_role: Option<AppRoleConfig>,
    #[serde(default)]
    pub kubernetes: Option<KubernetesConfig>,
    #[serde(default)]
    pub ldap: Option<LdapConfig>,
    #[serde(default)]
    pub user_pass: Option<UserPassConfig>,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
    #[serde(default)]
    pub cert: Option<CertConfig>,
    #[serde(default)]
    pub iam: Option<IamConfig>,
}

impl AuthConfig {
    pub fn is_configured(&self, mechanism: Mechanism) -> bool {
        match mechanism {
            Mechanism::TokenSecretRef => self.token_secret_ref.is_some(),
            Mechanism::AppRole => self.app_role.is_some(),
            Mechanism::Kubernetes => self.kubernetes.is_some(),
            Mechanism::Ldap => self.ldap.is_some(),
            Mechanism::UserPass => self.user_pass.is_some(),
            Mechanism::Jwt => self.jwt.is_some(),
            Mechanism::Cert => self.cert.is_some(),
            Mechanism::Iam => self.iam.is_some(),
        }
    }

    /// Populated mechanisms in priority order.
    pub fn configured(&self) -> Vec<Mechanism> {
        Mechanism::PRIORITY
            .into_iter()
            .filter(|m| self.is_configured(*m))
            .collect()
    }

    /// The mechanism that negotiation will use, if any.
    pub fn selected(&self) -> Option<Mechanism> {
        self.configured().into_iter().next()
    }
}

/// Reference to one key of a Kubernetes secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl SecretKeySelector {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            key: Some(key.into()),
        }
    }

    pub fn key_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.key.as_deref().unwrap_or(default)
    }
}

/// Reference to a Kubernetes service account identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSelector {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleConfig {
    #[serde(default = "default_approle_path")]
    pub path: String,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub role_ref: Option<SecretKeySelector>,
    pub secret_ref: SecretKeySelector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    #[serde(default = "default_kubernetes_path")]
    pub mount_path: String,
    pub role: String,
    #[serde(default)]
    pub service_account_ref: Option<ServiceAccountSelector>,
    #[serde(default)]
    pub secret_ref: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig {
    #[serde(default = "default_ldap_path")]
    pub path: String,
    pub username: String,
    pub secret_ref: SecretKeySelector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPassConfig {
    #[serde(default = "default_userpass_path")]
    pub path: String,
    pub username: String,
    pub secret_ref: SecretKeySelector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfig {
    #[serde(default = "default_jwt_path")]
    pub path: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub secret_ref: Option<SecretKeySelector>,
    #[serde(default)]
    pub kubernetes_service_account_token: Option<ServiceAccountTokenSource>,
}

/// Service account token minted on demand for JWT auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountTokenSource {
    pub service_account_ref: ServiceAccountSelector,
    #[serde(default)]
    pub audiences: Option<Vec<String>>,
    #[serde(default)]
    pub expiration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertConfig {
    #[serde(default = "default_cert_path")]
    pub path: String,
    /// Name of the certificate role to log in against.
    #[serde(default)]
    pub role: Option<String>,
    pub client_cert: SecretKeySelector,
    /// Private key matching `client_cert`.
    pub secret_ref: SecretKeySelector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamConfig {
    #[serde(default = "default_iam_path")]
    pub path: String,
    pub region: String,
    /// Vault role to log in as.
    pub role: String,
    #[serde(default)]
    pub vault_aws_iam_server_id: Option<String>,
    #[serde(default)]
    pub secret_ref: Option<AwsCredentialRefs>,
    #[serde(default)]
    pub jwt: Option<IamJwtSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentialRefs {
    pub access_key_id_secret_ref: SecretKeySelector,
    pub secret_access_key_secret_ref: SecretKeySelector,
    #[serde(default)]
    pub session_token_secret_ref: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamJwtSource {
    pub service_account_ref: ServiceAccountSelector,
}

fn default_approle_path() -> String {
    "approle".to_string()
}

fn default_kubernetes_path() -> String {
    "kubernetes".to_string()
}

fn default_ldap_path() -> String {
    "ldap".to_string()
}

fn default_userpass_path() -> String {
    "userpass".to_string()
}

fn default_jwt_path() -> String {
    "jwt".to_string()
}

fn default_cert_path() -> String {
    "cert".to_string()
}

fn default_iam_path() -> String {
    "aws".to_string()
}
