use std::env;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use vault_auth::kube::KubeTokenIssuer;
use vault_auth::secrets::FileSecretResolver;
use vault_auth::{Authenticator, ProviderConfig, StoreKind, VaultClient};

const DEFAULT_SECRETS_DIR: &str = "/etc/vault-auth/secrets";
const DEFAULT_AUTH_INTERVAL: Duration = Duration::from_secs(60);

pub struct Settings {
    pub provider: ProviderConfig,
    pub store_kind: StoreKind,
    pub namespace: String,
    pub secrets_dir: String,
    pub auth_interval: Duration,
}

pub fn load() -> Result<Settings, Box<dyn Error>> {
    let path = env::var("VAULT_AUTH_CONFIG").map_err(|_| "VAULT_AUTH_CONFIG not set")?;
    let provider: ProviderConfig = serde_json::from_str(&std::fs::read_to_string(&path)?)?;

    let store_kind = match env::var("STORE_KIND").as_deref() {
        Ok("ClusterSecretStore") => StoreKind::ClusterSecretStore,
        _ => StoreKind::SecretStore,
    };

    let auth_interval = env::var("AUTH_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_AUTH_INTERVAL);

    Ok(Settings {
        provider,
        store_kind,
        namespace: env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string()),
        secrets_dir: env::var("SECRETS_DIR").unwrap_or_else(|_| DEFAULT_SECRETS_DIR.to_string()),
        auth_interval,
    })
}

pub fn client(settings: &Settings) -> Result<VaultClient, Box<dyn Error>> {
    let mut builder = VaultClient::builder().application_name(crate::consts::APPLICATION_NAME);
    if let Some(ref server) = settings.provider.server {
        builder = builder.base_url(server);
    }
    if let Some(ref namespace) = settings.provider.namespace {
        builder = builder.namespace(namespace);
    }
    Ok(builder.build()?)
}

pub fn authenticator(settings: &Settings) -> Authenticator {
    let mut builder = Authenticator::builder()
        .store_kind(settings.store_kind)
        .namespace(&settings.namespace)
        .secrets(Arc::new(FileSecretResolver::new(&settings.secrets_dir)));

    match KubeTokenIssuer::in_cluster() {
        Ok(issuer) => builder = builder.service_accounts(Arc::new(issuer)),
        Err(e) => tracing::info!("Service account tokens unavailable: {}", e),
    }

    builder.build()
}
