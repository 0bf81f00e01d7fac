//! Sources for credentials referenced by auth configs.

use crate::AuthError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Reads one key of a named secret.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<String, AuthError>;
}

/// In-memory secrets, keyed by namespace, name and key.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretResolver {
    values: HashMap<(String, String, String), String>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.values
            .insert((namespace.into(), name.into(), key.into()), value.into());
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<String, AuthError> {
        self.values
            .get(&(namespace.to_string(), name.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(namespace, name, key))
    }
}

/// Secrets mounted as files under `<root>/<namespace>/<name>/<key>`.
#[derive(Debug, Clone)]
pub struct FileSecretResolver {
    root: PathBuf,
}

impl FileSecretResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SecretResolver for FileSecretResolver {
    async fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<String, AuthError> {
        let path = self
            .root
            .join(path_component(namespace)?)
            .join(path_component(name)?)
            .join(path_component(key)?);
        match tokio::fs::read_to_string(&path).await {
            // mounted files usually carry a trailing newline
            Ok(content) => Ok(content
                .strip_suffix('\n')
                .map(|s| s.strip_suffix('\r').unwrap_or(s))
                .unwrap_or(content.as_str())
                .to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(namespace, name, key)),
            Err(e) => Err(AuthError::Io(e)),
        }
    }
}

/// Accepts exactly one normal path segment, so a reference can never leave
/// its namespace directory.
fn path_component(segment: &str) -> Result<&str, AuthError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == segment => Ok(segment),
        _ => Err(AuthError::InvalidConfig(format!(
            "invalid secret path segment {:?}",
            segment
        ))),
    }
}

fn not_found(namespace: &str, name: &str, key: &str) -> AuthError {
    AuthError::SecretNotFound {
        namespace: namespace.to_string(),
        name: name.to_string(),
        key: key.to_string(),
    }
}
