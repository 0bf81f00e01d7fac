use crate::client::VaultClient;
use std::ops::{Deref, DerefMut};

/// Scope guard running auth calls under the auth namespace.
///
/// While the guard lives every call goes through it to the client. The
/// operating namespace is put back when it drops, whichever way the
/// caller leaves: return, `?`, panic or a cancelled future.
pub struct NamespaceScope<'a> {
    client: &'a mut VaultClient,
    restore: Option<String>,
}

impl<'a> NamespaceScope<'a> {
    /// Without an explicit operating namespace the client's current one is
    /// kept and restored.
    pub fn enter(
        client: &'a mut VaultClient,
        operating: Option<&str>,
        auth_namespace: Option<&str>,
    ) -> Self {
        let operating = operating.unwrap_or(client.namespace()).to_string();
        match auth_namespace {
            Some(auth_namespace) if auth_namespace != operating => {
                tracing::debug!(namespace = auth_namespace, "Using auth namespace for the vault login");
                client.set_namespace(auth_namespace);
                Self {
                    client,
                    restore: Some(operating),
                }
            }
            _ => Self {
                client,
                restore: None,
            },
        }
    }

    pub fn is_switched(&self) -> bool {
        self.restore.is_some()
    }
}

impl Deref for NamespaceScope<'_> {
    type Target = VaultClient;

    fn deref(&self) -> &VaultClient {
        &*self.client
    }
}

impl DerefMut for NamespaceScope<'_> {
    fn deref_mut(&mut self) -> &mut VaultClient {
        &mut *self.client
    }
}

impl Drop for NamespaceScope<'_> {
    fn drop(&mut self) {
        if let Some(namespace) = self.restore.take() {
            tracing::debug!(namespace = %namespace, "Restoring client namespace");
            self.client.set_namespace(namespace);
        }
    }
}
