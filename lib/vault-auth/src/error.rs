use crate::config::Mechanism;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot initialize Vault client: no valid auth method specified")]
    NoAuthMethodConfigured,

    #[error("token lookup failed: {message}")]
    Introspection {
        message: String,
        #[source]
        source: Option<Box<AuthError>>,
    },

    #[error("{mechanism} auth failed for {reference}: {source}")]
    Mechanism {
        mechanism: Mechanism,
        reference: String,
        #[source]
        source: Box<AuthError>,
    },

    #[error("error while revoking token: {0}")]
    Revocation(#[source] Box<AuthError>),

    #[error("cannot request Kubernetes service account token for service account {name:?}: {message}")]
    ServiceAccountToken { name: String, message: String },

    #[error("Secret not found: {namespace}/{name} (key {key})")]
    SecretNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("Invalid auth configuration: {0}")]
    InvalidConfig(String),

    #[error("Vault not detected: VAULT_ADDR not set")]
    VaultNotDetected,

    #[error("Vault client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Vault request error: {0}")]
    RequestError(String),

    #[error("Invalid Vault response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    pub(crate) fn mechanism(mechanism: Mechanism, reference: String, source: AuthError) -> Self {
        AuthError::Mechanism {
            mechanism,
            reference,
            source: Box::new(source),
        }
    }

    pub(crate) fn introspection(message: impl Into<String>) -> Self {
        AuthError::Introspection {
            message: message.into(),
            source: None,
        }
    }

    /// The status code of the backend response, when the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::ClientError { status, .. } => Some(*status),
            AuthError::Mechanism { source, .. } | AuthError::Revocation(source) => source.status(),
            AuthError::Introspection {
                source: Some(source), ..
            } => source.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanism_error_names_mechanism_and_reference() {
        let err = AuthError::mechanism(
            Mechanism::AppRole,
            "approle (role id web)".to_string(),
            AuthError::ClientError {
                status: 400,
                message: "invalid secret id".to_string(),
            },
        );
        let text = err.to_string();
        assert!(text.starts_with("AppRole auth failed for approle (role id web)"), "{text}");
        assert!(text.contains("invalid secret id"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_revocation_error_message() {
        let err = AuthError::Revocation(Box::new(AuthError::RequestError("timeout".to_string())));
        assert_eq!(err.to_string(), "error while revoking token: Vault request error: timeout");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_status_reaches_through_introspection() {
        let err = AuthError::Revocation(Box::new(AuthError::Introspection {
            message: "lookup-self call failed".to_string(),
            source: Some(Box::new(AuthError::ClientError {
                status: 403,
                message: "permission denied".to_string(),
            })),
        }));
        assert_eq!(err.status(), Some(403));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(AuthError::introspection("no TTL found in response").status(), None);
    }
}
