use crate::AuthError;
use crate::metrics::{CALL_LOOKUP_SELF, CallObserver, PROVIDER_VAULT};
use crate::models::{BATCH_TOKEN_TYPE, TokenIntrospection, token_type};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Anything that can look up the token it holds.
#[async_trait]
pub trait SelfLookup: Send + Sync {
    /// Raw `data` of the lookup response. `None` when the backend answered
    /// successfully without data.
    async fn lookup_self(&self) -> Result<Option<Map<String, Value>>, AuthError>;
}

/// Decides whether the handle's token can be reused.
///
/// Batch tokens and expirable tokens with less than a minute left are not
/// reusable. Lookup failures and malformed responses are errors, not
/// `false`.
pub async fn check_token<L>(handle: &L, observer: &dyn CallObserver) -> Result<bool, AuthError>
where
    L: SelfLookup + ?Sized,
{
    let result = handle.lookup_self().await;
    observer.observe(PROVIDER_VAULT, CALL_LOOKUP_SELF, result.as_ref().map(|_| ()));

    let data = result
        .map_err(|e| AuthError::Introspection {
            message: "lookup-self call failed".to_string(),
            source: Some(Box::new(e)),
        })?
        .ok_or_else(|| AuthError::introspection("no response nor error for token lookup"))?;

    if token_type(&data)? == BATCH_TOKEN_TYPE {
        tracing::debug!("Batch tokens are never reused");
        return Ok(false);
    }

    let token = TokenIntrospection::from_lookup(&data)?;
    if token.about_to_expire() {
        tracing::debug!(ttl = token.ttl_seconds, "Token is about to expire");
    }
    Ok(token.is_reusable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingObserver;
    use serde_json::json;

    enum FakeLookup {
        Data(Value),
        Empty,
        Fails,
    }

    #[async_trait]
    impl SelfLookup for FakeLookup {
        async fn lookup_self(&self) -> Result<Option<Map<String, Value>>, AuthError> {
            match self {
                FakeLookup::Data(v) => Ok(v.as_object().cloned()),
                FakeLookup::Empty => Ok(None),
                FakeLookup::Fails => Err(AuthError::ClientError {
                    status: 403,
                    message: "permission denied".to_string(),
                }),
            }
        }
    }

    async fn check(lookup: FakeLookup) -> Result<bool, AuthError> {
        check_token(&lookup, &RecordingObserver::new()).await
    }

    #[tokio::test]
    async fn test_long_lived_service_token_is_valid() {
        let lookup = FakeLookup::Data(json!({
            "type": "service",
            "ttl": 3600,
            "expire_time": "2030-01-01T00:00:00Z"
        }));
        assert!(check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_token_inside_expiry_buffer_is_invalid() {
        let lookup = FakeLookup::Data(json!({
            "type": "service",
            "ttl": 59,
            "expire_time": "2030-01-01T00:00:00Z"
        }));
        assert!(!check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_token_at_buffer_edge_is_valid() {
        let lookup = FakeLookup::Data(json!({
            "type": "service",
            "ttl": 60,
            "expire_time": "2030-01-01T00:00:00Z"
        }));
        assert!(check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_low_ttl_without_expire_time_is_valid() {
        let lookup = FakeLookup::Data(json!({
            "type": "service",
            "ttl": 0,
            "expire_time": null
        }));
        assert!(check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_token_is_invalid() {
        let lookup = FakeLookup::Data(json!({
            "type": "batch",
            "ttl": 3600,
            "expire_time": "2030-01-01T00:00:00Z"
        }));
        assert!(!check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_decided_before_ttl_is_read() {
        let lookup = FakeLookup::Data(json!({"type": "batch"}));
        assert!(!check(lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_ttl_is_introspection_error() {
        let lookup = FakeLookup::Data(json!({
            "type": "service",
            "expire_time": "2030-01-01T00:00:00Z"
        }));
        assert!(matches!(check(lookup).await, Err(AuthError::Introspection { .. })));
    }

    #[tokio::test]
    async fn test_missing_type_is_introspection_error() {
        let lookup = FakeLookup::Data(json!({"ttl": 3600, "expire_time": null}));
        assert!(matches!(check(lookup).await, Err(AuthError::Introspection { .. })));
    }

    #[tokio::test]
    async fn test_empty_response_is_introspection_error() {
        assert!(matches!(check(FakeLookup::Empty).await, Err(AuthError::Introspection { .. })));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_introspection_error() {
        let result = check(FakeLookup::Fails).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::Introspection { source: Some(_), .. }));
        assert!(err.to_string().contains("lookup-self call failed"));
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_one_observation_per_call() {
        let observer = RecordingObserver::new();
        let _ = check_token(&FakeLookup::Fails, &observer).await;
        let _ = check_token(&FakeLookup::Empty, &observer).await;

        let calls = observer.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.call == CALL_LOOKUP_SELF));
        assert!(!calls[0].success);
        // the call itself succeeded even though the response was unusable
        assert!(calls[1].success);
    }
}
