use crate::AuthError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;

/// Token type Vault issues for lightweight, non-persisted tokens.
pub const BATCH_TOKEN_TYPE: &str = "batch";

/// Tokens with less TTL than this are treated as already expired.
pub const EXPIRY_BUFFER_SECONDS: i64 = 60;

/// Parsed result of a `lookup-self` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenIntrospection {
    pub token_type: String,
    pub ttl_seconds: i64,
    pub expire_time: Option<DateTime<Utc>>,
}

impl TokenIntrospection {
    /// Builds the introspection from the `data` object of a lookup response.
    /// Missing fields are errors, a `null` expire_time is not.
    pub fn from_lookup(data: &Map<String, Value>) -> Result<Self, AuthError> {
        let token_type = token_type(data)?.to_string();

        let ttl = data
            .get("ttl")
            .ok_or_else(|| AuthError::introspection("no TTL found in response"))?;
        let ttl_seconds = ttl
            .as_i64()
            .ok_or_else(|| AuthError::introspection(format!("invalid token TTL: {}", ttl)))?;

        let expire_time = match data.get("expire_time") {
            None => {
                return Err(AuthError::introspection("no expiration time found in response"));
            }
            Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|e| {
                        AuthError::introspection(format!("invalid expiration time {:?}: {}", s, e))
                    })?
                    .with_timezone(&Utc),
            ),
            Some(other) => {
                return Err(AuthError::introspection(format!("invalid expiration time: {}", other)));
            }
        };

        Ok(Self {
            token_type,
            ttl_seconds,
            expire_time,
        })
    }

    pub fn is_batch(&self) -> bool {
        self.token_type == BATCH_TOKEN_TYPE
    }

    /// Expirable token inside the early-expiry buffer. Tokens without an
    /// expiration time never hit this, whatever their TTL.
    pub fn about_to_expire(&self) -> bool {
        self.ttl_seconds < EXPIRY_BUFFER_SECONDS && self.expire_time.is_some()
    }

    pub fn is_reusable(&self) -> bool {
        !self.is_batch() && !self.about_to_expire()
    }
}

pub(crate) fn token_type(data: &Map<String, Value>) -> Result<&str, AuthError> {
    data.get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::introspection("could not assert token type"))
}

/// Lease attached to a freshly issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLease {
    pub lease_duration: Duration,
    pub renewable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_lookup_parses_fields() {
        let token = TokenIntrospection::from_lookup(&data(json!({
            "type": "service",
            "ttl": 2764800,
            "expire_time": "2024-02-01T00:00:00.123456789Z"
        })))
        .unwrap();
        assert_eq!(token.token_type, "service");
        assert_eq!(token.ttl_seconds, 2764800);
        assert_eq!(
            token.expire_time.unwrap().to_rfc3339(),
            "2024-02-01T00:00:00.123456789+00:00"
        );
        assert!(token.is_reusable());
    }

    #[test]
    fn test_null_expire_time_is_not_expirable() {
        let token = TokenIntrospection::from_lookup(&data(json!({
            "type": "service",
            "ttl": 0,
            "expire_time": null
        })))
        .unwrap();
        assert!(token.expire_time.is_none());
        assert!(!token.about_to_expire());
        assert!(token.is_reusable());
    }

    #[test]
    fn test_missing_expire_time_is_error() {
        let result = TokenIntrospection::from_lookup(&data(json!({"type": "service", "ttl": 60})));
        assert!(matches!(result, Err(AuthError::Introspection { .. })));
    }

    #[test]
    fn test_non_integer_ttl_is_error() {
        let result = TokenIntrospection::from_lookup(&data(json!({
            "type": "service",
            "ttl": "soon",
            "expire_time": null
        })));
        assert!(matches!(result, Err(AuthError::Introspection { message, .. }) if message.contains("invalid token TTL")));
    }

    #[test]
    fn test_malformed_expire_time_is_error() {
        let result = TokenIntrospection::from_lookup(&data(json!({
            "type": "service",
            "ttl": 600,
            "expire_time": "tomorrow"
        })));
        assert!(matches!(result, Err(AuthError::Introspection { .. })));
    }
}
