//! Call-result observation for backend interactions.
//!
//! Every lookup, login and revoke reports `(provider, call, outcome)` to a
//! [`CallObserver`]. Observers never influence control flow.

use crate::AuthError;
use std::sync::Mutex;

pub const PROVIDER_VAULT: &str = "HashiCorp/Vault";
pub const CALL_LOOKUP_SELF: &str = "LookupSelf";
pub const CALL_REVOKE_SELF: &str = "RevokeSelf";
pub const CALL_LOGIN: &str = "Login";

pub trait CallObserver: Send + Sync {
    fn observe(&self, provider: &str, call: &str, result: Result<(), &AuthError>);
}

/// Emits one `tracing` event per call. Used when nothing else is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn observe(&self, provider: &str, call: &str, result: Result<(), &AuthError>) {
        match result {
            Ok(()) => tracing::debug!(provider, call, status = "success", "backend call"),
            Err(e) => tracing::debug!(provider, call, status = "error", error = %e, "backend call"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CallObserver for NoopObserver {
    fn observe(&self, _provider: &str, _call: &str, _result: Result<(), &AuthError>) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCall {
    pub provider: String,
    pub call: String,
    pub success: bool,
}

/// Keeps every observation in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<ObservedCall>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ObservedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.call == call).count()
    }
}

impl CallObserver for RecordingObserver {
    fn observe(&self, provider: &str, call: &str, result: Result<(), &AuthError>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ObservedCall {
                provider: provider.to_string(),
                call: call.to_string(),
                success: result.is_ok(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_outcomes() {
        let observer = RecordingObserver::new();
        observer.observe(PROVIDER_VAULT, CALL_LOOKUP_SELF, Ok(()));
        let err = AuthError::RequestError("connection refused".to_string());
        observer.observe(PROVIDER_VAULT, CALL_REVOKE_SELF, Err(&err));

        let calls = observer.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].success);
        assert_eq!(calls[1].call, CALL_REVOKE_SELF);
        assert!(!calls[1].success);
        assert_eq!(observer.count(CALL_LOOKUP_SELF), 1);
    }
}
