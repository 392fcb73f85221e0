use crate::guard::CredentialGuard;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Outcome of checking one request's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// No credential is configured; every request passes.
    Open,
    Granted,
    /// Rejected. `attempts` is the failure count after this rejection.
    Denied { attempts: u64 },
}

impl AuthDecision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Per-request credential check backed by the process-wide guard.
///
/// The shared secret is kept only as a digest; the provided value is
/// compared by digest, which preserves literal string equality.
#[derive(Debug)]
pub struct AuthGate {
    credential_hash: Option<String>,
    guard: Arc<CredentialGuard>,
}

impl AuthGate {
    /// An empty credential is treated the same as none (open mode).
    pub fn new(credential: Option<&str>, guard: Arc<CredentialGuard>) -> Self {
        let credential_hash = credential.filter(|value| !value.is_empty()).map(hash_key);
        Self {
            credential_hash,
            guard,
        }
    }

    pub fn is_open(&self) -> bool {
        self.credential_hash.is_none()
    }

    pub fn guard(&self) -> &Arc<CredentialGuard> {
        &self.guard
    }

    /// Checks the credential presented in the `Authorization` header.
    ///
    /// A mismatch is recorded with the guard before returning, which may
    /// terminate the process when the lockout threshold is reached.
    pub fn authenticate(&self, provided: Option<&str>) -> AuthDecision {
        let Some(expected) = self.credential_hash.as_deref() else {
            return AuthDecision::Open;
        };

        if provided.map(hash_key).as_deref() == Some(expected) {
            return AuthDecision::Granted;
        }

        let attempts = self.guard.record_failure();
        AuthDecision::Denied { attempts }
    }
}

fn hash_key(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}
