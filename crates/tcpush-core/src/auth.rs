//! Credential verification
//!
//! Kept apart from the transfer code: the sender and receiver never see
//! credentials. A front end asks a [`CredentialVerifier`] before starting a
//! transfer and decides what to do with the answer.

use tracing::debug;

/// Decides whether a user/password pair is acceptable
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, user: &str, password: &str) -> bool;
}

/// Accepts every pair. Used when no credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl CredentialVerifier for AllowAll {
    fn verify(&self, _user: &str, _password: &str) -> bool {
        true
    }
}

/// A single configured user/password pair.
///
/// Only BLAKE3 digests are stored; comparing `blake3::Hash` values is
/// constant-time.
#[derive(Clone)]
pub struct StaticCredentials {
    user: blake3::Hash,
    password: blake3::Hash,
}

impl StaticCredentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: blake3::hash(user.as_bytes()),
            password: blake3::hash(password.as_bytes()),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticCredentials { .. }")
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, user: &str, password: &str) -> bool {
        let user_ok = blake3::hash(user.as_bytes()) == self.user;
        let password_ok = blake3::hash(password.as_bytes()) == self.password;
        let ok = user_ok & password_ok;
        debug!("credential check for {:?}: {}", user, if ok { "ok" } else { "rejected" });
        ok
    }
}
