//! Pluggable credential verification.
//!
//! The analytics pipeline itself never authenticates; a transport layer in front of it picks a
//! [`CredentialVerifier`] and checks each request before calling in.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::AuthError;

/// Username/password pair presented by a client.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

/// Decides whether presented credentials are acceptable.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError>;
}

/// Accepts exactly one configured username/password pair.
#[derive(Clone)]
pub struct StaticCredential {
    expected: Credentials,
}

impl StaticCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            expected: Credentials::new(username, password),
        }
    }
}

impl Default for StaticCredential {
    /// The stock `Admin`/`Admin` account.
    fn default() -> Self {
        Self::new("Admin", "Admin")
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredential")
            .field("username", &self.expected.username)
            .finish()
    }
}

impl CredentialVerifier for StaticCredential {
    fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        if *credentials == self.expected {
            Ok(Principal {
                username: credentials.username.clone(),
            })
        } else {
            log::debug!("rejected credentials for user={}", credentials.username);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Backend consulted by [`ExternalIdentityProvider`].
///
/// Returns `Ok(None)` for unknown or wrong credentials and `Err` when the backend itself
/// cannot answer.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<Option<Principal>, AuthError>;
}

/// Delegates verification to an [`IdentityProvider`].
#[derive(Clone)]
pub struct ExternalIdentityProvider {
    provider: Arc<dyn IdentityProvider>,
}

impl ExternalIdentityProvider {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ExternalIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalIdentityProvider").finish_non_exhaustive()
    }
}

impl CredentialVerifier for ExternalIdentityProvider {
    fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        match self.provider.authenticate(credentials) {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => Err(AuthError::InvalidCredentials),
            Err(err) => {
                log::warn!("identity provider failed: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CredentialVerifier, Credentials, ExternalIdentityProvider, IdentityProvider, Principal,
        StaticCredential,
    };
    use crate::error::AuthError;
    use std::sync::Arc;

    #[test]
    fn static_credential_defaults_to_admin_admin() {
        let verifier = StaticCredential::default();
        assert_eq!(
            verifier.verify(&Credentials::new("Admin", "Admin")),
            Ok(Principal {
                username: "Admin".into()
            })
        );
        assert_eq!(
            verifier.verify(&Credentials::new("admin", "Admin")),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", Credentials::new("ops", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }

    struct Directory;

    impl IdentityProvider for Directory {
        fn authenticate(&self, c: &Credentials) -> Result<Option<Principal>, AuthError> {
            match (c.username.as_str(), c.password.as_str()) {
                ("down", _) => Err(AuthError::ProviderUnavailable {
                    message: "ldap timeout".into(),
                }),
                ("alice", "pw") => Ok(Some(Principal {
                    username: "alice".into(),
                })),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn external_provider_maps_outcomes() {
        let verifier = ExternalIdentityProvider::new(Arc::new(Directory));
        assert!(verifier.verify(&Credentials::new("alice", "pw")).is_ok());
        assert_eq!(
            verifier.verify(&Credentials::new("alice", "nope")),
            Err(AuthError::InvalidCredentials)
        );
        assert!(matches!(
            verifier.verify(&Credentials::new("down", "x")),
            Err(AuthError::ProviderUnavailable { .. })
        ));
    }
}
