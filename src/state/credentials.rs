use crate::ConfigError;
use serde::Deserialize;
use std::fmt;

/// An account used to authenticate API requests
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Round-robin pool of credentials
///
/// The active index only moves forward, wrapping after the last entry. It is
/// owned by a single `ApiClient`, so every task in the process sees the same
/// active credential.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    index: usize,
}

impl CredentialPool {
    /// Creates a pool starting at the first credential
    pub fn new(credentials: Vec<Credential>) -> Result<Self, ConfigError> {
        if credentials.is_empty() {
            return Err(ConfigError::Validation(
                "credential pool cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            credentials,
            index: 0,
        })
    }

    /// The credential requests are currently made with
    pub fn current(&self) -> &Credential {
        &self.credentials[self.index]
    }

    /// Advances to the next credential and returns it
    pub fn rotate(&mut self) -> &Credential {
        self.index = (self.index + 1) % self.credentials.len();
        tracing::warn!("Rotated to credential {}", self.current().username);
        self.current()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
