//! Credential lookup, injected by the host application.
//!
//! The OAuth handshake and token storage live outside this crate; the grader
//! only asks "is there a usable credential for this user?".

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::classroom::{ClassroomApi, ClassroomError, HttpClassroom, UserId};
use crate::config::GraderConfig;

/// Bearer credential bound to one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Source of credentials keyed by a stable user identifier.
///
/// `None` means the user has to go through authorization again; it is not an
/// error.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_credential(&self, user_id: &UserId) -> Option<Credential>;
}

/// In-memory credentials, e.g. filled by an OAuth callback handler.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    tokens: RwLock<HashMap<UserId, Credential>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, user_id: impl Into<UserId>, credential: Credential) -> Self {
        self.insert(user_id, credential);
        self
    }

    pub fn insert(&self, user_id: impl Into<UserId>, credential: Credential) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), credential);
    }

    /// Forget a user's credential so the next request re-authorizes.
    pub fn revoke(&self, user_id: &UserId) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn get_credential(&self, user_id: &UserId) -> Option<Credential> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

/// Single-user credentials read from `CLASSROOM_ACCESS_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

pub const ACCESS_TOKEN_ENV: &str = "CLASSROOM_ACCESS_TOKEN";

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn get_credential(&self, _user_id: &UserId) -> Option<Credential> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Credential::new)
    }
}

/// Builds a remote client for a credential.
pub trait Connector: Send + Sync {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn ClassroomApi>, ClassroomError>;
}

/// Connects to the HTTP API described by a [`GraderConfig`].
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: GraderConfig,
}

impl HttpConnector {
    pub fn new(config: GraderConfig) -> Self {
        Self { config }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn ClassroomApi>, ClassroomError> {
        let api = HttpClassroom::with_config(credential, &self.config.base_url, self.config.timeout)?;
        Ok(Arc::new(api))
    }
}
