//! Authenticators map an incoming stream request to a user key.
//!
//! The user key groups connections for multicast. An authenticator runs
//! once per request, before registration; a failure rejects the request
//! and no connection is created.

use async_trait::async_trait;
use axum::http::request::Parts;
use thiserror::Error;

/// Default header read by [`HeaderAuthenticator`].
pub const DEFAULT_USER_HEADER: &str = "x-user-key";

/// Errors returned by an authenticator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Credentials rejected: {0}")]
    Rejected(String),
}

/// Turns request metadata into a user key.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the user key for this request.
    ///
    /// # Errors
    ///
    /// Any error rejects the stream with `401 Unauthorized`.
    async fn authenticate(&self, request: &Parts) -> Result<String, AuthError>;
}

#[async_trait]
impl<F> Authenticator for F
where
    F: Fn(&Parts) -> Result<String, AuthError> + Send + Sync,
{
    async fn authenticate(&self, request: &Parts) -> Result<String, AuthError> {
        self(request)
    }
}

/// Reads the user key verbatim from a request header.
///
/// Intended for deployments where a trusted proxy in front of the daemon
/// has already authenticated the caller and forwards its identity.
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    header: String,
}

impl HeaderAuthenticator {
    /// Creates an authenticator for the given header name.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }

    /// The header this authenticator reads.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_USER_HEADER)
    }
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, request: &Parts) -> Result<String, AuthError> {
        let value = request
            .headers
            .get(self.header.as_str())
            .ok_or_else(|| AuthError::MissingCredentials(format!("no {} header", self.header)))?;

        let key = value
            .to_str()
            .map_err(|_| AuthError::Rejected(format!("{} is not visible ASCII", self.header)))?
            .trim();

        if key.is_empty() {
            return Err(AuthError::Rejected(format!("{} is empty", self.header)));
        }

        Ok(key.to_string())
    }
}
