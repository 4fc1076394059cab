//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur while producing or parsing connection identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The operating system random source could not supply bytes.
    ///
    /// There is no fallback: a weaker identifier would silently break
    /// the uniqueness guarantee callers rely on for unicast addressing.
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    /// Text that does not encode a 16-byte identifier.
    #[error("Invalid connection id '{value}': {reason}")]
    Parse { value: String, reason: String },
}
