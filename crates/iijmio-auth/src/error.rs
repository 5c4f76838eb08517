//! Error types for the authorization flow

use std::time::Duration;

/// Errors from the OAuth flow and credential storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("developer id is not configured")]
    MissingDeveloperId,

    #[error("invalid authorization URL: {0}")]
    InvalidUrl(String),

    #[error("failed to bind redirect listener on {addr}: {cause}")]
    Bind { addr: String, cause: String },

    #[error("no redirect received within {0:?}")]
    ListenerTimeout(Duration),

    #[error("authorization interrupted")]
    Interrupted,

    #[error("redirect listener failed: {0}")]
    Listener(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
