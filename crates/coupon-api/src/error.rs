//! Error taxonomy for coupon API operations

/// Errors surfaced by `CouponService` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No developer id configured. Never retried; no request is sent.
    #[error("developer id is not configured")]
    MissingDeveloperId,

    /// The API answered 403. Recoverable by re-authenticating once.
    #[error("authorization expired")]
    AuthorizationExpired,

    /// Re-authentication failed, or the retried request was rejected again.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Non-auth HTTP failure (`status` set) or network failure (`status` unset).
    #[error("request failed{}: {cause}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    RequestFailed { status: Option<u16>, cause: String },

    /// The response body does not have the expected structure.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Result alias for coupon API operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_includes_status_when_known() {
        let err = Error::RequestFailed {
            status: Some(503),
            cause: "service unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 503: service unavailable"
        );
    }

    #[test]
    fn request_failed_without_status_reads_cleanly() {
        let err = Error::RequestFailed {
            status: None,
            cause: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "request failed: connection refused");
    }

    #[test]
    fn error_debug_includes_variant_name() {
        let debug = format!("{:?}", Error::MalformedResponse("x".into()));
        assert!(debug.contains("MalformedResponse"), "got: {debug}");
    }
}
