//! Re-authenticate-then-retry-once combinator
//!
//! Wraps one caller-level operation: if the first attempt reports
//! `AuthorizationExpired`, run the re-authentication once and repeat the
//! operation once. The operation runs at most twice, so a token that is
//! rejected even when fresh cannot cause a loop.

use std::future::Future;

use tracing::{info, warn};

use crate::error::{Error, Result};

pub async fn retry_after_reauth<T, Op, OpFut, Reauth, ReauthFut>(
    mut op: Op,
    reauth: Reauth,
) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Reauth: FnOnce() -> ReauthFut,
    ReauthFut: Future<Output = Result<()>>,
{
    match op().await {
        Err(Error::AuthorizationExpired) => {}
        other => return other,
    }

    info!("access token rejected, re-authenticating");
    match reauth().await {
        Ok(()) => record_reauth("success"),
        Err(Error::MissingDeveloperId) => {
            record_reauth("failure");
            return Err(Error::MissingDeveloperId);
        }
        Err(Error::AuthorizationFailed(cause)) => {
            record_reauth("failure");
            warn!(cause = %cause, "re-authentication failed");
            return Err(Error::AuthorizationFailed(cause));
        }
        Err(e) => {
            record_reauth("failure");
            warn!(error = %e, "re-authentication failed");
            return Err(Error::AuthorizationFailed(e.to_string()));
        }
    }

    match op().await {
        Err(Error::AuthorizationExpired) => Err(Error::AuthorizationFailed(
            "access token rejected again after re-authentication".into(),
        )),
        Err(Error::RequestFailed { status: None, cause }) => Err(Error::AuthorizationFailed(
            format!("retry after re-authentication failed: {cause}"),
        )),
        other => other,
    }
}

fn record_reauth(outcome: &'static str) {
    metrics::counter!("coupon_api_reauth_total", "outcome" => outcome).increment(1);
}
