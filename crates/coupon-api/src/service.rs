//! Coupon service: the public entry point
//!
//! Every operation checks the developer id first, then runs through the
//! executor under `retry_after_reauth`.

use std::sync::Arc;

use iijmio_auth::{CredentialStore, OAuthFlow};
use reqwest::Method;
use serde_json::json;
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::model::CouponInfo;
use crate::parse::parse_coupon_info;
use crate::retry::retry_after_reauth;
use crate::transport::{BoxFuture, Transport};

/// Obtains a fresh access token and puts it in the credential store.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self) -> BoxFuture<'_, Result<()>>;
}

impl Authenticator for OAuthFlow {
    fn authenticate(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.run().await.map_err(|e| match e {
                iijmio_auth::Error::MissingDeveloperId => Error::MissingDeveloperId,
                other => Error::AuthorizationFailed(other.to_string()),
            })
        })
    }
}

pub struct CouponService {
    executor: Executor,
    credentials: Arc<dyn CredentialStore>,
    authenticator: Arc<dyn Authenticator>,
}

impl CouponService {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        authenticator: Arc<dyn Authenticator>,
        coupon_url: impl Into<String>,
    ) -> Self {
        Self {
            executor: Executor::new(transport, credentials.clone(), coupon_url),
            credentials,
            authenticator,
        }
    }

    /// Run the authorization flow and store the captured token.
    pub async fn authenticate(&self) -> Result<()> {
        if self.credentials.load().await.developer_id().is_none() {
            return Err(Error::MissingDeveloperId);
        }
        self.authenticator.authenticate().await?;
        info!("authorization complete");
        Ok(())
    }

    /// Retrieve every account's coupon information, in API order.
    pub async fn fetch_coupon_info(&self) -> Result<Vec<CouponInfo>> {
        let executor = &self.executor;
        let body = retry_after_reauth(
            move || executor.execute(Method::GET, None),
            move || self.authenticate(),
        )
        .await?;

        let infos = parse_coupon_info(&body)?;
        info!(accounts = infos.len(), "fetched coupon info");
        Ok(infos)
    }

    /// Turn coupon consumption on or off for one line. Returns the raw
    /// response body.
    pub async fn set_coupon_enabled(&self, hdo_service_code: &str, enabled: bool) -> Result<String> {
        let body = coupon_switch_body(hdo_service_code, enabled);
        let executor = &self.executor;
        let response = retry_after_reauth(
            move || executor.execute(Method::PUT, Some(body.clone())),
            move || self.authenticate(),
        )
        .await?;

        info!(hdo_service_code, enabled, "coupon use updated");
        Ok(response)
    }
}

fn coupon_switch_body(hdo_service_code: &str, enabled: bool) -> String {
    json!({
        "couponInfo": [{
            "hdoInfo": [{
                "hdoServiceCode": hdo_service_code,
                "couponUse": enabled,
            }]
        }]
    })
    .to_string()
}
