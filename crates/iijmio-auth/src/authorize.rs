//! Authorization URL for the implicit grant
//!
//! IIJmio returns the access token directly on the redirect
//! (`response_type=token`), so there is no code exchange and no PKCE.

use crate::constants::OAUTH_STATE;
use crate::error::{Error, Result};

/// Build the authorization URL the user's browser is sent to.
///
/// `client_id` is the developer id. Parameters are appended to whatever
/// query `endpoint` already carries.
pub fn build_authorization_url(
    endpoint: &str,
    developer_id: &str,
    redirect_uri: &str,
) -> Result<String> {
    let mut url = url::Url::parse(endpoint)
        .map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;

    url.query_pairs_mut()
        .append_pair("response_type", "token")
        .append_pair("client_id", developer_id)
        .append_pair("state", OAUTH_STATE)
        .append_pair("redirect_uri", redirect_uri);

    Ok(url.into())
}
