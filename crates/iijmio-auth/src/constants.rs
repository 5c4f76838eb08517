//! IIJmio OAuth constants
//!
//! Public endpoints and fixed flow parameters. None of these are secrets:
//! the developer id comes from configuration and the access token from the
//! credential store.

use std::time::Duration;

/// Authorization endpoint for the implicit grant
pub const AUTHORIZE_ENDPOINT: &str = "https://api.iijmio.jp/mobile/d/v1/authorization/";

/// Redirect URI registered for the developer id. Must match the listener address.
pub const REDIRECT_URI: &str = "http://localhost:8080/";

/// Address the redirect listener binds to
pub const LISTEN_ADDR: &str = "localhost:8080";

/// Fixed `state` value sent with every authorization request
pub const OAUTH_STATE: &str = "mikutter_iij_coupon_checker";

/// Query parameter carrying the captured token on the redirect
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Query parameter carrying the provider's error code when authorization is refused
pub const ERROR_PARAM: &str = "error";

/// How long the listener waits for the browser before giving up
pub const LISTENER_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on waiting for the listener task to release its port
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
