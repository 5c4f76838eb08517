//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The developer id may live in the TOML file, but `IIJMIO_DEVELOPER_ID`
//! wins so it can be kept out of files entirely.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "iijmio-coupon.toml";

const DEVELOPER_ID_ENV: &str = "IIJMIO_DEVELOPER_ID";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub oauth: OAuthConfig,
}

/// Coupon API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub developer_id: Option<Secret<String>>,
    pub coupon_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            developer_id: None,
            coupon_url: coupon_api::COUPON_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Authorization flow settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub redirect_uri: String,
    /// Address the redirect listener binds; must match `redirect_uri`
    pub listen_addr: String,
    pub timeout_secs: u64,
    /// Where the captured access token is kept between runs
    pub credentials_path: PathBuf,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorize_url: iijmio_auth::AUTHORIZE_ENDPOINT.to_string(),
            redirect_uri: iijmio_auth::REDIRECT_URI.to_string(),
            listen_addr: iijmio_auth::LISTEN_ADDR.to_string(),
            timeout_secs: iijmio_auth::LISTENER_TIMEOUT.as_secs(),
            credentials_path: PathBuf::from("iijmio-credentials.json"),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OAuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is only tolerated at the default path; an explicitly
    /// named file must exist.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e)
                if e.kind() == std::io::ErrorKind::NotFound
                    && path == Path::new(DEFAULT_CONFIG_PATH) =>
            {
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&contents)
    }

    /// Parse, apply env overrides, and validate.
    pub fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if config.api.developer_id.as_ref().is_some_and(|id| id.is_empty()) {
            config.api.developer_id = None;
        }
        if let Ok(id) = std::env::var(DEVELOPER_ID_ENV) {
            let id = id.trim().to_owned();
            if !id.is_empty() {
                config.api.developer_id = Some(Secret::new(id));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("api.coupon_url", &self.api.coupon_url),
            ("oauth.authorize_url", &self.oauth.authorize_url),
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.oauth.timeout_secs == 0 {
            return Err(common::Error::Config(
                "oauth.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.oauth.listen_addr.trim().is_empty() {
            return Err(common::Error::Config("oauth.listen_addr must not be empty".into()));
        }

        Ok(())
    }

    /// Config file path from `--config` / `CONFIG_PATH`, or the default.
    pub fn resolve_path(cli_path: Option<PathBuf>) -> PathBuf {
        cli_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
