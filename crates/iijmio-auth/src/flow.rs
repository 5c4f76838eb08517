//! End-to-end implicit grant: open the browser, capture the redirect
//!
//! The browser launch and the listener run concurrently: the listener is
//! bound first so the redirect cannot race it, then the launch is handed to a
//! blocking task while the listener waits.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::authorize::build_authorization_url;
use crate::constants::{AUTHORIZE_ENDPOINT, REDIRECT_URI};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::listener::{ListenerConfig, RedirectListener};

/// "Open this URL" capability of the host. Defaults to the system browser.
pub type OpenUrl = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Interrupts the flow: a running cycle stops, and every later `run()`
/// fails with `Interrupted` before binding or opening anything.
#[derive(Clone)]
pub struct InterruptHandle(CancellationToken);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.cancel();
    }
}

/// Implicit-grant authorization against IIJmio.
pub struct OAuthFlow {
    store: Arc<dyn CredentialStore>,
    authorize_endpoint: String,
    redirect_uri: String,
    listener: ListenerConfig,
    open_url: OpenUrl,
    interrupt: CancellationToken,
}

impl OAuthFlow {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            listener: ListenerConfig::default(),
            open_url: Arc::new(|url: &str| open::that(url)),
            interrupt: CancellationToken::new(),
        }
    }

    pub fn with_authorize_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorize_endpoint = endpoint.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_listener(mut self, listener: ListenerConfig) -> Self {
        self.listener = listener;
        self
    }

    /// Replace the browser launcher (headless hosts, tests).
    pub fn with_url_opener(mut self, open_url: OpenUrl) -> Self {
        self.open_url = open_url;
        self
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interrupt.clone())
    }

    /// Run one authorization cycle to completion.
    ///
    /// Fails with `Interrupted` or `MissingDeveloperId` before binding
    /// anything. On success the new token is already in the credential store.
    pub async fn run(&self) -> Result<()> {
        if self.interrupt.is_cancelled() {
            debug!("authorization already interrupted, not starting");
            return Err(Error::Interrupted);
        }
        let credential = self.store.load().await;
        let developer_id = credential.developer_id().ok_or(Error::MissingDeveloperId)?;
        let url = build_authorization_url(&self.authorize_endpoint, developer_id, &self.redirect_uri)?;

        let bound = RedirectListener::new(self.listener.clone()).bind().await?;

        // Cancellation is sticky, so an interrupt during setup still lands here
        let interrupted = self.interrupt.clone();
        let stop = bound.stop_handle();
        let watcher = tokio::spawn(async move {
            interrupted.cancelled().await;
            stop.stop();
        });

        info!(url = %url, "authorize in the browser to continue");
        let open_url = self.open_url.clone();
        tokio::task::spawn_blocking(move || match open_url(&url) {
            Ok(()) => debug!("browser launched"),
            Err(e) => warn!(error = %e, url = %url, "failed to open browser, open the URL manually"),
        });

        let result = bound.wait_for_token(self.store.as_ref()).await;
        watcher.abort();
        result.map(|_| ())
    }
}
