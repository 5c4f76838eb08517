//! One-shot redirect listener for the implicit grant
//!
//! Split in two halves:
//! - `handle_event` is a pure state machine: event in, (new_state, action) out.
//! - `BoundListener` owns the axum server task and executes the actions.
//!
//! States: `Idle -> AwaitingRedirect -> TokenCaptured -> Stopped`. Any state
//! moves to `Stopped` on interrupt, timeout, or fault. The bound port is
//! released whenever `Stopped` is reached, and also when a `BoundListener` is
//! dropped without being awaited.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use common::Secret;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::constants::{ACCESS_TOKEN_PARAM, ERROR_PARAM, LISTEN_ADDR, LISTENER_TIMEOUT, SHUTDOWN_TIMEOUT};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

/// Served for any request without a usable token. Forwards a token found in
/// the URL fragment back to the listener as a query parameter.
const LANDING_PAGE: &str = include_str!("../assets/landing.html");

/// Served once a token has been received.
const CAPTURED_PAGE: &str = include_str!("../assets/captured.html");

/// Served when the provider redirects back with an error instead of a token.
const DENIED_PAGE: &str = "<!DOCTYPE html><html><body><h2>Authorization was not granted.</h2>\
<p>You can close this window.</p></body></html>";

/// Why the listener stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Captured,
    Interrupted,
    TimedOut,
    Fault(String),
}

/// Listener lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    /// Not yet bound
    Idle,
    /// Bound and serving, no token yet
    AwaitingRedirect,
    /// Token received, waiting for it to be persisted
    TokenCaptured,
    /// Terminal; the port has been (or is being) released
    Stopped { reason: StopReason },
}

/// Events that drive state transitions.
#[derive(Debug)]
pub enum ListenerEvent {
    /// TCP listener bound
    Bound,
    /// Inbound request on any path, with the raw `access_token` value if present
    Redirect {
        path: String,
        access_token: Option<String>,
    },
    /// Captured token written to the credential store
    Persisted,
    /// External cancellation (Ctrl-C, `StopHandle::stop`)
    Interrupt,
    /// No token arrived before the deadline
    Timeout,
    /// Server task or credential store failed, or the provider returned an error
    Fault(String),
}

/// Actions the runner executes after a transition.
#[derive(Debug, PartialEq)]
pub enum ListenerAction {
    /// Write the token to the credential store, then report `Persisted` or `Fault`
    PersistToken(Secret<String>),
    /// Stop serving and release the port
    Shutdown,
    /// No-op
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ListenerState, event: ListenerEvent) -> (ListenerState, ListenerAction) {
    match (state, event) {
        // --- Stopped is terminal ---
        (state @ ListenerState::Stopped { .. }, _) => (state, ListenerAction::None),

        // --- Idle ---
        (ListenerState::Idle, ListenerEvent::Bound) => {
            (ListenerState::AwaitingRedirect, ListenerAction::None)
        }

        // --- AwaitingRedirect ---
        (
            ListenerState::AwaitingRedirect,
            ListenerEvent::Redirect {
                access_token: Some(token),
                ..
            },
        ) if !token.is_empty() => (
            ListenerState::TokenCaptured,
            ListenerAction::PersistToken(Secret::new(token)),
        ),

        // Empty query, empty token, favicon requests: keep waiting
        (ListenerState::AwaitingRedirect, ListenerEvent::Redirect { .. }) => {
            (ListenerState::AwaitingRedirect, ListenerAction::None)
        }

        // --- TokenCaptured ---
        (ListenerState::TokenCaptured, ListenerEvent::Persisted) => (
            ListenerState::Stopped {
                reason: StopReason::Captured,
            },
            ListenerAction::Shutdown,
        ),

        // --- Any state ---
        (_, ListenerEvent::Interrupt) => (
            ListenerState::Stopped {
                reason: StopReason::Interrupted,
            },
            ListenerAction::Shutdown,
        ),

        (_, ListenerEvent::Timeout) => (
            ListenerState::Stopped {
                reason: StopReason::TimedOut,
            },
            ListenerAction::Shutdown,
        ),

        (_, ListenerEvent::Fault(cause)) => (
            ListenerState::Stopped {
                reason: StopReason::Fault(cause),
            },
            ListenerAction::Shutdown,
        ),

        // A second redirect after capture, or an out-of-order event: ignore
        (state, _event) => (state, ListenerAction::None),
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// `host:port` to bind; must match the registered redirect URI
    pub listen_addr: String,
    /// Upper bound on waiting for the redirect
    pub timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_addr: LISTEN_ADDR.to_string(),
            timeout: LISTENER_TIMEOUT,
        }
    }
}

/// Build the router that answers every path and forwards redirects as events.
///
/// Exposed so tests can drive it with synthetic requests instead of a socket.
pub fn build_router(events: mpsc::UnboundedSender<ListenerEvent>) -> Router {
    Router::new()
        .fallback(redirect_handler)
        .layer(tower::limit::ConcurrencyLimitLayer::new(1))
        .with_state(events)
}

/// Catch-all handler: landing page, favicon, provider error, or token redirect.
async fn redirect_handler(
    State(events): State<mpsc::UnboundedSender<ListenerEvent>>,
    uri: Uri,
) -> Response {
    let path = uri.path().to_string();

    if path.ends_with("favicon.ico") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let param = |name: &str| {
        uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        })
    };

    if let Some(code) = param(ERROR_PARAM).filter(|code| !code.is_empty()) {
        warn!(path, error = %code, "authorization server returned an error");
        if events
            .send(ListenerEvent::Fault(format!("authorization refused: {code}")))
            .is_err()
        {
            warn!("redirect arrived after listener stopped");
        }
        return Html(DENIED_PAGE).into_response();
    }

    let access_token = param(ACCESS_TOKEN_PARAM);
    let has_token = access_token.as_deref().is_some_and(|t| !t.is_empty());

    debug!(path, has_token, "redirect listener request");
    if events
        .send(ListenerEvent::Redirect { path, access_token })
        .is_err()
    {
        warn!("redirect arrived after listener stopped");
    }

    if has_token {
        Html(CAPTURED_PAGE).into_response()
    } else {
        Html(LANDING_PAGE).into_response()
    }
}

/// Cloneable handle that stops a running listener from outside.
#[derive(Clone)]
pub struct StopHandle {
    events: mpsc::UnboundedSender<ListenerEvent>,
}

impl StopHandle {
    /// Request shutdown. No-op if the listener already stopped.
    pub fn stop(&self) {
        let _ = self.events.send(ListenerEvent::Interrupt);
    }
}

/// Factory for bound listeners.
pub struct RedirectListener {
    config: ListenerConfig,
}

impl RedirectListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }

    /// Bind and start serving. Transition: `Idle -> AwaitingRedirect`.
    pub async fn bind(&self) -> Result<BoundListener> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| Error::Bind {
                addr: self.config.listen_addr.clone(),
                cause: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| Error::Bind {
            addr: self.config.listen_addr.clone(),
            cause: e.to_string(),
        })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = build_router(events_tx.clone());
        let fault_tx = events_tx.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "redirect listener server failed");
                let _ = fault_tx.send(ListenerEvent::Fault(e.to_string()));
            }
        });

        let (state, _) = handle_event(ListenerState::Idle, ListenerEvent::Bound);
        info!(addr = %local_addr, "redirect listener awaiting redirect");

        Ok(BoundListener {
            local_addr,
            timeout: self.config.timeout,
            state,
            events_tx,
            events_rx,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
        })
    }
}

/// A listener that is bound and serving.
///
/// Dropping it without calling `wait_for_token` still triggers shutdown: the
/// server's graceful-shutdown future resolves when `shutdown_tx` is dropped.
pub struct BoundListener {
    local_addr: SocketAddr,
    timeout: Duration,
    state: ListenerState,
    events_tx: mpsc::UnboundedSender<ListenerEvent>,
    events_rx: mpsc::UnboundedReceiver<ListenerEvent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<tokio::task::JoinHandle<()>>,
}

impl BoundListener {
    /// Actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &ListenerState {
        &self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            events: self.events_tx.clone(),
        }
    }

    /// Drive the state machine until it stops, persisting the token via `store`.
    ///
    /// Returns the captured token, or the reason no token was captured. The
    /// port is released before this returns in every case.
    pub async fn wait_for_token(mut self, store: &dyn CredentialStore) -> Result<Secret<String>> {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut captured: Option<Secret<String>> = None;
        let mut pending: Option<ListenerEvent> = None;

        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => tokio::select! {
                    event = self.events_rx.recv() => event
                        .unwrap_or_else(|| ListenerEvent::Fault("event channel closed".into())),
                    _ = &mut deadline => ListenerEvent::Timeout,
                },
            };

            let state = std::mem::replace(&mut self.state, ListenerState::Idle);
            let (state, action) = handle_event(state, event);
            self.state = state;

            match action {
                ListenerAction::PersistToken(token) => {
                    pending = Some(
                        match store.store_access_token(token.expose().clone()).await {
                            Ok(()) => {
                                info!("access token captured");
                                captured = Some(token);
                                ListenerEvent::Persisted
                            }
                            Err(e) => ListenerEvent::Fault(format!("storing access token: {e}")),
                        },
                    );
                }
                ListenerAction::Shutdown => break,
                ListenerAction::None => {}
            }
        }

        self.shutdown().await;

        match (&self.state, captured) {
            (ListenerState::Stopped { reason: StopReason::Captured }, Some(token)) => Ok(token),
            (ListenerState::Stopped { reason: StopReason::Interrupted }, _) => {
                Err(Error::Interrupted)
            }
            (ListenerState::Stopped { reason: StopReason::TimedOut }, _) => {
                Err(Error::ListenerTimeout(self.timeout))
            }
            (ListenerState::Stopped { reason: StopReason::Fault(cause) }, _) => {
                Err(Error::Listener(cause.clone()))
            }
            (state, _) => Err(Error::Listener(format!(
                "listener exited in unexpected state {state:?}"
            ))),
        }
    }

    /// Stop serving and wait for the server task to release the port.
    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut server) = self.server.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
                Ok(_) => debug!(addr = %self.local_addr, "redirect listener released port"),
                Err(_) => {
                    warn!(
                        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                        "redirect listener did not drain in time, aborting"
                    );
                    server.abort();
                }
            }
        }
    }
}
