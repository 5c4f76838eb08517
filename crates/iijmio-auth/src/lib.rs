//! IIJmio OAuth (implicit grant) authentication library
//!
//! Captures an access token for the IIJmio coupon API and keeps it in a
//! credential store. The crate has no dependency on the coupon client and
//! can be tested on its own.
//!
//! Credential flow:
//! 1. `authorize::build_authorization_url()` points the browser at IIJmio
//! 2. `listener::RedirectListener::bind()` starts the local redirect listener
//! 3. The browser lands on `http://localhost:8080/` with the token in the fragment;
//!    the landing page re-issues it as `?access_token=...`
//! 4. The listener state machine persists the token via `CredentialStore::store_access_token()`
//!    and shuts the listener down
//!
//! `flow::OAuthFlow` runs steps 1-4 as a single async operation.

pub mod authorize;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod listener;

pub use authorize::build_authorization_url;
pub use constants::*;
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{Error, Result};
pub use flow::{InterruptHandle, OAuthFlow};
pub use listener::{
    BoundListener, ListenerAction, ListenerConfig, ListenerEvent, ListenerState, RedirectListener,
    StopHandle, StopReason, handle_event,
};
