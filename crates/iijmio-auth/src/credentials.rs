//! Credential storage for the developer id and access token
//!
//! The developer id is configuration and never changes at runtime. The access
//! token is written only by the redirect listener once it captures a token;
//! every API call reads the current value at send time.
//!
//! `FileCredentialStore` persists the token as JSON using atomic temp-file +
//! rename. `MemoryCredentialStore` keeps it in process, for embedding and tests.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by `CredentialStore` methods, keeping the trait dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Snapshot of the credentials at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub developer_id: Option<Secret<String>>,
    pub access_token: Option<Secret<String>>,
}

impl Credential {
    /// Developer id, treating an empty string as unset.
    pub fn developer_id(&self) -> Option<&str> {
        self.developer_id
            .as_ref()
            .map(|id| id.expose().as_str())
            .filter(|id| !id.is_empty())
    }

    /// Access token, treating an empty string as unset.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_ref()
            .map(|token| token.expose().as_str())
            .filter(|token| !token.is_empty())
    }
}

/// Get/set access to the two named credential values.
///
/// Implementations must be cheap to `load()`: it is called before every request.
pub trait CredentialStore: Send + Sync {
    /// Current developer id and access token.
    fn load(&self) -> BoxFuture<'_, Credential>;

    /// Replace the access token. Only the redirect listener calls this.
    fn store_access_token(&self, token: String) -> BoxFuture<'_, Result<()>>;
}

/// In-process credential store.
pub struct MemoryCredentialStore {
    developer_id: Option<Secret<String>>,
    access_token: Mutex<Option<Secret<String>>>,
}

impl MemoryCredentialStore {
    pub fn new(developer_id: Option<String>) -> Self {
        Self {
            developer_id: developer_id.map(Secret::new),
            access_token: Mutex::new(None),
        }
    }

    /// Seed an access token, e.g. one captured in an earlier session.
    pub fn with_access_token(self, token: impl Into<String>) -> Self {
        Self {
            access_token: Mutex::new(Some(Secret::new(token.into()))),
            ..self
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> BoxFuture<'_, Credential> {
        Box::pin(async move {
            Credential {
                developer_id: self.developer_id.clone(),
                access_token: self.access_token.lock().await.clone(),
            }
        })
    }

    fn store_access_token(&self, token: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            *self.access_token.lock().await = Some(Secret::new(token));
            debug!("stored access token in memory");
            Ok(())
        })
    }
}

/// On-disk shape of the token file.
#[derive(Serialize, Deserialize)]
struct TokenFile {
    access_token: String,
    /// Unix seconds at which the token was captured
    captured_at: u64,
}

/// Credential store that persists the access token to a JSON file.
///
/// The tokio Mutex serializes writes; reads clone the in-memory copy.
pub struct FileCredentialStore {
    path: PathBuf,
    developer_id: Option<Secret<String>>,
    access_token: Mutex<Option<Secret<String>>>,
}

impl FileCredentialStore {
    /// Load a previously captured token from `path`.
    ///
    /// A missing file is a cold start with no token; nothing is written until
    /// a token is captured.
    pub async fn load(path: PathBuf, developer_id: Option<Secret<String>>) -> Result<Self> {
        let access_token = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let file: TokenFile = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                captured_at = file.captured_at,
                "loaded access token"
            );
            Some(Secret::new(file.access_token))
        } else {
            info!(path = %path.display(), "credential file not found, starting without a token");
            None
        };

        Ok(Self {
            path,
            developer_id,
            access_token: Mutex::new(access_token),
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> BoxFuture<'_, Credential> {
        Box::pin(async move {
            Credential {
                developer_id: self.developer_id.clone(),
                access_token: self.access_token.lock().await.clone(),
            }
        })
    }

    fn store_access_token(&self, token: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut current = self.access_token.lock().await;
            let captured_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let file = TokenFile {
                access_token: token,
                captured_at,
            };
            write_atomic(&self.path, &file).await?;
            *current = Some(Secret::new(file.access_token));
            Ok(())
        })
    }
}

/// Write the token file atomically with 0600 permissions (unix).
async fn write_atomic(path: &Path, data: &TokenFile) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".iijmio-credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted access token");
    Ok(())
}
