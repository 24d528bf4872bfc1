//! Managed library location for finished exports.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::move_file;

/// Answer to an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    Granted,
    Denied,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::Granted => "granted",
            AuthorizationStatus::Denied => "denied",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuthorizationStatus::Granted)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "granted" | "authorized" => Ok(AuthorizationStatus::Granted),
            "denied" => Ok(AuthorizationStatus::Denied),
            other => Err(StorageError::config_error(format!(
                "Unknown authorization status: {other}"
            ))),
        }
    }
}

/// The persistent store exported files end up in.
#[async_trait]
pub trait StorageAuthority: Send + Sync {
    /// Ask for permission to write into the store.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Take ownership of `path` and store it as `file_name`, returning
    /// where it now lives. The stored name may differ on collision.
    async fn import_file(&self, path: &Path, file_name: &str) -> StorageResult<PathBuf>;
}

/// Directory-backed library.
///
/// Imports move the file in (the source is consumed) and never overwrite
/// an existing entry: a name collision gets a numeric suffix.
#[derive(Debug)]
pub struct LibraryStorage {
    root: PathBuf,
    policy: AuthorizationStatus,
    /// Serializes name reservation so concurrent imports can't collide.
    import_lock: Mutex<()>,
}

impl LibraryStorage {
    pub fn new(root: impl Into<PathBuf>, policy: AuthorizationStatus) -> Self {
        Self {
            root: root.into(),
            policy,
            import_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First free destination for `file_name` inside the library.
    async fn free_destination(&self, file_name: &str) -> StorageResult<PathBuf> {
        let candidate = self.root.join(file_name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let as_path = Path::new(file_name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());
        let extension = as_path.extension().map(|e| e.to_string_lossy().to_string());

        for n in 1u32.. {
            let name = match &extension {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            let candidate = self.root.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Err(StorageError::import_failed(format!(
            "No free name for {file_name}"
        )))
    }
}

#[async_trait]
impl StorageAuthority for LibraryStorage {
    async fn request_authorization(&self) -> AuthorizationStatus {
        if !self.policy.is_granted() {
            warn!(library = %self.root.display(), "Library access not authorized");
        }
        self.policy
    }

    async fn import_file(&self, path: &Path, file_name: &str) -> StorageResult<PathBuf> {
        if !self.policy.is_granted() {
            return Err(StorageError::import_failed("Library access not authorized"));
        }

        if !tokio::fs::try_exists(path).await? {
            return Err(StorageError::SourceNotFound(path.to_path_buf()));
        }

        if file_name.is_empty() || Path::new(file_name).file_name() != Some(OsStr::new(file_name)) {
            return Err(StorageError::import_failed(format!("Invalid library name: {file_name:?}")));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let _guard = self.import_lock.lock().await;
        let destination = self.free_destination(file_name).await?;
        move_file(path, &destination).await?;

        info!(
            source = %path.display(),
            destination = %destination.display(),
            "Imported file into library"
        );

        Ok(destination)
    }
}
