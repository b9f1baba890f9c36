use super::error::{Result, StoreError};
use fcmcore::gcm::GcmCredentials;
use fcmcore::store::Credentials;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::fs;

/// Owns the credentials for one client, in memory and in a JSON file.
///
/// The file is read once, in [`CredentialStore::open`]. Every mutation
/// rewrites it from a snapshot taken under the write lock, so the file
/// always holds a state the client actually had.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Option<Credentials>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl CredentialStore {
    /// Loads `path` if it exists. An unreadable or corrupt file is logged
    /// and treated as absent, so the next registration replaces it.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match Self::read(&path).await {
            Ok(Some(creds)) => {
                debug!(target: "Client", "Loaded FCM credentials from {}", path.display());
                Some(creds)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    target: "Client",
                    "Failed to load FCM credentials from {}; a fresh registration will overwrite them: {e}",
                    path.display()
                );
                None
            }
        };
        Self::with_state(path, state)
    }

    fn with_state(path: PathBuf, state: Option<Credentials>) -> Self {
        Self {
            path,
            state: Mutex::new(state),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read(path: &Path) -> Result<Option<Credentials>> {
        match fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credentials>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A detached copy of the current credentials.
    pub fn snapshot(&self) -> Option<Credentials> {
        self.lock().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|c| !c.token.is_empty())
            .map(|c| c.token.clone())
    }

    pub fn persistent_ids(&self) -> Vec<String> {
        self.lock()
            .as_ref()
            .map(|c| c.persistent_ids.to_vec())
            .unwrap_or_default()
    }

    /// Replaces everything, as after a fresh registration.
    pub async fn replace(&self, credentials: Credentials) -> Result<()> {
        *self.lock() = Some(credentials);
        self.persist().await
    }

    /// Overwrites the device pair, keeping token and processed ids.
    pub async fn update_gcm(&self, gcm: GcmCredentials) -> Result<()> {
        {
            let mut state = self.lock();
            let creds = state.as_mut().ok_or(StoreError::Empty)?;
            creds.gcm = gcm;
        }
        self.persist().await
    }

    /// Appends a processed delivery id and saves. Does nothing before
    /// registration or for an empty id.
    pub async fn record_persistent_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.lock();
            let Some(creds) = state.as_mut() else {
                return Ok(());
            };
            creds.persistent_ids.push(id);
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().ok_or(StoreError::Empty)?;
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &data).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(target: "Client", "Saved FCM credentials to {}", self.path.display());
        Ok(())
    }
}

/// Writes `data` to a file only the owner can read.
async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}
