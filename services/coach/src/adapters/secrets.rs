//! services/coach/src/adapters/secrets.rs
//!
//! A `SecretStore` that keeps the API key in a single owner-only file.

use async_trait::async_trait;
use photo_coach_core::ports::{PortError, PortResult, SecretStore};
use std::io;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Debug)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn unexpected(e: io::Error) -> PortError {
    PortError::Unexpected(format!("Secret store: {}", e))
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_api_key(&self) -> PortResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let key = contents.trim();
                Ok((!key.is_empty()).then(|| key.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unexpected(e)),
        }
    }

    async fn set_api_key(&self, key: &str) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(unexpected)?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await.map_err(unexpected)?;

        // `mode` only applies on creation; tighten a file that already existed.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(unexpected)?;
        }

        file.write_all(key.trim().as_bytes())
            .await
            .map_err(unexpected)?;
        file.flush().await.map_err(unexpected)?;
        Ok(())
    }

    async fn delete_api_key(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unexpected(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn key_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets").join("api_key"));

        assert_eq!(store.get_api_key().await.unwrap(), None);
        assert!(!store.has_api_key().await.unwrap());

        store.set_api_key("  sk-test\n").await.unwrap();
        assert_eq!(store.get_api_key().await.unwrap().as_deref(), Some("sk-test"));
        assert!(store.has_api_key().await.unwrap());

        store.delete_api_key().await.unwrap();
        assert_eq!(store.get_api_key().await.unwrap(), None);
        store.delete_api_key().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key");
        FileSecretStore::new(&path).set_api_key("sk-test").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existing_loose_file_is_tightened_before_writing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key");
        std::fs::write(&path, "sk-old-and-longer").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSecretStore::new(&path);
        store.set_api_key("sk-new").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get_api_key().await.unwrap().as_deref(), Some("sk-new"));
    }
}
