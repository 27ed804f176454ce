//! On-disk persistence of the active session for the command-line client.

use std::path::{Path, PathBuf};

use tracing::debug;

use donorlink_core::error::AppError;
use donorlink_entity::session::Session;

/// A JSON file holding the whole session as one value.
///
/// Written through a temporary file and renamed into place, so a reader
/// never sees a half-written session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Creates a handle for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved session, if any.
    pub async fn load(&self) -> Result<Option<Session>, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let session: Session = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), user_id = %session.user_id, "Loaded session");
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::internal(format!(
                "Failed to read session file {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Saves the session, replacing any previous one.
    pub async fn save(&self, session: &Session) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(session)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Saved session");
        Ok(())
    }

    /// Removes the saved session. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool, AppError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donorlink_core::types::id::UserId;
    use donorlink_entity::user::UserRole;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));
        assert!(file.load().await.unwrap().is_none());

        let session =
            Session::new(UserId::new(), [UserRole::Donor, UserRole::Recipient], "tok").unwrap();
        file.save(&session).await.unwrap();

        let loaded = file.load().await.unwrap().expect("saved session");
        assert_eq!(loaded, session);
        assert_eq!(loaded.credential.expose(), "tok");

        assert!(file.clear().await.unwrap());
        assert!(!file.clear().await.unwrap());
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(SessionFile::new(path).load().await.is_err());
    }
}
