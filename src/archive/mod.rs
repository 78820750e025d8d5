//! Manifest archive: `<home>/deployments/<owner>.<dseq>.yaml`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::model::DeploymentId;


pub const DEPLOYMENTS_DIR: &str = "deployments";
pub const MANIFEST_EXT: &str = "yaml";

/// Locates archived manifests under a home directory.
#[derive(Debug, Clone)]
pub struct Archive {
    home: PathBuf,
}

impl Archive {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn dir(&self) -> PathBuf {
        self.home.join(DEPLOYMENTS_DIR)
    }

    pub fn file_name(id: &DeploymentId) -> String {
        format!("{}.{}.{}", id.owner, id.dseq, MANIFEST_EXT)
    }

    pub fn path(&self, id: &DeploymentId) -> PathBuf {
        self.dir().join(Self::file_name(id))
    }

    /// Creates the home and deployments directories if missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| Error::Archive { path: dir, source })
    }

    /// Writes the manifest for `id`, replacing any previous copy.
    pub async fn store(&self, id: &DeploymentId, manifest: &[u8]) -> Result<PathBuf> {
        self.ensure_dirs().await?;
        let path = self.path(id);
        tokio::fs::write(&path, manifest)
            .await
            .map_err(|source| Error::Archive {
                path: path.clone(),
                source,
            })?;
        info!(
            component = "archive",
            event = "stored",
            path = %path.display(),
            bytes = manifest.len(),
            "manifest archived"
        );
        Ok(path)
    }

    pub async fn load(&self, id: &DeploymentId) -> Result<Vec<u8>> {
        let path = self.path(id);
        tokio::fs::read(&path)
            .await
            .map_err(|source| Error::Archive { path, source })
    }
}
