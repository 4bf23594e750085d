//! Local directories under the gemix home

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::GemixError;
use crate::filesys::file::File;

#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True only when the path exists and is a directory
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .is_ok_and(|m| m.is_dir())
    }

    pub async fn create(&self) -> Result<(), GemixError> {
        Ok(fs::create_dir_all(&self.path).await?)
    }

    /// Remove recursively. Missing directories are fine.
    pub async fn delete(&self) -> Result<(), GemixError> {
        match fs::remove_dir_all(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Fresh `<tmp>/<prefix>-<uuid>` directory
    pub async fn create_temp_dir(prefix: &str) -> Result<Dir, GemixError> {
        let dir = Dir::new(std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4())));
        dir.create().await?;
        Ok(dir)
    }
}
