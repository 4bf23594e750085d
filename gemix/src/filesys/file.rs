//! Local files gemix reads and writes: settings, cluster records, configs

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::GemixError;

#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn read_string(&self) -> Result<String, GemixError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, GemixError> {
        Ok(serde_json::from_str(&self.read_string().await?)?)
    }

    /// Topology documents
    pub async fn read_yaml<T: DeserializeOwned>(&self) -> Result<T, GemixError> {
        Ok(serde_yaml::from_str(&self.read_string().await?)?)
    }

    /// Generated host configs, read back as a table for merging
    pub async fn read_toml(&self) -> Result<toml::Table, GemixError> {
        Ok(self.read_string().await?.parse::<toml::Table>()?)
    }

    pub async fn write_string(&self, contents: &str) -> Result<(), GemixError> {
        self.write_atomic(contents.as_bytes()).await
    }

    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), GemixError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_atomic(contents.as_bytes()).await
    }

    /// Write through `<name>.tmp` and rename, creating the parent first.
    /// Readers never see a half-written file.
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), GemixError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Owner read/write only. No-op off Unix.
    pub async fn set_permissions_600(&self) -> Result<(), GemixError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}
