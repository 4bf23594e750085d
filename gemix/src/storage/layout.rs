//! Local storage layout

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Local storage layout under the gemix home directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Directory holding one subdirectory per managed cluster
    pub fn clusters_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("storage").join("cluster"))
    }

    /// Directory of a single cluster
    pub fn cluster_dir(&self, name: &str) -> Dir {
        self.clusters_dir().subdir(name)
    }

    /// Metadata file of a cluster
    pub fn cluster_meta_file(&self, name: &str) -> File {
        self.cluster_dir(name).file("meta.json")
    }

    /// Package cache for one version and platform
    pub fn package_dir(&self, version: &str, os: &str, arch: &str) -> Dir {
        Dir::new(
            self.base_dir
                .join("cache")
                .join(version)
                .join(format!("{}-{}", os, arch)),
        )
    }

    /// Staging directory for the configs generated for a cluster, one
    /// subdirectory per host
    pub fn staging_dir(&self, cluster: &str) -> Dir {
        Dir::new(self.base_dir.join("staging").join(cluster))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::GemixError> {
        self.clusters_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("GEMIX_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::utils::home_dir().join(".gemix"));

        Self::new(base_dir)
    }
}
