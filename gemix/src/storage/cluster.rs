//! Cluster metadata file management

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::errors::GemixError;
use crate::executor::ssh::SshAuth;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::utils::is_valid_cluster_name;

/// How gemix authenticates against the cluster hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterAuth {
    /// Private key on the control machine
    Key { path: String },

    /// SSH password
    Password {
        #[serde(serialize_with = "expose", deserialize_with = "conceal")]
        password: SecretString,
    },
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn conceal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl ClusterAuth {
    pub fn to_ssh_auth(&self) -> SshAuth {
        match self {
            ClusterAuth::Key { path } => SshAuth::Key(path.clone()),
            ClusterAuth::Password { password } => SshAuth::Password(password.clone()),
        }
    }
}

/// Everything later commands need to re-derive a deployed cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMeta {
    pub name: String,

    /// Deployed openGemini version
    pub version: String,

    /// SSH login user
    pub user: String,

    pub auth: ClusterAuth,

    /// Copy of the topology file taken at install time
    pub topology_path: String,

    pub created_at: DateTime<Utc>,
}

impl ClusterMeta {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        user: impl Into<String>,
        auth: ClusterAuth,
        topology_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            user: user.into(),
            auth,
            topology_path: topology_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// Load the metadata of a cluster
pub async fn load_cluster(meta_file: &File) -> Result<ClusterMeta, GemixError> {
    if !meta_file.exists().await {
        return Err(GemixError::NotFound(format!(
            "cluster metadata {} does not exist",
            meta_file.path().display()
        )));
    }

    let meta: ClusterMeta = meta_file.read_json().await?;
    if !is_valid_cluster_name(&meta.name) {
        return Err(GemixError::ValidationError(format!(
            "invalid cluster name in {}: {}",
            meta_file.path().display(),
            meta.name
        )));
    }
    Ok(meta)
}

/// Save cluster metadata, readable by the owner only
pub async fn save_cluster(meta_file: &File, meta: &ClusterMeta) -> Result<(), GemixError> {
    meta_file.write_json(meta).await?;
    meta_file.set_permissions_600().await?;
    Ok(())
}

/// Remove everything gemix stored locally for a cluster
pub async fn remove_cluster(cluster_dir: &Dir) -> Result<(), GemixError> {
    cluster_dir.delete().await?;
    info!("Removed {}", cluster_dir.path().display());
    Ok(())
}
