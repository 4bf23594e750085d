//! Loading a managed cluster and resolving how to reach its hosts

use std::sync::Arc;

use secrecy::SecretString;

use crate::errors::GemixError;
use crate::executor::ssh::RemoteHost;
use crate::filesys::file::File;
use crate::storage::cluster::{load_cluster, ClusterAuth, ClusterMeta};
use crate::storage::layout::StorageLayout;
use crate::topology::spec::Specification;
use crate::utils::is_valid_cluster_name;

/// Environment variable holding the SSH private key path
pub const ENV_SSH_KEY: &str = "GEMIX_SSH_KEY";

/// Environment variable holding the SSH password
pub const ENV_SSH_PASSWORD: &str = "GEMIX_SSH_PASSWORD";

/// Pick the auth method: explicit flag, then environment, else an error.
/// A key and a password together are rejected at either level.
pub fn resolve_auth<F>(
    key: Option<String>,
    password: Option<String>,
    lookup: F,
) -> Result<ClusterAuth, GemixError>
where
    F: Fn(&str) -> Option<String>,
{
    fn pick(key: Option<String>, password: Option<String>, source: &str) -> Result<Option<ClusterAuth>, GemixError> {
        match (key, password) {
            (Some(_), Some(_)) => Err(GemixError::ValidationError(format!(
                "both an SSH key and a password were given through {}",
                source
            ))),
            (Some(path), None) => Ok(Some(ClusterAuth::Key { path })),
            (None, Some(password)) => Ok(Some(ClusterAuth::Password {
                password: SecretString::from(password),
            })),
            (None, None) => Ok(None),
        }
    }

    if let Some(auth) = pick(key, password, "flags")? {
        return Ok(auth);
    }
    let from_env = pick(
        lookup(ENV_SSH_KEY).filter(|v| !v.is_empty()),
        lookup(ENV_SSH_PASSWORD).filter(|v| !v.is_empty()),
        "the environment",
    )?;
    from_env.ok_or_else(|| {
        GemixError::ValidationError(format!(
            "no SSH auth given: pass --key or --password, or set {} or {}",
            ENV_SSH_KEY, ENV_SSH_PASSWORD
        ))
    })
}

pub fn validate_cluster_name(name: &str) -> Result<(), GemixError> {
    if is_valid_cluster_name(name) {
        Ok(())
    } else {
        Err(GemixError::ValidationError(format!(
            "invalid cluster name {:?}: only letters, digits, '-' and '_' are allowed",
            name
        )))
    }
}

/// One connection descriptor per distinct host of the topology
pub fn remote_hosts(topology: &Specification, user: &str, auth: &ClusterAuth) -> Vec<RemoteHost> {
    topology
        .hosts()
        .into_iter()
        .map(|ip| RemoteHost {
            ssh_port: topology.ssh_port_of(&ip),
            ip,
            user: user.to_string(),
            auth: auth.to_ssh_auth(),
        })
        .collect()
}

/// A deployed cluster, re-derived from its metadata
#[derive(Debug, Clone)]
pub struct Cluster {
    pub meta: ClusterMeta,
    pub topology: Arc<Specification>,
}

impl Cluster {
    pub async fn load(layout: &StorageLayout, name: &str) -> Result<Self, GemixError> {
        validate_cluster_name(name)?;
        let meta = load_cluster(&layout.cluster_meta_file(name)).await?;
        let topology = Specification::load(&File::new(&meta.topology_path)).await?;
        topology.validate()?;
        Ok(Self {
            meta,
            topology: Arc::new(topology),
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    pub fn remote_hosts(&self) -> Vec<RemoteHost> {
        remote_hosts(&self.topology, &self.meta.user, &self.meta.auth)
    }
}
