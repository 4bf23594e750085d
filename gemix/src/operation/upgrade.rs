//! Upgrade: stop, uninstall, install the new version, start

use std::future::Future;

use tracing::{error, info};

use crate::errors::GemixError;
use crate::filesys::file::File;
use crate::operation::cluster::Cluster;
use crate::operation::fsm::{ClusterEvent, ClusterFsm};
use crate::operation::install::InstallRequest;
use crate::operation::ClusterManager;

/// Run one stage between its begin and done events. A failing stage moves
/// the machine to `Failed` and its error is returned unchanged.
async fn advance<F>(
    fsm: &mut ClusterFsm,
    begin: ClusterEvent,
    done: ClusterEvent,
    stage: F,
) -> Result<(), GemixError>
where
    F: Future<Output = Result<(), GemixError>>,
{
    fsm.process(begin)?;
    match stage.await {
        Ok(()) => fsm.process(done),
        Err(e) => {
            fsm.process(ClusterEvent::Fail(e.to_string()))?;
            error!(
                "upgrade stopped while {}: {}",
                fsm.failed_in().map(|s| s.to_string()).unwrap_or_default(),
                e
            );
            Err(e)
        }
    }
}

impl ClusterManager {
    /// Not atomic: a failed stage leaves the cluster where the previous
    /// stage left it.
    pub async fn upgrade(&self, name: &str, version: &str) -> Result<ClusterFsm, GemixError> {
        let layout = &self.options().layout;
        let old = Cluster::load(layout, name).await?;
        if old.version().trim_start_matches('v') == version.trim_start_matches('v') {
            return Err(GemixError::ValidationError(format!(
                "cluster {} already runs version {}",
                name, version
            )));
        }

        // Uninstall drops the local records, keep what install needs
        let topology_yaml = File::new(&old.meta.topology_path).read_string().await?;
        let request = InstallRequest {
            name: name.to_string(),
            version: version.to_string(),
            user: old.meta.user.clone(),
            auth: old.meta.auth.clone(),
            topology_yaml,
        };

        let ctx = self.task_context();
        let mut fsm = ClusterFsm::new();
        info!("Upgrading {} from {} to {}", name, old.version(), version);

        advance(&mut fsm, ClusterEvent::Stop, ClusterEvent::Stopped, self.stop_with(&ctx, &old)).await?;
        advance(
            &mut fsm,
            ClusterEvent::Uninstall,
            ClusterEvent::Uninstalled,
            self.uninstall_with(&ctx, &old),
        )
        .await?;
        advance(
            &mut fsm,
            ClusterEvent::Install,
            ClusterEvent::Installed,
            self.install_with(&ctx, request),
        )
        .await?;
        advance(&mut fsm, ClusterEvent::Start, ClusterEvent::Started, async {
            let upgraded = Cluster::load(layout, name).await?;
            self.start_with(&ctx, &upgraded).await
        })
        .await?;

        info!("Cluster {} upgraded to {}", name, version);
        Ok(fsm)
    }
}
