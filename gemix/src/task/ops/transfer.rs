//! Leaves that move files

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::errors::GemixError;
use crate::executor::actions::{exec_upload_action, UploadAction, UploadOutcome};
use crate::filesys::dir::Dir;
use crate::http::client::PackageClient;
use crate::task::{Task, TaskContext};

/// Where the extracted archive keeps its binaries
pub fn package_bin_dir(package_dir: &Dir) -> Dir {
    package_dir.subdir("usr").subdir("bin")
}

/// Idempotent upload of one file
pub struct Upload {
    host: String,
    action: UploadAction,
}

impl Upload {
    pub fn new(host: impl Into<String>, action: UploadAction) -> Self {
        Self {
            host: host.into(),
            action,
        }
    }
}

#[async_trait]
impl Task for Upload {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.host).await?;
        match exec_upload_action(executor.as_ref(), &self.action).await? {
            UploadOutcome::Uploaded => ctx.progress(format!("uploaded {}", self.action.file_name)),
            UploadOutcome::Skipped => ctx.progress(format!("{} already present", self.action.file_name)),
        }
        Ok(())
    }
}

impl fmt::Display for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Upload: host={}, local={}, remote={}",
            self.host,
            self.action.local_path(),
            self.action.remote_path()
        )
    }
}

/// Fetch and unpack the release archive for one platform
pub struct Download {
    client: PackageClient,
    version: String,
    os: String,
    arch: String,
    dir: Dir,
}

impl Download {
    pub fn new(
        client: PackageClient,
        version: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
        dir: Dir,
    ) -> Self {
        Self {
            client,
            version: version.into(),
            os: os.into(),
            arch: arch.into(),
            dir,
        }
    }
}

/// Unpack a `.tar.gz` into `dest` on the blocking pool
async fn extract(archive: &Path, dest: &Path) -> Result<(), GemixError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), GemixError> {
        let file = std::fs::File::open(&archive)?;
        let mut unpacker = tar::Archive::new(GzDecoder::new(file));
        unpacker.unpack(&dest).map_err(|e| {
            GemixError::ExecutionError(format!("failed to extract {}: {}", archive.display(), e))
        })
    })
    .await
    .map_err(|e| GemixError::Internal(format!("extract task aborted: {}", e)))?
}

#[async_trait]
impl Task for Download {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let name = PackageClient::package_name(&self.version, &self.os, &self.arch);
        if package_bin_dir(&self.dir).exists().await {
            ctx.progress(format!("{} cached", name));
            return Ok(());
        }

        let archive = self.dir.file(&name);
        if archive.exists().await {
            debug!("{} already downloaded", name);
        } else {
            let url = self.client.package_url(&self.version, &self.os, &self.arch)?;
            ctx.progress(format!("downloading {}", url));
            self.client.download(&url, &archive).await?;
        }

        ctx.progress(format!("extracting {}", name));
        extract(archive.path(), self.dir.path()).await?;
        info!("Extracted {} into {}", name, self.dir.path().display());
        Ok(())
    }
}

impl fmt::Display for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Download: component=openGemini, version={}, os={}, arch={}",
            self.version, self.os, self.arch
        )
    }
}
