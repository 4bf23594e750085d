//! Release archive client

use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::GemixError;
use crate::filesys::file::File;

/// Downloads openGemini release archives from a mirror
#[derive(Debug, Clone)]
pub struct PackageClient {
    client: Client,
    base_url: Url,
}

impl PackageClient {
    /// Create a client for the mirror at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GemixError> {
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| GemixError::ValidationError(format!("invalid mirror url {}: {}", base_url, e)))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// File name of the archive for one version and platform
    pub fn package_name(version: &str, os: &str, arch: &str) -> String {
        format!("openGemini-{}-{}-{}.tar.gz", version.trim_start_matches('v'), os, arch)
    }

    /// `<mirror>/v<version>/openGemini-<version>-<os>-<arch>.tar.gz`
    pub fn package_url(&self, version: &str, os: &str, arch: &str) -> Result<Url, GemixError> {
        let path = format!(
            "v{}/{}",
            version.trim_start_matches('v'),
            Self::package_name(version, os, arch)
        );
        self.base_url
            .join(&path)
            .map_err(|e| GemixError::Internal(format!("failed to build package url: {}", e)))
    }

    /// Stream `url` into `dest`. The file only appears once the body is complete.
    pub async fn download(&self, url: &Url, dest: &File) -> Result<u64, GemixError> {
        debug!("GET {}", url);
        let mut response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Package download failed: {} - {}", status, url);
            return Err(GemixError::ExecutionError(format!(
                "download of {} failed: {}",
                url, status
            )));
        }

        if let Some(parent) = dest.path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.path().with_extension("part");
        let mut out = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        drop(out);
        tokio::fs::rename(&partial, dest.path()).await?;

        info!("Downloaded {} ({} bytes)", url, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url() {
        let client = PackageClient::new(
            "https://github.com/openGemini/openGemini/releases/download/",
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.package_url("1.2.0", "linux", "amd64").unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.com/openGemini/openGemini/releases/download/v1.2.0/openGemini-1.2.0-linux-amd64.tar.gz"
        );
    }

    #[test]
    fn test_version_prefix_is_normalized() {
        assert_eq!(
            PackageClient::package_name("v1.2.0", "linux", "arm64"),
            "openGemini-1.2.0-linux-arm64.tar.gz"
        );
    }

    #[test]
    fn test_invalid_mirror() {
        assert!(PackageClient::new("not a url", Duration::from_secs(5)).is_err());
    }
}
