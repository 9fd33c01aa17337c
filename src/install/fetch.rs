use super::template::UrlTemplate;
use super::Installer;
use crate::download::{
    extract_archive, fetch_to, find_executable_in_extracted, ArchiveKind, Source,
};
use crate::error::{BoxError, GenvError, Result};
use crate::platform::{make_executable, Platform};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const TEMPLATE_PROBE_VERSION: &str = "1.0.0";

/// Downloads a pre-built artifact (raw binary or archive) from a URL template.
#[derive(Debug, Clone)]
pub struct FetchInstaller {
    template: UrlTemplate,
    platform: Platform,
    cancel: CancellationToken,
}

impl FetchInstaller {
    /// Fails with [`GenvError::Template`] if the template references anything
    /// other than `Version`, `Os` or `Arch`.
    pub fn new(template: &str, platform: Platform, cancel: CancellationToken) -> Result<Self> {
        let template = UrlTemplate::parse(template)?;
        let probe = template.render(TEMPLATE_PROBE_VERSION, &platform);
        tracing::debug!("Validated download URL template, e.g. {}", probe);
        Ok(Self {
            template,
            platform,
            cancel,
        })
    }

    pub fn download_url(&self, version: &str) -> String {
        self.template.render(version, &self.platform)
    }

    async fn fetch(&self, url: &str, dst: &Path) -> Result<(), BoxError> {
        let parent = dst
            .parent()
            .ok_or_else(|| format!("{} has no parent directory", dst.display()))?;
        fs::create_dir_all(parent)?;
        let wanted = dst
            .file_name()
            .ok_or_else(|| format!("{} has no file name", dst.display()))?
            .to_string_lossy()
            .to_string();

        // Staged next to the destination so the final move is a rename.
        let staging = tempfile::Builder::new()
            .prefix(".genv-fetch-")
            .tempdir_in(parent)?;

        let source = Source::parse(url);
        let artifact_name = source.file_name().unwrap_or_else(|| wanted.clone());
        let download_dir = staging.path().join("download");
        fs::create_dir_all(&download_dir)?;
        let artifact = download_dir.join(&artifact_name);

        fetch_to(&source, &artifact, &self.cancel).await?;

        let binary = match ArchiveKind::detect(&artifact_name) {
            Some(kind) => {
                let extract_dir = staging.path().join("extract");
                fs::create_dir_all(&extract_dir)?;
                extract_archive(&artifact, kind, &extract_dir)?;
                find_executable_in_extracted(&extract_dir, &wanted).ok_or_else(|| {
                    format!("archive {} does not contain {}", artifact_name, wanted)
                })?
            }
            None => artifact,
        };

        make_executable(&binary)?;
        fs::rename(&binary, dst)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Installer for FetchInstaller {
    async fn install(&self, version: &str, dst: &Path) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GenvError::cancelled(format!("Download of {}", version)));
        }

        let url = self.download_url(version);
        tracing::info!("Downloading {} from {}", version, url);

        if let Err(source) = self.fetch(&url, dst).await {
            if self.cancel.is_cancelled() {
                return Err(GenvError::cancelled(format!("Download of {}", version)));
            }
            tracing::warn!("Failed to download {}: {}", url, source);
            return Err(GenvError::Fetch {
                version: version.to_string(),
                url,
                source,
            });
        }

        tracing::info!("Installed {} to {}", version, dst.display());
        Ok(())
    }

    fn available(&self) -> bool {
        true
    }
}
