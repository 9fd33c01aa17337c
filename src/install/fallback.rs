use super::Installer;
use crate::error::{GenvError, Result};
use crate::version::{is_semver, toggle_v_prefix};
use std::path::Path;

/// Tries `primary`, then `secondary`.
///
/// Distribution channels disagree on whether release tags carry a `v`, so a
/// semver version that fails is retried once with the prefix toggled before
/// moving on. Anything else (commit hashes, `latest`) is passed through
/// untouched, once per installer.
pub struct FallbackInstaller {
    primary: Box<dyn Installer>,
    secondary: Box<dyn Installer>,
}

impl FallbackInstaller {
    pub fn new(primary: Box<dyn Installer>, secondary: Box<dyn Installer>) -> Self {
        Self { primary, secondary }
    }

    async fn attempt(
        installer: &dyn Installer,
        version: &str,
        dst: &Path,
        semver: bool,
    ) -> Result<()> {
        let err = match installer.install(version, dst).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if !semver || matches!(err, GenvError::Cancelled { .. }) {
            return Err(err);
        }

        let alternate = toggle_v_prefix(version);
        tracing::warn!("Install of {} failed ({}), retrying as {}", version, err, alternate);
        installer.install(&alternate, dst).await
    }
}

#[async_trait::async_trait]
impl Installer for FallbackInstaller {
    async fn install(&self, version: &str, dst: &Path) -> Result<()> {
        let semver = is_semver(version);

        match Self::attempt(self.primary.as_ref(), version, dst, semver).await {
            Ok(()) => Ok(()),
            Err(err @ GenvError::Cancelled { .. }) => Err(err),
            Err(err) => {
                tracing::warn!("Primary installer failed for {}: {}; trying fallback", version, err);
                Self::attempt(self.secondary.as_ref(), version, dst, semver).await
            }
        }
    }

    fn available(&self) -> bool {
        self.primary.available() || self.secondary.available()
    }
}
