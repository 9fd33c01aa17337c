//! Version lifecycle for one managed tool.
//!
//! Each version moves through `NotInstalled -> Installed -> (Current)`:
//! - a version is installed iff `home/name/version/binary[.exe]` exists
//! - the current version is whatever `.profile.json` points at
//!
//! Only profile mutation is serialized through the tool's lock; installs may
//! race across processes and the last one to finish wins.

use crate::error::{GenvError, Result};
use crate::install::Installer;
use crate::lock::LockSlot;
use crate::platform::{resolve_binary_path, Platform};
use crate::profile::ProfileStore;
use crate::version::{compare_versions, validate_version};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem root and host identity, passed in rather than read from the
/// process so tests can pick both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvContext {
    pub home_dir: PathBuf,
    pub platform: Platform,
}

impl EnvContext {
    pub fn new(home_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            home_dir: home_dir.into(),
            platform,
        }
    }

    pub fn current(home_dir: impl Into<PathBuf>) -> Self {
        Self::new(home_dir, Platform::current())
    }
}

pub struct VersionManager {
    ctx: EnvContext,
    name: String,
    binary_name: String,
    installer: Box<dyn Installer>,
    profile: ProfileStore,
    lock: LockSlot,
}

impl VersionManager {
    pub fn new(
        ctx: EnvContext,
        name: impl Into<String>,
        binary_name: impl Into<String>,
        installer: Box<dyn Installer>,
    ) -> Self {
        let name = name.into();
        let profile = ProfileStore::new(&ctx.home_dir.join(&name));
        Self {
            ctx,
            name,
            binary_name: binary_name.into(),
            installer,
            profile,
            lock: LockSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Root shared by every managed tool.
    pub fn home_dir(&self) -> &Path {
        &self.ctx.home_dir
    }

    pub fn platform(&self) -> &Platform {
        &self.ctx.platform
    }

    pub fn installer(&self) -> &dyn Installer {
        self.installer.as_ref()
    }

    /// `home/name`, holding one directory per installed version plus the
    /// profile and lock files.
    pub fn tool_home(&self) -> PathBuf {
        self.ctx.home_dir.join(&self.name)
    }

    pub fn binary_path(&self, version: &str) -> PathBuf {
        resolve_binary_path(
            &self.ctx.home_dir,
            &self.name,
            version,
            &self.binary_name,
            &self.ctx.platform,
        )
    }

    pub fn installed(&self, version: &str) -> Result<bool> {
        validate_version(version)?;
        let path = self.binary_path(version);
        path.try_exists()
            .map_err(|e| GenvError::io(format!("Could not check {}", path.display()), e))
    }

    /// Installs `version` unless it is already present. The installer is
    /// never invoked for an installed version.
    pub async fn install(&self, version: &str) -> Result<()> {
        if self.installed(version)? {
            tracing::info!("{} {} is already installed", self.name, version);
            return Ok(());
        }

        let dst = self.binary_path(version);
        let version_dir = version_dir_of(&dst)?;
        let created = !version_dir.exists();
        fs::create_dir_all(version_dir)
            .map_err(|e| GenvError::io(format!("Failed to create {}", version_dir.display()), e))?;

        tracing::info!("Installing {} {} to {}", self.name, version, dst.display());
        let outcome = match self.installer.install(version, &dst).await {
            Ok(()) if dst.exists() => Ok(()),
            Ok(()) => Err(GenvError::InstallIncomplete {
                version: version.to_string(),
                path: dst.clone(),
            }),
            Err(e) => Err(e),
        };

        // Another process may have finished the same version meanwhile.
        if outcome.is_err() && created && !dst.exists() {
            if let Err(e) = fs::remove_dir_all(version_dir) {
                tracing::warn!("Failed to clean up {}: {}", version_dir.display(), e);
            }
        }
        if outcome.is_ok() {
            tracing::info!("Installed {} {}", self.name, version);
        }
        outcome
    }

    /// Pins `version` as current, or unpins when `version` is empty.
    ///
    /// Does not install: a missing version fails with
    /// [`GenvError::NotInstalled`] and leaves the profile untouched.
    pub fn use_version(&self, version: &str) -> Result<()> {
        if !version.is_empty() && !self.installed(version)? {
            return Err(GenvError::NotInstalled {
                tool: self.name.clone(),
                version: version.to_string(),
            });
        }

        self.lock.with_lock(&self.name, &self.tool_home(), || {
            let mut profile = self.profile.read()?;
            profile.version = if version.is_empty() {
                None
            } else {
                Some(version.to_string())
            };
            self.profile.write(&profile)
        })?;

        if version.is_empty() {
            tracing::info!("Unpinned {}", self.name);
        } else {
            tracing::info!("Now using {} {}", self.name, version);
        }
        Ok(())
    }

    /// Removes `version`; clears the profile if it was current. Removing a
    /// version that is not installed is a no-op.
    pub fn uninstall(&self, version: &str) -> Result<()> {
        if !self.installed(version)? {
            tracing::debug!("{} {} is not installed, nothing to remove", self.name, version);
            return Ok(());
        }

        let dst = self.binary_path(version);
        let version_dir = version_dir_of(&dst)?;
        tracing::info!("Removing directory: {}", version_dir.display());
        fs::remove_dir_all(version_dir)
            .map_err(|e| GenvError::io(format!("Failed to remove {}", version_dir.display()), e))?;

        if self.current_version()?.as_deref() == Some(version) {
            self.use_version("")?;
        }
        Ok(())
    }

    /// Names of the version directories under [`tool_home`](Self::tool_home),
    /// semver versions first in ascending order.
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let home = self.tool_home();
        let entries = match fs::read_dir(&home) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GenvError::io(format!("Could not read {}", home.display()), e)),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| GenvError::io(format!("Could not read {}", home.display()), e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| GenvError::io(format!("Could not stat {}", entry.path().display()), e))?
                .is_dir();
            if is_dir {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        versions.sort_by(|a, b| compare_versions(a, b));
        Ok(versions)
    }

    pub fn current_version(&self) -> Result<Option<String>> {
        Ok(self.profile.read()?.version.filter(|v| !v.is_empty()))
    }

    pub fn current_binary_path(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .current_version()?
            .map(|version| self.binary_path(&version)))
    }
}

fn version_dir_of(binary_path: &Path) -> Result<&Path> {
    binary_path.parent().ok_or_else(|| {
        GenvError::io(
            format!("{} has no parent directory", binary_path.display()),
            io::ErrorKind::InvalidInput.into(),
        )
    })
}
