use super::Installer;
use crate::error::{GenvError, Result};
use crate::platform::make_executable;
use crate::version::LATEST;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// The compiler used to turn a checked-out repository into a binary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Toolchain {
    #[default]
    Go,
    Cargo,
}

impl Toolchain {
    pub fn program(self) -> &'static str {
        match self {
            Toolchain::Go => "go",
            Toolchain::Cargo => "cargo",
        }
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl std::str::FromStr for Toolchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "go" => Ok(Toolchain::Go),
            "cargo" | "rust" => Ok(Toolchain::Cargo),
            other => Err(format!("unknown toolchain '{}', expected go or cargo", other)),
        }
    }
}

/// Clones a repository at the requested ref and compiles it.
#[derive(Debug, Clone)]
pub struct SourceBuildInstaller {
    repo_url: String,
    sub_path: Option<String>,
    binary_name: String,
    toolchain: Toolchain,
    cancel: CancellationToken,
}

struct Step<'a> {
    name: &'a str,
    dir: &'a Path,
    program: &'a str,
    args: Vec<String>,
    envs: Vec<(&'a str, PathBuf)>,
}

impl SourceBuildInstaller {
    pub fn new(
        repo_url: impl Into<String>,
        binary_name: impl Into<String>,
        sub_path: Option<String>,
        toolchain: Toolchain,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            sub_path: sub_path.filter(|p| !p.is_empty()),
            binary_name: binary_name.into(),
            toolchain,
            cancel,
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    fn build_error(&self, version: &str, step: &str, source: io::Error) -> GenvError {
        GenvError::Build {
            repo: self.repo_url.clone(),
            reference: version.to_string(),
            step: step.to_string(),
            source: Box::new(source),
        }
    }

    async fn run(&self, version: &str, step: Step<'_>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GenvError::cancelled(format!(
                "Build of {} at {}",
                self.repo_url, version
            )));
        }
        tracing::info!("{} {}: {} {}", step.name, self.repo_url, step.program, step.args.join(" "));

        let mut cmd = Command::new(step.program);
        cmd.args(&step.args)
            .current_dir(step.dir)
            .envs(step.envs.iter().map(|(k, v)| (*k, v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| self.build_error(version, step.name, e))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| self.build_error(version, step.name, e))?,
            _ = self.cancel.cancelled() => {
                return Err(GenvError::cancelled(format!(
                    "Build of {} at {}",
                    self.repo_url, version
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("{} failed for {}: {}", step.name, self.repo_url, stderr);
            return Err(self.build_error(
                version,
                step.name,
                io::Error::other(format!("{} exited with {}: {}", step.program, output.status, stderr)),
            ));
        }
        Ok(())
    }

    async fn checkout(&self, version: &str, workspace: &Path) -> Result<()> {
        let git = |args: &[&str]| Step {
            name: "checkout",
            dir: workspace,
            program: "git",
            args: args.iter().map(|a| a.to_string()).collect(),
            envs: Vec::new(),
        };

        if version == LATEST {
            self.run(version, git(&["clone", "--depth", "1", self.repo_url.as_str(), "."]))
                .await
        } else {
            self.run(version, git(&["init", "--quiet"])).await?;
            self.run(version, git(&["remote", "add", "origin", self.repo_url.as_str()]))
                .await?;
            self.run(version, git(&["fetch", "--depth", "1", "origin", version]))
                .await?;
            self.run(version, git(&["checkout", "--quiet", "FETCH_HEAD"]))
                .await
        }
    }

    async fn compile(&self, version: &str, workspace: &Path, dst: &Path) -> Result<()> {
        let build_dir = match &self.sub_path {
            Some(sub) if self.toolchain == Toolchain::Cargo => workspace.join(sub),
            _ => workspace.to_path_buf(),
        };

        match self.toolchain {
            Toolchain::Go => {
                self.run(
                    version,
                    Step {
                        name: "dependencies",
                        dir: &build_dir,
                        program: "go",
                        args: vec!["mod".into(), "download".into()],
                        envs: Vec::new(),
                    },
                )
                .await?;

                let mut args = vec!["build".to_string(), "-o".to_string(), dst.to_string_lossy().to_string()];
                if let Some(sub) = &self.sub_path {
                    // Go reads a bare relative path as an import path.
                    if sub.starts_with('.') || Path::new(sub).is_absolute() {
                        args.push(sub.clone());
                    } else {
                        args.push(format!("./{}", sub));
                    }
                }
                self.run(
                    version,
                    Step {
                        name: "build",
                        dir: &build_dir,
                        program: "go",
                        args,
                        envs: Vec::new(),
                    },
                )
                .await
            }
            Toolchain::Cargo => {
                let target_dir = workspace.join("target");
                self.run(
                    version,
                    Step {
                        name: "dependencies",
                        dir: &build_dir,
                        program: "cargo",
                        args: vec!["fetch".into()],
                        envs: Vec::new(),
                    },
                )
                .await?;
                self.run(
                    version,
                    Step {
                        name: "build",
                        dir: &build_dir,
                        program: "cargo",
                        args: vec![
                            "build".into(),
                            "--release".into(),
                            "--bin".into(),
                            self.binary_name.clone(),
                        ],
                        envs: vec![("CARGO_TARGET_DIR", target_dir.clone())],
                    },
                )
                .await?;

                let artifact_name = dst
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| self.binary_name.clone());
                let artifact = target_dir.join("release").join(artifact_name);
                fs::copy(&artifact, dst)
                    .map_err(|e| self.build_error(version, "copy artifact", e))?;
                Ok(())
            }
        }
    }
}

/// Build steps run inside the workspace, so a relative destination would
/// land there and be deleted with it.
fn absolute_destination(dst: &Path) -> Result<PathBuf> {
    std::path::absolute(dst)
        .map_err(|e| GenvError::io(format!("Could not resolve {}", dst.display()), e))
}

#[async_trait::async_trait]
impl Installer for SourceBuildInstaller {
    async fn install(&self, version: &str, dst: &Path) -> Result<()> {
        let dst = absolute_destination(dst)?;
        let dst = dst.as_path();
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GenvError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }

        // Removed on drop, whichever step fails.
        let workspace = tempfile::Builder::new()
            .prefix("genv-build-")
            .tempdir()
            .map_err(|e| GenvError::io("Failed to create build workspace", e))?;
        tracing::debug!("Build workspace: {}", workspace.path().display());

        self.checkout(version, workspace.path()).await?;
        self.compile(version, workspace.path(), dst).await?;
        make_executable(dst).map_err(|e| self.build_error(version, "permissions", e))?;

        tracing::info!("Built {} {} into {}", self.repo_url, version, dst.display());
        Ok(())
    }

    fn available(&self) -> bool {
        std::process::Command::new(self.toolchain.program())
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
