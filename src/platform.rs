use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const WINDOWS: &str = "windows";

/// Host identity in the naming distribution channels use
/// (`linux`/`darwin`/`windows`, `amd64`/`arm64`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin".to_string(),
            other => other.to_string(),
        };

        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64".to_string(),
            "aarch64" => "arm64".to_string(),
            "x86" => "386".to_string(),
            other => other.to_string(),
        };

        Self { os, arch }
    }

    pub fn is_windows(&self) -> bool {
        self.os == WINDOWS
    }

    /// `binary_name` with the executable suffix this platform expects.
    pub fn executable_name(&self, binary_name: &str) -> String {
        if self.is_windows() {
            format!("{}.exe", binary_name)
        } else {
            binary_name.to_string()
        }
    }
}

/// Expected location of an installed binary:
/// `home/name/version/binary_name[.exe]`.
pub fn resolve_binary_path(
    home: &Path,
    name: &str,
    version: &str,
    binary_name: &str,
    platform: &Platform,
) -> PathBuf {
    home.join(name)
        .join(version)
        .join(platform.executable_name(binary_name))
}

pub fn make_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = fs::metadata(path)?;
    }
    Ok(())
}
