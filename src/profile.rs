use crate::error::{GenvError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const PROFILE_FILE_NAME: &str = ".profile.json";

/// The persisted "current version" pointer of one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Profile {
    #[serde(default)]
    pub version: Option<String>,
}

/// Reads and writes `<tool home>/.profile.json`.
///
/// Writers are expected to hold the tool's lock; readers are not.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(tool_home: &Path) -> Self {
        Self {
            path: tool_home.join(PROFILE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as the empty profile.
    pub fn read(&self) -> Result<Profile> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Profile::default()),
            Err(e) => {
                return Err(GenvError::io(
                    format!("Could not read profile at {}", self.path.display()),
                    e,
                ))
            }
        };

        serde_json::from_str(&content).map_err(|source| GenvError::Profile {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the whole file via a temp file and rename, so concurrent
    /// readers see either the old or the new document.
    pub fn write(&self, profile: &Profile) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| GenvError::io("Invalid profile path", io::ErrorKind::InvalidInput.into()))?;
        fs::create_dir_all(dir)
            .map_err(|e| GenvError::io(format!("Failed to create {}", dir.display()), e))?;

        let content = serde_json::to_string(profile).map_err(|source| GenvError::Profile {
            path: self.path.clone(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| GenvError::io(format!("Failed to stage profile in {}", dir.display()), e))?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| GenvError::io("Failed to write profile", e))?;
        set_readable(temp.as_file())
            .map_err(|e| GenvError::io("Failed to set profile permissions", e))?;
        temp.persist(&self.path).map_err(|e| {
            GenvError::io(
                format!("Failed to replace profile at {}", self.path.display()),
                e.error,
            )
        })?;

        tracing::debug!("Wrote profile {}: {}", self.path.display(), content);
        Ok(())
    }
}

/// Temp files start as 0600; the profile is shared like any other file.
#[cfg(unix)]
fn set_readable(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_profile_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(&temp.path().join("demo"));
        assert_eq!(store.read().unwrap(), Profile::default());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(&temp.path().join("demo"));

        let profile = Profile {
            version: Some("v1.0.0".to_string()),
        };
        store.write(&profile).unwrap();
        assert_eq!(store.read().unwrap(), profile);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            r#"{"version":"v1.0.0"}"#
        );

        store.write(&Profile::default()).unwrap();
        assert_eq!(store.read().unwrap().version, None);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            r#"{"version":null}"#
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_written_profile_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(temp.path());
        store.write(&Profile::default()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_absent_version_field_reads_as_unset() {
        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(temp.path());
        fs::write(store.path(), "{}").unwrap();
        assert_eq!(store.read().unwrap().version, None);
    }

    #[test]
    fn test_malformed_profile_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(temp.path());
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.read(), Err(GenvError::Profile { .. })));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = ProfileStore::new(temp.path());
        store
            .write(&Profile {
                version: Some("1.7.5".to_string()),
            })
            .unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![PROFILE_FILE_NAME.to_string()]);
    }
}
