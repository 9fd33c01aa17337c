use genv::install::FetchInstaller;
use genv::lock::ExclusiveLock;
use genv::platform::Platform;
use genv::{EnvContext, GenvError, Installer, Result, VersionManager};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Installs by copying `<dist>/<version>` into place.
struct CopyInstaller {
    dist: PathBuf,
}

#[async_trait::async_trait]
impl Installer for CopyInstaller {
    async fn install(&self, version: &str, dst: &Path) -> Result<()> {
        let src = self.dist.join(version);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| GenvError::Io {
                context: format!("creating {}", parent.display()),
                source: e,
            })?;
        }
        fs::copy(&src, dst).map_err(|e| GenvError::Fetch {
            version: version.to_string(),
            url: src.display().to_string(),
            source: Box::new(e),
        })?;
        Ok(())
    }

    fn available(&self) -> bool {
        self.dist.is_dir()
    }
}

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new(versions: &[&str]) -> Self {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        for version in versions {
            fs::write(dist.join(version), format!("demo {}", version)).unwrap();
        }
        Self { temp }
    }

    fn home(&self) -> PathBuf {
        self.temp.path().join("home")
    }

    fn manager(&self) -> VersionManager {
        VersionManager::new(
            EnvContext::new(self.home(), Platform::new("linux", "amd64")),
            "demo",
            "demo-bin",
            Box::new(CopyInstaller {
                dist: self.temp.path().join("dist"),
            }),
        )
    }
}

#[tokio::test]
async fn test_lifecycle_through_public_api() {
    let fixture = Fixture::new(&["v1.0.0", "v1.1.0"]);
    let manager = fixture.manager();
    assert!(manager.installer().available());
    assert!(manager.list_installed().unwrap().is_empty());
    assert_eq!(manager.current_binary_path().unwrap(), None);

    manager.install("v1.1.0").await.unwrap();
    manager.install("v1.0.0").await.unwrap();
    assert_eq!(manager.list_installed().unwrap(), vec!["v1.0.0", "v1.1.0"]);

    manager.use_version("v1.1.0").unwrap();
    let path = manager.current_binary_path().unwrap().unwrap();
    assert_eq!(path, fixture.home().join("demo").join("v1.1.0").join("demo-bin"));
    assert_eq!(fs::read_to_string(path).unwrap(), "demo v1.1.0");

    manager.uninstall("v1.1.0").unwrap();
    assert_eq!(manager.current_version().unwrap(), None);
    assert_eq!(manager.list_installed().unwrap(), vec!["v1.0.0"]);
}

#[tokio::test]
async fn test_installer_error_is_surfaced_unchanged() {
    let fixture = Fixture::new(&[]);
    let manager = fixture.manager();

    match manager.install("v3.0.0").await {
        Err(GenvError::Fetch { version, .. }) => assert_eq!(version, "v3.0.0"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!manager.installed("v3.0.0").unwrap());
}

#[tokio::test]
async fn test_malformed_profile_is_reported() {
    let fixture = Fixture::new(&["v1.0.0"]);
    let manager = fixture.manager();
    manager.install("v1.0.0").await.unwrap();
    fs::write(fixture.home().join("demo").join(".profile.json"), "{oops").unwrap();

    assert!(matches!(
        manager.current_version(),
        Err(GenvError::Profile { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_use_keeps_profile_whole() {
    let versions = ["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0"];
    let fixture = Arc::new(Fixture::new(&versions));
    let manager = fixture.manager();
    for version in versions {
        manager.install(version).await.unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let fixture = Arc::clone(&fixture);
            let version = versions[i % versions.len()];
            thread::spawn(move || {
                // One manager per thread, like separate processes.
                let manager = fixture.manager();
                for _ in 0..10 {
                    manager.use_version(version).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let current = manager.current_version().unwrap().unwrap();
    assert!(versions.contains(&current.as_str()));
}

#[tokio::test]
async fn test_use_waits_for_lock_holder() {
    let fixture = Arc::new(Fixture::new(&["v1.0.0"]));
    let manager = fixture.manager();
    manager.install("v1.0.0").await.unwrap();

    let guard = ExclusiveLock::acquire(&manager.tool_home()).unwrap();

    let waiter = {
        let fixture = Arc::clone(&fixture);
        thread::spawn(move || fixture.manager().use_version("v1.0.0"))
    };

    thread::sleep(Duration::from_millis(200));
    assert_eq!(manager.current_version().unwrap(), None);

    drop(guard);
    waiter.join().unwrap().unwrap();
    assert_eq!(manager.current_version().unwrap().as_deref(), Some("v1.0.0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_installs_of_one_version_stay_whole() {
    let temp = TempDir::new().unwrap();
    let dist = temp.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    fs::write(dist.join("v1.0.0"), &payload).unwrap();

    let template = format!("file://{}/{{{{ .Version }}}}", dist.display());
    let home = temp.path().join("home");
    let manager = |home: PathBuf, template: String| {
        let platform = Platform::new("linux", "amd64");
        let installer =
            FetchInstaller::new(&template, platform.clone(), CancellationToken::new()).unwrap();
        VersionManager::new(
            EnvContext::new(home, platform),
            "demo",
            "demo-bin",
            Box::new(installer),
        )
    };

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let manager = manager(home.clone(), template.clone());
            tokio::spawn(async move { manager.install("v1.0.0").await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let manager = manager(home.clone(), template);
    assert_eq!(manager.list_installed().unwrap(), vec!["v1.0.0"]);
    let version_dir = home.join("demo").join("v1.0.0");
    assert_eq!(fs::read(version_dir.join("demo-bin")).unwrap(), payload);
    // No staging directories are left next to the binary.
    assert_eq!(fs::read_dir(&version_dir).unwrap().count(), 1);
}
