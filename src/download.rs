use crate::error::BoxError;
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    TarXz,
}

impl ArchiveKind {
    pub fn detect(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.xz") {
            Some(ArchiveKind::TarXz)
        } else {
            None
        }
    }
}

/// Where an artifact comes from: a remote URL or a file on this machine
/// (`file://` URL or plain path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Local(PathBuf),
}

impl Source {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Remote(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            Source::Local(PathBuf::from(path))
        } else {
            Source::Local(PathBuf::from(location))
        }
    }

    /// Last path segment without query string, used to name the downloaded file.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Source::Remote(url) => url
                .split('?')
                .next()
                .and_then(|u| u.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            Source::Local(path) => path.file_name().map(|n| n.to_string_lossy().to_string()),
        }
    }
}

/// Copies `source` to `local_path`, giving up as soon as `cancel` fires.
pub async fn fetch_to(
    source: &Source,
    local_path: &Path,
    cancel: &CancellationToken,
) -> Result<(), BoxError> {
    match source {
        Source::Remote(url) => download_file(url, local_path, cancel).await,
        Source::Local(path) => {
            tracing::info!("Copying {}...", path.display());
            tokio::select! {
                result = tokio::fs::copy(path, local_path) => {
                    result.map_err(|e| -> BoxError {
                        format!("could not copy {}: {}", path.display(), e).into()
                    })?;
                    Ok(())
                }
                _ = cancel.cancelled() => Err("download cancelled".into()),
            }
        }
    }
}

pub async fn download_file(
    url: &str,
    local_path: &Path,
    cancel: &CancellationToken,
) -> Result<(), BoxError> {
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    tracing::info!("Downloading {}...", url);

    let response = tokio::select! {
        response = reqwest::get(url) => response?,
        _ = cancel.cancelled() => return Err("download cancelled".into()),
    };
    let response = response.error_for_status()?;
    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            _ = cancel.cancelled() => {
                pb.abandon_with_message("Download cancelled");
                return Err("download cancelled".into());
            }
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.sync_all()?;

    pb.finish_with_message("Download complete");
    Ok(())
}

pub fn extract_archive(
    archive_path: &Path,
    kind: ArchiveKind,
    extract_dir: &Path,
) -> Result<(), BoxError> {
    tracing::info!(
        "Extracting {}...",
        archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );

    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, extract_dir),
        ArchiveKind::TarGz => {
            let file = fs::File::open(archive_path)?;
            Archive::new(GzDecoder::new(file)).unpack(extract_dir)?;
            Ok(())
        }
        ArchiveKind::TarXz => {
            let file = fs::File::open(archive_path)?;
            Archive::new(xz2::read::XzDecoder::new(file)).unpack(extract_dir)?;
            Ok(())
        }
    }
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<(), BoxError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}

/// Finds the extracted file named `file_name`, preferring the shallowest
/// match. Falls back to a file whose stem matches, so a `tool.exe` request
/// can be satisfied by `tool` and vice versa.
pub fn find_executable_in_extracted(extract_dir: &Path, file_name: &str) -> Option<PathBuf> {
    let wanted = file_name.to_lowercase();
    let wanted_stem = Path::new(&wanted)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| wanted.clone());

    let mut candidates: Vec<(u8, usize, PathBuf)> = WalkDir::new(extract_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            let stem = e
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let rank = if name == wanted {
                0
            } else if stem == wanted_stem || name == wanted_stem {
                1
            } else {
                return None;
            };
            Some((rank, e.depth(), e.into_path()))
        })
        .collect();

    candidates.sort();
    if let Some((rank, depth, path)) = candidates.first() {
        tracing::debug!(
            "Found candidate executable: {} (rank {}, depth {})",
            path.display(),
            rank,
            depth
        );
    }
    candidates.into_iter().map(|(_, _, path)| path).next()
}
