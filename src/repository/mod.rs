// src/repository/mod.rs

//! Mirror access and artifact caching
//!
//! This module provides functionality for:
//! - Downloading files from a distribution mirror (http, https, file)
//! - Idempotent caching: a present file is a cache hit, never re-fetched
//! - Atomic placement: data lands in `<dest>.tmp` and is renamed on success
//! - Resolving package names through the mirror's package index

pub mod index;

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::cell::Cell;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use index::PackageIndex;

/// Timeout for establishing a connection to the mirror (30 seconds)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a whole transfer; package bodies can be large
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Result of a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Destination already existed; nothing was transferred
    Cached,
    /// File was transferred and moved into place
    Downloaded,
}

/// HTTP client wrapper with cache-on-presence semantics
pub struct RepositoryClient {
    client: Client,
    transfers: Cell<usize>,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            transfers: Cell::new(0),
        })
    }

    /// Number of transfers attempted by this client
    pub fn transfers(&self) -> usize {
        self.transfers.get()
    }

    /// Fetch `url` to `dest_path` unless `dest_path` already exists
    ///
    /// No integrity check happens on a cache hit: a corrupt earlier download
    /// stays in place until it is removed by hand.
    pub fn fetch(&self, url: &str, dest_path: &Path) -> Result<FetchOutcome> {
        if dest_path.exists() {
            debug!("Cache hit: {}", dest_path.display());
            return Ok(FetchOutcome::Cached);
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FilesystemError(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        info!("Downloading {}", url);

        let temp_path = temp_path_for(dest_path);
        if let Err(e) = self.transfer(url, &temp_path) {
            if temp_path.exists() {
                if let Err(rm) = fs::remove_file(&temp_path) {
                    warn!("Failed to remove partial download {}: {}", temp_path.display(), rm);
                }
            }
            return Err(e);
        }

        // Atomic rename from temp to final destination
        fs::rename(&temp_path, dest_path).map_err(|e| {
            Error::FilesystemError(format!(
                "Failed to move {} to {}: {}",
                temp_path.display(),
                dest_path.display(),
                e
            ))
        })?;

        debug!("Stored {}", dest_path.display());
        Ok(FetchOutcome::Downloaded)
    }

    /// Copy the body behind `url` into a freshly created `temp_path`
    fn transfer(&self, url: &str, temp_path: &Path) -> Result<u64> {
        self.transfers.set(self.transfers.get() + 1);

        let mut file = File::create(temp_path).map_err(|e| {
            Error::FilesystemError(format!("Failed to create file {}: {}", temp_path.display(), e))
        })?;

        if let Some(local) = url.strip_prefix("file://") {
            let mut source = File::open(local)
                .map_err(|e| Error::NetworkError(format!("Failed to open {}: {}", url, e)))?;
            return io::copy(&mut source, &mut file)
                .map_err(|e| Error::NetworkError(format!("Failed to copy {}: {}", url, e)));
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::NetworkError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        io::copy(&mut response, &mut file)
            .map_err(|e| Error::NetworkError(format!("Failed to read body of {}: {}", url, e)))
    }
}

/// `<path>.tmp`, keeping the original extension
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Last path segment of a mirror-relative or absolute URL
pub fn file_name_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn test_fetch_downloads_then_caches() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.deb");
        fs::write(&source, b"payload").unwrap();
        let dest = temp.path().join("cache/nested/pkg.deb");

        let client = RepositoryClient::new().unwrap();
        let first = client.fetch(&file_url(&source), &dest).unwrap();
        assert_eq!(first, FetchOutcome::Downloaded);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(!temp_path_for(&dest).exists());

        // Changing the source must not affect a cached file
        fs::write(&source, b"changed").unwrap();
        let second = client.fetch(&file_url(&source), &dest).unwrap();
        assert_eq!(second, FetchOutcome::Cached);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(client.transfers(), 1);
    }

    #[test]
    fn test_fetch_failure_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.deb");

        let client = RepositoryClient::new().unwrap();
        let result = client.fetch(&file_url(&temp.path().join("missing.deb")), &dest);

        assert!(matches!(result, Err(Error::NetworkError(_))));
        assert!(!dest.exists());
        assert!(!temp_path_for(&dest).exists());
    }

    #[test]
    fn test_fetch_reports_uncreatable_directory() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let client = RepositoryClient::new().unwrap();
        let result = client.fetch("file:///nonexistent", &blocker.join("pkg.deb"));
        assert!(matches!(result, Err(Error::FilesystemError(_))));
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path_for(Path::new("/cache/Packages.gz")),
            PathBuf::from("/cache/Packages.gz.tmp")
        );
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("pool/main/g/glibc/libc6_2.36_amd64.deb"), "libc6_2.36_amd64.deb");
        assert_eq!(file_name_from_url("plain"), "plain");
    }
}
