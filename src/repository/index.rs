// src/repository/index.rs

//! Debian/Ubuntu package index resolver
//!
//! Fetches `dists/<codename>/main/binary-<arch>/Packages.{gz,xz}`, caches the
//! decompressed document once per target and answers "where does package P
//! live on the mirror" with a single linear scan over its stanzas.

use super::{temp_path_for, RepositoryClient};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Archive component whose index is consulted
pub const INDEX_COMPONENT: &str = "main";

/// File name of the decompressed, cached index
const INDEX_FILE: &str = "Packages";

/// Compression of a published Packages index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCompression {
    Gzip,
    Xz,
}

impl IndexCompression {
    /// Tried in order; the first that fetches and decodes wins
    pub const CANDIDATES: [IndexCompression; 2] = [IndexCompression::Gzip, IndexCompression::Xz];

    pub fn extension(self) -> &'static str {
        match self {
            IndexCompression::Gzip => "gz",
            IndexCompression::Xz => "xz",
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            IndexCompression::Gzip => Box::new(GzDecoder::new(reader)),
            IndexCompression::Xz => Box::new(XzDecoder::new(reader)),
        }
    }
}

/// Location of the `Packages.<ext>` document on a mirror
pub fn index_url(mirror: &str, codename: &str, arch: &str, compression: IndexCompression) -> String {
    format!(
        "{}/dists/{}/{}/binary-{}/Packages.{}",
        mirror.trim_end_matches('/'),
        codename,
        INDEX_COMPONENT,
        arch,
        compression.extension()
    )
}

/// Scan an index for the `Filename:` of `package`
///
/// Tracks the most recent `Package:` value as the current context and returns
/// the first `Filename:` seen while the context matches. A blank line ends a
/// stanza and clears the context.
pub fn find_filename<R: BufRead>(reader: R, package: &str) -> io::Result<Option<String>> {
    let mut in_match = false;

    for line in reader.lines() {
        let line = line?;

        if line.trim().is_empty() {
            in_match = false;
            continue;
        }

        if let Some(name) = line.strip_prefix("Package:") {
            in_match = name.trim() == package;
        } else if in_match {
            if let Some(filename) = line.strip_prefix("Filename:") {
                return Ok(Some(filename.trim().to_string()));
            }
        }
    }

    Ok(None)
}

/// A decompressed package index cached on disk
#[derive(Debug)]
pub struct PackageIndex {
    path: PathBuf,
}

impl PackageIndex {
    /// Make sure the index for the context's target is cached and open it
    pub fn open(client: &RepositoryClient, ctx: &BuildContext) -> Result<Self> {
        let profile = ctx.profile();
        Self::load(
            client,
            &ctx.target_key(),
            ctx.mirror_url(),
            profile.codename,
            ctx.arch().debian_name(),
            &ctx.cache_dir(),
        )
    }

    /// Cache the index under `cache_dir`, trying each compression in turn
    ///
    /// An existing decompressed index is reused as-is; a stale cache is never
    /// refreshed automatically. Fails with `IndexUnavailable`, labelled with
    /// `distro`, once every candidate has failed to transfer or decode.
    pub fn load(
        client: &RepositoryClient,
        distro: &str,
        mirror: &str,
        codename: &str,
        arch: &str,
        cache_dir: &Path,
    ) -> Result<Self> {
        let path = cache_dir.join(INDEX_FILE);
        if path.exists() {
            debug!("Using cached package index {}", path.display());
            return Ok(Self { path });
        }

        let mut failures = Vec::new();
        for compression in IndexCompression::CANDIDATES {
            let url = index_url(mirror, codename, arch, compression);
            match Self::fetch_and_decode(client, &url, compression, cache_dir, &path) {
                Ok(()) => {
                    info!("Cached package index from {}", url);
                    return Ok(Self { path });
                }
                Err(Error::NetworkError(reason)) => {
                    warn!("Package index {} unusable: {}", url, reason);
                    failures.push(format!("{}: {}", url, reason));
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::IndexUnavailable {
            distro: distro.to_string(),
            reason: failures.join("; "),
        })
    }

    fn fetch_and_decode(
        client: &RepositoryClient,
        url: &str,
        compression: IndexCompression,
        cache_dir: &Path,
        index_path: &Path,
    ) -> Result<()> {
        let compressed = cache_dir.join(format!("{}.{}", INDEX_FILE, compression.extension()));
        client.fetch(url, &compressed)?;

        let temp_path = temp_path_for(index_path);
        let decoded = File::open(&compressed).and_then(|file| {
            let mut decoder = compression.decoder(file);
            let mut out = File::create(&temp_path)?;
            io::copy(&mut decoder, &mut out)
        });

        match decoded {
            Ok(bytes) => {
                debug!("Decompressed package index: {} bytes", bytes);
                fs::rename(&temp_path, index_path)?;
                Ok(())
            }
            Err(e) => {
                // Undecodable downloads must not stay behind as cache hits
                let _ = fs::remove_file(&temp_path);
                let _ = fs::remove_file(&compressed);
                Err(Error::NetworkError(format!(
                    "Failed to decompress {}: {}",
                    compressed.display(),
                    e
                )))
            }
        }
    }

    /// Path of the decompressed index
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mirror-relative path of `package`, or `None` when it is not listed
    pub fn resolve(&self, package: &str) -> Result<Option<String>> {
        let file = File::open(&self.path)?;
        let found = find_filename(BufReader::new(file), package)?;
        match &found {
            Some(filename) => debug!("Resolved {} -> {}", package, filename),
            None => debug!("Package {} not in index", package),
        }
        Ok(found)
    }
}

/// Resolve `package` against the mirror index for `codename`/`arch`
///
/// Errors name the index as `<codename>-<arch>`.
pub fn resolve_download_path(
    client: &RepositoryClient,
    mirror: &str,
    codename: &str,
    arch: &str,
    cache_dir: &Path,
    package: &str,
) -> Result<Option<String>> {
    let distro = format!("{}-{}", codename, arch);
    PackageIndex::load(client, &distro, mirror, codename, arch, cache_dir)?.resolve(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE_INDEX: &str = "Package: foo
Version: 1.0
Architecture: amd64
Filename: pool/foo_1.deb

Package: bar
Version: 1.0
Architecture: amd64
Filename: pool/bar_1.deb
";

    fn write_gz(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn write_xz(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = xz2::write::XzEncoder::new(File::create(path).unwrap(), 6);
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_find_filename() {
        let found = find_filename(SAMPLE_INDEX.as_bytes(), "foo").unwrap();
        assert_eq!(found.as_deref(), Some("pool/foo_1.deb"));

        let found = find_filename(SAMPLE_INDEX.as_bytes(), "bar").unwrap();
        assert_eq!(found.as_deref(), Some("pool/bar_1.deb"));

        assert_eq!(find_filename(SAMPLE_INDEX.as_bytes(), "missing").unwrap(), None);
    }

    #[test]
    fn test_find_filename_first_match_wins() {
        let index = "Package: foo\nFilename: pool/foo_1.deb\n\nPackage: foo\nFilename: pool/foo_2.deb\n";
        let found = find_filename(index.as_bytes(), "foo").unwrap();
        assert_eq!(found.as_deref(), Some("pool/foo_1.deb"));
    }

    #[test]
    fn test_find_filename_does_not_match_prefix_names() {
        let index = "Package: libc6-dev\nFilename: pool/libc6-dev.deb\n\nPackage: libc6\nFilename: pool/libc6.deb\n";
        let found = find_filename(index.as_bytes(), "libc6").unwrap();
        assert_eq!(found.as_deref(), Some("pool/libc6.deb"));
    }

    #[test]
    fn test_filename_outside_matching_stanza_is_ignored() {
        let index = "Package: foo\n\nFilename: pool/orphan.deb\n";
        assert_eq!(find_filename(index.as_bytes(), "foo").unwrap(), None);
    }

    #[test]
    fn test_index_url() {
        let url = index_url("https://deb.debian.org/debian/", "bookworm", "amd64", IndexCompression::Xz);
        assert_eq!(
            url,
            "https://deb.debian.org/debian/dists/bookworm/main/binary-amd64/Packages.xz"
        );
    }

    #[test]
    fn test_load_prefers_gzip_and_caches() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_gz(
            &mirror.path().join("dists/bookworm/main/binary-amd64/Packages.gz"),
            SAMPLE_INDEX,
        );

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let index = PackageIndex::load(&client, "debian-bookworm-amd64", &mirror_url, "bookworm", "amd64", cache.path()).unwrap();
        assert_eq!(index.resolve("foo").unwrap().as_deref(), Some("pool/foo_1.deb"));
        assert_eq!(index.resolve("missing").unwrap(), None);
        assert_eq!(client.transfers(), 1);

        // Second load is served from the decompressed cache
        PackageIndex::load(&client, "debian-bookworm-amd64", &mirror_url, "bookworm", "amd64", cache.path()).unwrap();
        assert_eq!(client.transfers(), 1);
    }

    #[test]
    fn test_load_falls_back_to_xz() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_xz(
            &mirror.path().join("dists/noble/main/binary-arm64/Packages.xz"),
            SAMPLE_INDEX,
        );

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let found =
            resolve_download_path(&client, &mirror_url, "noble", "arm64", cache.path(), "bar").unwrap();
        assert_eq!(found.as_deref(), Some("pool/bar_1.deb"));
        assert_eq!(client.transfers(), 2);
    }

    #[test]
    fn test_load_fails_when_no_index_published() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let result = PackageIndex::load(&client, "debian-bookworm-amd64", &mirror_url, "bookworm", "amd64", cache.path());
        assert!(matches!(
            result,
            Err(Error::IndexUnavailable { ref distro, .. }) if distro == "debian-bookworm-amd64"
        ));
        assert!(!cache.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_resolve_download_path_without_index() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let err = resolve_download_path(&client, &mirror_url, "jammy", "amd64", cache.path(), "libc6")
            .unwrap_err();

        match err {
            Error::IndexUnavailable { distro, reason } => {
                assert_eq!(distro, "jammy-amd64");
                assert!(reason.contains("Packages.gz"));
                assert!(reason.contains("Packages.xz"));
            }
            other => panic!("expected IndexUnavailable, got {:?}", other),
        }
        assert_eq!(client.transfers(), 2);
    }

    #[test]
    fn test_uncreatable_cache_is_not_reported_as_missing_index() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_gz(
            &mirror.path().join("dists/bookworm/main/binary-amd64/Packages.gz"),
            SAMPLE_INDEX,
        );
        let blocker = cache.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let result = PackageIndex::load(
            &client,
            "debian-bookworm-amd64",
            &mirror_url,
            "bookworm",
            "amd64",
            &blocker.join("cache"),
        );
        assert!(matches!(result, Err(Error::FilesystemError(_))));
    }

    #[test]
    fn test_corrupt_gzip_falls_through_to_xz() {
        let mirror = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let dir = mirror.path().join("dists/bookworm/main/binary-amd64");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Packages.gz"), b"definitely not gzip").unwrap();
        write_xz(&dir.join("Packages.xz"), SAMPLE_INDEX);

        let client = RepositoryClient::new().unwrap();
        let mirror_url = format!("file://{}", mirror.path().display());
        let index = PackageIndex::load(&client, "debian-bookworm-amd64", &mirror_url, "bookworm", "amd64", cache.path()).unwrap();
        assert_eq!(index.resolve("foo").unwrap().as_deref(), Some("pool/foo_1.deb"));
        assert!(!cache.path().join("Packages.gz").exists());
    }
}
