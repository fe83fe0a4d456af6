// src/packages/deb.rs

//! Debian package extraction
//!
//! A .deb is an AR archive holding `debian-binary`, `control.tar.*` and a
//! compressed `data.tar.*` payload. Only the payload matters for a sysroot:
//! it is unpacked directly into the destination tree.

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

/// Compression of the `data.tar.*` member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCompression {
    Xz,
    Zstd,
    Gzip,
    Bzip2,
}

impl DataCompression {
    /// Member lookup order; the first member present wins
    pub const PRIORITY: [DataCompression; 4] = [
        DataCompression::Xz,
        DataCompression::Zstd,
        DataCompression::Gzip,
        DataCompression::Bzip2,
    ];

    /// Name of the AR member carrying this compression
    pub fn member_name(self) -> &'static str {
        match self {
            DataCompression::Xz => "data.tar.xz",
            DataCompression::Zstd => "data.tar.zst",
            DataCompression::Gzip => "data.tar.gz",
            DataCompression::Bzip2 => "data.tar.bz2",
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            DataCompression::Xz => Box::new(XzDecoder::new(reader)),
            DataCompression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader).map_err(
                |e| Error::UnsupportedFormat(format!("Failed to create zstd decoder: {}", e)),
            )?),
            DataCompression::Gzip => Box::new(GzDecoder::new(reader)),
            DataCompression::Bzip2 => Box::new(BzDecoder::new(reader)),
        })
    }
}

/// A downloaded Debian package on disk
#[derive(Debug, Clone)]
pub struct DebArchive {
    path: PathBuf,
}

impl DebArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unpack the data payload into `dest_dir`, using the system temp dir
    /// for scratch space
    pub fn extract(&self, dest_dir: &Path) -> Result<DataCompression> {
        self.extract_in(dest_dir, &std::env::temp_dir())
    }

    /// Unpack the data payload into `dest_dir` with scratch space under
    /// `scratch_root`
    ///
    /// The scratch directory is removed when this returns, whether
    /// extraction succeeded or not.
    pub fn extract_in(&self, dest_dir: &Path, scratch_root: &Path) -> Result<DataCompression> {
        let scratch = tempfile::Builder::new()
            .prefix("deb-extract-")
            .tempdir_in(scratch_root)
            .map_err(|e| {
                Error::FilesystemError(format!(
                    "Failed to create scratch directory in {}: {}",
                    scratch_root.display(),
                    e
                ))
            })?;

        let members = self.unpack_members(scratch.path())?;
        debug!("{} members: {:?}", self.path.display(), members);

        let compression = DataCompression::PRIORITY
            .into_iter()
            .find(|c| scratch.path().join(c.member_name()).is_file())
            .ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "{} contains no data.tar.{{xz,zst,gz,bz2}} member",
                    self.path.display()
                ))
            })?;

        fs::create_dir_all(dest_dir).map_err(|e| {
            Error::FilesystemError(format!("Failed to create {}: {}", dest_dir.display(), e))
        })?;

        let member = File::open(scratch.path().join(compression.member_name()))?;
        unpack_tar(compression.decoder(member)?, dest_dir).map_err(|e| {
            Error::FilesystemError(format!(
                "Failed to unpack {} from {} into {}: {}",
                compression.member_name(),
                self.path.display(),
                dest_dir.display(),
                e
            ))
        })?;

        debug!(
            "Extracted {} ({}) into {}",
            self.path.display(),
            compression.member_name(),
            dest_dir.display()
        );
        Ok(compression)
    }

    /// Write every AR member into `scratch` under its own name
    fn unpack_members(&self, scratch: &Path) -> Result<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| {
            Error::FilesystemError(format!("Failed to open DEB file {}: {}", self.path.display(), e))
        })?;

        let mut archive = ar::Archive::new(file);
        let mut names = Vec::new();

        while let Some(entry) = archive.next_entry() {
            let mut entry = entry.map_err(|e| {
                Error::UnsupportedFormat(format!(
                    "Failed to read AR entry in {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

            // GNU ar terminates member names with '/'
            let raw = String::from_utf8_lossy(entry.header().identifier()).to_string();
            let name = raw.trim_end_matches('/').to_string();
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                warn!("Skipping suspicious AR member {:?} in {}", raw, self.path.display());
                continue;
            }

            let mut out = File::create(scratch.join(&name))?;
            io::copy(&mut entry, &mut out)?;
            names.push(name);
        }

        Ok(names)
    }
}

/// Unpack `archive_path`'s data payload into `dest_dir`
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    DebArchive::new(archive_path).extract(dest_dir).map(|_| ())
}

/// Unpack a tar stream into `dest`, overwriting whatever is already there
fn unpack_tar<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::fixtures::{self, TarEntry};
    use tempfile::TempDir;

    fn scratch_is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_extract_xz_payload() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let deb = temp.path().join("x.deb");
        fixtures::write_deb(
            &deb,
            DataCompression::Xz,
            &[TarEntry::File("usr/include/x.h", b"#define X 1\n")],
        );

        let dest = temp.path().join("root");
        let used = DebArchive::new(&deb).extract_in(&dest, &scratch).unwrap();

        assert_eq!(used, DataCompression::Xz);
        assert_eq!(fs::read(dest.join("usr/include/x.h")).unwrap(), b"#define X 1\n");
        let top: Vec<_> = fs::read_dir(&dest).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(top, vec![std::ffi::OsString::from("usr")]);
        assert!(scratch_is_empty(&scratch));
    }

    #[test]
    fn test_extract_each_compression() {
        for compression in DataCompression::PRIORITY {
            let temp = TempDir::new().unwrap();
            let deb = temp.path().join("pkg.deb");
            fixtures::write_deb(
                &deb,
                compression,
                &[TarEntry::File("usr/lib/libfoo.so.1", b"ELF")],
            );

            let dest = temp.path().join("root");
            let used = DebArchive::new(&deb).extract(&dest).unwrap();
            assert_eq!(used, compression);
            assert!(dest.join("usr/lib/libfoo.so.1").is_file());
        }
    }

    #[test]
    fn test_extract_preserves_absolute_symlinks() {
        let temp = TempDir::new().unwrap();
        let deb = temp.path().join("pkg.deb");
        fixtures::write_deb(
            &deb,
            DataCompression::Gzip,
            &[
                TarEntry::Dir("lib64"),
                TarEntry::Symlink(
                    "lib64/ld-linux-x86-64.so.2",
                    "/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2",
                ),
            ],
        );

        let dest = temp.path().join("root");
        extract(&deb, &dest).unwrap();
        assert_eq!(
            fs::read_link(dest.join("lib64/ld-linux-x86-64.so.2")).unwrap(),
            PathBuf::from("/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2")
        );
    }

    #[test]
    fn test_missing_data_member_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let deb = temp.path().join("pkg.deb");
        fixtures::write_ar(
            &deb,
            &[
                ("debian-binary", b"2.0\n".to_vec()),
                ("data.tar.lzma", vec![0u8; 16]),
            ],
        );

        let result = DebArchive::new(&deb).extract_in(&temp.path().join("root"), &scratch);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
        assert!(scratch_is_empty(&scratch));
    }

    #[test]
    fn test_corrupt_payload_cleans_scratch() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let deb = temp.path().join("pkg.deb");
        fixtures::write_ar(
            &deb,
            &[
                ("debian-binary", b"2.0\n".to_vec()),
                ("data.tar.xz", b"not xz at all".to_vec()),
            ],
        );

        let result = DebArchive::new(&deb).extract_in(&temp.path().join("root"), &scratch);
        assert!(result.is_err());
        assert!(scratch_is_empty(&scratch));
    }

    #[test]
    fn test_member_priority_prefers_xz() {
        let temp = TempDir::new().unwrap();
        let deb = temp.path().join("pkg.deb");
        let gz = fixtures::compress(
            DataCompression::Gzip,
            fixtures::tar_bytes(&[TarEntry::File("from-gz", b"gz")]),
        );
        let xz = fixtures::compress(
            DataCompression::Xz,
            fixtures::tar_bytes(&[TarEntry::File("from-xz", b"xz")]),
        );
        fixtures::write_ar(
            &deb,
            &[
                ("debian-binary", b"2.0\n".to_vec()),
                ("data.tar.gz", gz),
                ("data.tar.xz", xz),
            ],
        );

        let dest = temp.path().join("root");
        let used = DebArchive::new(&deb).extract(&dest).unwrap();
        assert_eq!(used, DataCompression::Xz);
        assert!(dest.join("from-xz").exists());
        assert!(!dest.join("from-gz").exists());
    }

    #[test]
    fn test_reextraction_overwrites() {
        let temp = TempDir::new().unwrap();
        let deb = temp.path().join("pkg.deb");
        fixtures::write_deb(
            &deb,
            DataCompression::Zstd,
            &[TarEntry::File("usr/include/y.h", b"int y;\n")],
        );

        let dest = temp.path().join("root");
        extract(&deb, &dest).unwrap();
        extract(&deb, &dest).unwrap();
        assert_eq!(fs::read(dest.join("usr/include/y.h")).unwrap(), b"int y;\n");
    }
}
