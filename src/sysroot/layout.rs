// src/sysroot/layout.rs

//! Merged-usr layout and dynamic linker placement
//!
//! After this pass `lib` and `lib64` at the sysroot root are symlinks into
//! `usr/`, and `usr/lib64/<ld.so>` points at the platform dynamic linker,
//! which glibc's `libc.so` linker script names by absolute path.

use crate::distro::Architecture;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Top-level directories folded into `usr/`
pub const MERGED_DIRS: [&str; 2] = ["lib", "lib64"];

/// Enforce merged-usr and stitch in the dynamic linker
pub fn normalize_layout(sysroot: &Path, arch: Architecture) -> Result<()> {
    for name in MERGED_DIRS {
        merge_into_usr(sysroot, name)?;
    }

    match link_dynamic_linker(sysroot, arch)? {
        LinkerPlacement::Linked(target) => info!(
            "Dynamic linker usr/lib64/{} -> {}",
            arch.dynamic_linker(),
            target.display()
        ),
        LinkerPlacement::Present => info!(
            "Dynamic linker usr/lib64/{} shipped as a regular file",
            arch.dynamic_linker()
        ),
        LinkerPlacement::Missing => warn!(
            "Dynamic linker {} not found in {}; linking against this sysroot will fail",
            arch.dynamic_linker(),
            sysroot.display()
        ),
    }

    Ok(())
}

/// Replace `<sysroot>/<name>` with a symlink to `usr/<name>`, moving any
/// contents over first
pub fn merge_into_usr(sysroot: &Path, name: &str) -> Result<()> {
    let top = sysroot.join(name);
    let usr = sysroot.join("usr").join(name);
    let link_target = Path::new("usr").join(name);

    fs::create_dir_all(&usr).map_err(|e| {
        Error::FilesystemError(format!("Failed to create {}: {}", usr.display(), e))
    })?;

    match fs::symlink_metadata(&top) {
        Ok(meta) if meta.file_type().is_symlink() => {
            debug!("{} is already a symlink", top.display());
            return Ok(());
        }
        Ok(meta) if meta.is_dir() => {
            let failures = copy_tree_best_effort(&top, &usr);
            if failures > 0 {
                warn!(
                    "{} entries of {} could not be merged into {}",
                    failures,
                    top.display(),
                    usr.display()
                );
            }
            fs::remove_dir_all(&top).map_err(|e| {
                Error::FilesystemError(format!("Failed to remove {}: {}", top.display(), e))
            })?;
            info!("Merged {} into {}", top.display(), usr.display());
        }
        Ok(_) => {
            return Err(Error::FilesystemError(format!(
                "{} is not a directory and cannot be linked to {}",
                top.display(),
                link_target.display()
            )));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::FilesystemError(format!(
                "Failed to inspect {}: {}",
                top.display(),
                e
            )));
        }
    }

    symlink(&link_target, &top).map_err(|e| {
        Error::FilesystemError(format!(
            "Failed to link {} -> {}: {}",
            top.display(),
            link_target.display(),
            e
        ))
    })
}

/// Copy `src` into `dst`, preserving symlinks and skipping entries that fail
///
/// Destination symlinks are replaced, never written or descended through:
/// until links are normalized they may still point at host paths. Returns
/// the number of entries that could not be copied.
fn copy_tree_best_effort(src: &Path, dst: &Path) -> usize {
    let entries = match fs::read_dir(src) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read {}: {}", src.display(), e);
            return 1;
        }
    };

    let mut failures = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", src.display(), e);
                failures += 1;
                continue;
            }
        };

        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let copied = entry.file_type().and_then(|file_type| {
            let existing = match fs::symlink_metadata(&dst_path) {
                Ok(meta) => Some(meta.file_type()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            };

            if file_type.is_dir() {
                match existing {
                    Some(dst_type) if dst_type.is_dir() => {}
                    Some(_) => {
                        return Err(io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            format!("{} exists and is not a directory", dst_path.display()),
                        ));
                    }
                    None => fs::create_dir(&dst_path)?,
                }
                failures += copy_tree_best_effort(&src_path, &dst_path);
                return Ok(());
            }

            if existing.is_some_and(|dst_type| !dst_type.is_dir()) {
                fs::remove_file(&dst_path)?;
            }
            if file_type.is_symlink() {
                symlink(fs::read_link(&src_path)?, &dst_path)
            } else {
                fs::copy(&src_path, &dst_path).map(|_| ())
            }
        });

        if let Err(e) = copied {
            warn!("Skipping {}: {}", src_path.display(), e);
            failures += 1;
        }
    }

    failures
}

/// Outcome of placing the dynamic linker in `usr/lib64`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkerPlacement {
    /// `usr/lib64/<ld.so>` is a symlink with this relative target
    Linked(PathBuf),
    /// A regular file already sits at `usr/lib64/<ld.so>` and was kept
    Present,
    /// No dynamic linker ships in the sysroot
    Missing,
}

/// Point `usr/lib64/<ld.so>` at the first dynamic linker found
///
/// An existing link with the same target is left alone; a regular file is
/// never replaced.
pub fn link_dynamic_linker(sysroot: &Path, arch: Architecture) -> Result<LinkerPlacement> {
    let ld = arch.dynamic_linker();
    let candidates = [
        Path::new("usr/lib").join(arch.triple()).join(ld),
        Path::new("lib").join(arch.triple()).join(ld),
    ];

    let Some(found) = candidates.iter().find(|c| sysroot.join(c).exists()) else {
        return Ok(LinkerPlacement::Missing);
    };

    let lib64 = sysroot.join("usr/lib64");
    fs::create_dir_all(&lib64).map_err(|e| {
        Error::FilesystemError(format!("Failed to create {}: {}", lib64.display(), e))
    })?;

    let link = lib64.join(ld);
    let target = Path::new("../..").join(found);

    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(&link)? == target {
                return Ok(LinkerPlacement::Linked(target));
            }
            fs::remove_file(&link).map_err(|e| {
                Error::FilesystemError(format!("Failed to remove {}: {}", link.display(), e))
            })?;
        }
        Ok(_) => {
            debug!("{} is a regular file; keeping it", link.display());
            return Ok(LinkerPlacement::Present);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::FilesystemError(format!(
                "Failed to inspect {}: {}",
                link.display(),
                e
            )));
        }
    }

    symlink(&target, &link).map_err(|e| {
        Error::FilesystemError(format!("Failed to link {}: {}", link.display(), e))
    })?;
    Ok(LinkerPlacement::Linked(target))
}
