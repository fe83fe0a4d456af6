// src/sysroot/links.rs

//! Absolute symlink rewriting
//!
//! Packages ship links such as `usr/lib/x86_64-linux-gnu/libm.so ->
//! /lib/x86_64-linux-gnu/libm.so.6`, valid only when the tree is mounted at
//! `/`. Each one is re-rooted at the sysroot by prefixing the path from the
//! link's directory back up to the sysroot root.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Every symlink under `sysroot`, without following any of them
pub fn collect_symlinks(sysroot: &Path) -> Result<Vec<PathBuf>> {
    let mut links = Vec::new();

    for entry in WalkDir::new(sysroot).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::FilesystemError(format!("Failed to walk {}: {}", sysroot.display(), e))
        })?;
        if entry.path_is_symlink() {
            links.push(entry.into_path());
        }
    }

    Ok(links)
}

/// Relative path from `dir` up to `root`: "." for the root itself, otherwise
/// one ".." per level
pub fn path_to_root(root: &Path, dir: &Path) -> Result<PathBuf> {
    let relative = dir.strip_prefix(root).map_err(|_| {
        Error::FilesystemError(format!(
            "{} is not inside {}",
            dir.display(),
            root.display()
        ))
    })?;

    let depth = relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();

    if depth == 0 {
        Ok(PathBuf::from("."))
    } else {
        Ok((0..depth).map(|_| "..").collect())
    }
}

/// New target for `link`, or `None` when `target` is already relative
pub fn rebase_target(sysroot: &Path, link: &Path, target: &Path) -> Result<Option<PathBuf>> {
    if !target.has_root() {
        return Ok(None);
    }

    let link_dir = link.parent().unwrap_or(sysroot);
    let mut rebased = OsString::from(path_to_root(sysroot, link_dir)?);
    rebased.push(target.as_os_str());
    Ok(Some(PathBuf::from(rebased)))
}

/// Rewrite every absolute symlink under `sysroot` to a sysroot-relative one
///
/// Links are snapshotted first and rewritten afterwards. Returns the number
/// of links rewritten; a second run over the same tree rewrites none.
pub fn normalize_links(sysroot: &Path) -> Result<usize> {
    let links = collect_symlinks(sysroot)?;
    let mut rewritten = 0;

    for link in &links {
        let target = fs::read_link(link).map_err(|e| {
            Error::FilesystemError(format!("Failed to read link {}: {}", link.display(), e))
        })?;

        let Some(rebased) = rebase_target(sysroot, link, &target)? else {
            continue;
        };

        fs::remove_file(link).map_err(|e| {
            Error::FilesystemError(format!("Failed to remove link {}: {}", link.display(), e))
        })?;
        symlink(&rebased, link).map_err(|e| {
            Error::FilesystemError(format!("Failed to create link {}: {}", link.display(), e))
        })?;

        debug!(
            "Rewrote {}: {} -> {}",
            link.display(),
            target.display(),
            rebased.display()
        );
        rewritten += 1;
    }

    info!(
        "Rewrote {} of {} symlinks under {}",
        rewritten,
        links.len(),
        sysroot.display()
    );
    Ok(rewritten)
}
