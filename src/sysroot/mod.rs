// src/sysroot/mod.rs

//! Sysroot assembly
//!
//! Fetches and extracts each required package into the sysroot, then runs the
//! normalization passes exactly once over the finished tree:
//! - `layout`: merged-usr `lib`/`lib64` and the dynamic linker link
//! - `links`: absolute symlink targets re-rooted at the sysroot
//!
//! Every step checks existing state first, so an interrupted run can simply
//! be started again.

pub mod layout;
pub mod links;

use crate::context::BuildContext;
use crate::distro::Architecture;
use crate::error::{Error, Result};
use crate::packages::DebArchive;
use crate::repository::{file_name_from_url, PackageIndex, RepositoryClient};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use layout::normalize_layout;
pub use links::normalize_links;

/// Directories every sysroot carries, whatever the packages provide
pub const BASELINE_DIRS: [&str; 3] = ["usr/lib", "usr/include", "usr/bin"];

/// Outcome of an assembly run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Root of the assembled tree
    pub sysroot: PathBuf,
    /// Packages extracted, in processing order
    pub installed: Vec<String>,
    /// Packages that could not be resolved in the index
    pub skipped: Vec<String>,
    /// Absolute symlinks rewritten by the final pass
    pub rewritten_links: usize,
}

/// Builds the sysroot for one target
pub struct SysrootAssembler<'a> {
    ctx: &'a BuildContext,
    client: &'a RepositoryClient,
}

impl<'a> SysrootAssembler<'a> {
    pub fn new(ctx: &'a BuildContext, client: &'a RepositoryClient) -> Self {
        Self { ctx, client }
    }

    /// Assemble the profile's default package set
    pub fn assemble_default(&self) -> Result<AssemblyReport> {
        self.assemble(&self.ctx.profile().required_packages())
    }

    /// Fetch and extract `packages` in order, then normalize the tree
    ///
    /// A package missing from the index is logged and skipped. A package that
    /// resolves but cannot be fetched or extracted aborts the run. When two
    /// packages ship the same path, the later one wins.
    pub fn assemble(&self, packages: &[String]) -> Result<AssemblyReport> {
        let sysroot = self.ctx.sysroot_dir();
        info!(
            "Assembling sysroot for {} at {}",
            self.ctx.target_key(),
            sysroot.display()
        );

        fs::create_dir_all(&sysroot).map_err(|e| {
            Error::FilesystemError(format!("Failed to create {}: {}", sysroot.display(), e))
        })?;

        let index = PackageIndex::open(self.client, self.ctx)?;

        let mut installed = Vec::new();
        let mut skipped = Vec::new();

        for package in packages {
            let relative = match index.resolve(package) {
                Ok(Some(relative)) => relative,
                Ok(None) => {
                    warn!("Package {} not found in index, skipping", package);
                    skipped.push(package.clone());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to resolve {}: {}, skipping", package, e);
                    skipped.push(package.clone());
                    continue;
                }
            };

            self.install(package, &relative, &sysroot)?;
            installed.push(package.clone());
        }

        for dir in BASELINE_DIRS {
            let path = sysroot.join(dir);
            fs::create_dir_all(&path).map_err(|e| {
                Error::FilesystemError(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }

        let rewritten_links = normalize(&sysroot, self.ctx.arch())?;

        info!(
            "Sysroot {} ready: {} packages installed, {} skipped",
            sysroot.display(),
            installed.len(),
            skipped.len()
        );

        Ok(AssemblyReport {
            sysroot,
            installed,
            skipped,
            rewritten_links,
        })
    }

    /// Fetch one resolved package into the cache and extract it
    fn install(&self, package: &str, relative: &str, sysroot: &Path) -> Result<()> {
        let cache_dir = self.ctx.cache_dir();
        let url = format!("{}/{}", self.ctx.mirror_url(), relative.trim_start_matches('/'));
        let archive_path = cache_dir.join("debs").join(file_name_from_url(relative));

        self.client.fetch(&url, &archive_path)?;

        let compression = DebArchive::new(&archive_path).extract_in(sysroot, &cache_dir)?;
        info!("Installed {} ({})", package, compression.member_name());
        Ok(())
    }
}

/// Run the normalization passes over a fully extracted sysroot
///
/// Layout runs first so that links moved out of `lib`/`lib64` are re-rooted
/// from their final depth. Returns the number of links rewritten.
pub fn normalize(sysroot: &Path, arch: Architecture) -> Result<usize> {
    normalize_layout(sysroot, arch)?;
    normalize_links(sysroot)
}
