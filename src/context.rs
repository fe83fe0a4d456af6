// src/context.rs

//! Immutable build context shared by every provisioning step
//!
//! Constructed once at startup from the command line and passed by reference.
//! All output and cache locations are derived here and keyed by distribution
//! id and architecture, so runs for different targets never share state.

use crate::distro::{Architecture, Distro, DistroProfile};
use std::path::{Path, PathBuf};

/// Default LLVM release whose runtimes are built
pub const DEFAULT_LLVM_VERSION: &str = "17.0.6";

/// Explicit configuration for one provisioning run
#[derive(Debug, Clone)]
pub struct BuildContext {
    distro: Distro,
    arch: Architecture,
    work_dir: PathBuf,
    mirror_override: Option<String>,
    llvm_version: String,
    jobs: Option<usize>,
}

impl BuildContext {
    /// Create a context for `distro`/`arch` rooted at `work_dir`
    pub fn new(distro: Distro, arch: Architecture, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            distro,
            arch,
            work_dir: work_dir.into(),
            mirror_override: None,
            llvm_version: DEFAULT_LLVM_VERSION.to_string(),
            jobs: None,
        }
    }

    /// Use `mirror` instead of the profile's mirror
    pub fn with_mirror(mut self, mirror: impl Into<String>) -> Self {
        self.mirror_override = Some(mirror.into());
        self
    }

    /// Build runtimes from this LLVM release
    pub fn with_llvm_version(mut self, version: impl Into<String>) -> Self {
        self.llvm_version = version.into();
        self
    }

    /// Limit parallel jobs of the runtime build
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn distro(&self) -> Distro {
        self.distro
    }

    pub fn profile(&self) -> &'static DistroProfile {
        self.distro.profile()
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    pub fn llvm_version(&self) -> &str {
        &self.llvm_version
    }

    pub fn jobs(&self) -> Option<usize> {
        self.jobs
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Mirror root, without trailing slash
    pub fn mirror_url(&self) -> &str {
        self.mirror_override
            .as_deref()
            .unwrap_or_else(|| self.profile().mirror_for(self.arch))
            .trim_end_matches('/')
    }

    /// `<distro-id>-<arch>`, the key of every per-target directory
    pub fn target_key(&self) -> String {
        format!("{}-{}", self.distro.id(), self.arch)
    }

    /// Download and index cache for this target
    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir
            .join("cache")
            .join(self.distro.id())
            .join(self.arch.debian_name())
    }

    /// Root of the assembled sysroot
    pub fn sysroot_dir(&self) -> PathBuf {
        self.work_dir.join("sysroots").join(self.target_key())
    }

    /// Install prefix of the LLVM C++ runtime
    pub fn runtime_prefix(&self) -> PathBuf {
        self.work_dir.join("toolchains").join(self.target_key())
    }

    /// Scratch build tree of the LLVM C++ runtime
    pub fn runtime_build_dir(&self) -> PathBuf {
        self.work_dir.join("build").join(self.target_key())
    }

    /// Generated cross-compilation descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.work_dir
            .join("cross")
            .join(format!("{}.ini", self.target_key()))
    }
}
