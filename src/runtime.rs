// src/runtime.rs

//! LLVM C++ runtime build
//!
//! Builds libunwind, libc++abi and libc++ from the llvm-project source release
//! against an assembled sysroot, installing static libraries and headers into
//! the target's runtime prefix. The build is three linear cmake stages; each
//! stage is configure, build, install.

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::repository::RepositoryClient;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use xz2::read::XzDecoder;

/// Release download location of the llvm-project source tarball
pub fn source_url(version: &str) -> String {
    format!(
        "https://github.com/llvm/llvm-project/releases/download/llvmorg-{v}/llvm-project-{v}.src.tar.xz",
        v = version
    )
}

/// One of the three runtime libraries, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStage {
    Unwind,
    CxxAbi,
    Cxx,
}

impl RuntimeStage {
    pub const ALL: [RuntimeStage; 3] = [RuntimeStage::Unwind, RuntimeStage::CxxAbi, RuntimeStage::Cxx];

    pub fn name(self) -> &'static str {
        match self {
            RuntimeStage::Unwind => "libunwind",
            RuntimeStage::CxxAbi => "libcxxabi",
            RuntimeStage::Cxx => "libcxx",
        }
    }

    /// Value of LLVM_ENABLE_RUNTIMES; libc++abi needs the libc++ tree present
    fn enabled_runtimes(self) -> &'static str {
        match self {
            RuntimeStage::Unwind => "libunwind",
            RuntimeStage::CxxAbi | RuntimeStage::Cxx => "libcxxabi;libcxx",
        }
    }

    /// Ninja target building this stage's library
    fn target(self) -> &'static str {
        match self {
            RuntimeStage::Unwind => "unwind",
            RuntimeStage::CxxAbi => "cxxabi",
            RuntimeStage::Cxx => "cxx",
        }
    }

    fn cache_flags(self) -> &'static [&'static str] {
        match self {
            RuntimeStage::Unwind => &[
                "-DLIBUNWIND_ENABLE_SHARED=OFF",
                "-DLIBUNWIND_USE_COMPILER_RT=ON",
            ],
            RuntimeStage::CxxAbi => &[
                "-DLIBCXXABI_ENABLE_SHARED=OFF",
                "-DLIBCXXABI_USE_LLVM_UNWINDER=ON",
                "-DLIBCXXABI_USE_COMPILER_RT=ON",
            ],
            RuntimeStage::Cxx => &[
                "-DLIBCXX_ENABLE_SHARED=OFF",
                "-DLIBCXX_CXX_ABI=libcxxabi",
                "-DLIBCXX_ENABLE_STATIC_ABI_LIBRARY=ON",
                "-DLIBCXX_USE_COMPILER_RT=ON",
                "-DLIBCXXABI_USE_LLVM_UNWINDER=ON",
            ],
        }
    }
}

/// A single external command of the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub description: String,
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes build steps
pub trait CommandRunner {
    fn run(&self, step: &BuildStep) -> Result<()>;
}

/// Spawns each step and fails on a non-zero exit status
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, step: &BuildStep) -> Result<()> {
        info!("{}", step.description);
        debug!("Running: {}", step);

        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args);
        if let Some(dir) = &step.dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| {
            Error::CommandFailed(format!(
                "Failed to execute '{}'. Is it installed? ({})",
                step.program, e
            ))
        })?;

        if !status.success() {
            return Err(Error::CommandFailed(format!(
                "{} exited with {}: {}",
                step.program, status, step
            )));
        }
        Ok(())
    }
}

/// Logs each step instead of running it
pub struct DryRunner;

impl CommandRunner for DryRunner {
    fn run(&self, step: &BuildStep) -> Result<()> {
        println!("# {}", step.description);
        println!("{}", step);
        Ok(())
    }
}

/// Builds the LLVM runtime for one target
pub struct RuntimeBuilder<'a> {
    ctx: &'a BuildContext,
    source_url: String,
}

impl<'a> RuntimeBuilder<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            source_url: source_url(ctx.llvm_version()),
        }
    }

    /// Fetch the source tarball from `url` instead of the release site
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Directory the source tree is unpacked to
    pub fn source_dir(&self) -> PathBuf {
        self.ctx
            .cache_dir()
            .join(format!("llvm-project-{}.src", self.ctx.llvm_version()))
    }

    /// Fetch and unpack the llvm-project source once
    ///
    /// The tree is unpacked into a scratch directory and renamed into place,
    /// so a present source directory is always complete.
    pub fn prepare_source(&self, client: &RepositoryClient) -> Result<PathBuf> {
        let source_dir = self.source_dir();
        if source_dir.is_dir() {
            debug!("Using cached LLVM source {}", source_dir.display());
            return Ok(source_dir);
        }

        let cache_dir = self.ctx.cache_dir();
        let tarball = cache_dir.join(format!("llvm-project-{}.src.tar.xz", self.ctx.llvm_version()));
        client.fetch(&self.source_url, &tarball)?;

        let scratch = tempfile::Builder::new()
            .prefix("llvm-src-")
            .tempdir_in(&cache_dir)
            .map_err(|e| {
                Error::FilesystemError(format!(
                    "Failed to create scratch directory in {}: {}",
                    cache_dir.display(),
                    e
                ))
            })?;

        info!("Unpacking {}", tarball.display());
        let mut archive = tar::Archive::new(XzDecoder::new(File::open(&tarball)?));
        archive.unpack(scratch.path()).map_err(|e| {
            Error::FilesystemError(format!("Failed to unpack {}: {}", tarball.display(), e))
        })?;

        let unpacked = scratch.path().join(source_dir.file_name().unwrap_or_default());
        if !unpacked.is_dir() {
            return Err(Error::UnsupportedFormat(format!(
                "{} does not contain {}",
                tarball.display(),
                source_dir.display()
            )));
        }

        fs::rename(&unpacked, &source_dir).map_err(|e| {
            Error::FilesystemError(format!(
                "Failed to move {} to {}: {}",
                unpacked.display(),
                source_dir.display(),
                e
            ))
        })?;
        Ok(source_dir)
    }

    /// Configure, build and install steps for every stage, in order
    pub fn plan(&self, source_dir: &Path) -> Vec<BuildStep> {
        let mut steps = Vec::new();
        for stage in RuntimeStage::ALL {
            steps.extend(self.stage_steps(stage, source_dir));
        }
        steps
    }

    fn stage_steps(&self, stage: RuntimeStage, source_dir: &Path) -> Vec<BuildStep> {
        let ctx = self.ctx;
        let triple = ctx.arch().triple();
        let build_dir = ctx.runtime_build_dir().join(stage.name());

        let mut configure = vec![
            "-G".to_string(),
            "Ninja".to_string(),
            "-S".to_string(),
            source_dir.join("runtimes").display().to_string(),
            "-B".to_string(),
            build_dir.display().to_string(),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
            format!("-DCMAKE_INSTALL_PREFIX={}", ctx.runtime_prefix().display()),
            "-DCMAKE_C_COMPILER=clang".to_string(),
            "-DCMAKE_CXX_COMPILER=clang++".to_string(),
            format!("-DCMAKE_C_COMPILER_TARGET={}", triple),
            format!("-DCMAKE_CXX_COMPILER_TARGET={}", triple),
            format!("-DCMAKE_ASM_COMPILER_TARGET={}", triple),
            format!("-DCMAKE_SYSROOT={}", ctx.sysroot_dir().display()),
            "-DCMAKE_TRY_COMPILE_TARGET_TYPE=STATIC_LIBRARY".to_string(),
            "-DCMAKE_POSITION_INDEPENDENT_CODE=ON".to_string(),
            format!("-DLLVM_ENABLE_RUNTIMES={}", stage.enabled_runtimes()),
            "-DLLVM_INCLUDE_TESTS=OFF".to_string(),
        ];
        configure.extend(stage.cache_flags().iter().map(|f| f.to_string()));

        let mut build = vec![
            "--build".to_string(),
            build_dir.display().to_string(),
            "--target".to_string(),
            stage.target().to_string(),
        ];
        if let Some(jobs) = ctx.jobs() {
            build.push("-j".to_string());
            build.push(jobs.to_string());
        }

        let install = vec![
            "--build".to_string(),
            build_dir.display().to_string(),
            "--target".to_string(),
            format!("install-{}", stage.target()),
        ];

        vec![
            BuildStep {
                description: format!("Configuring {}", stage.name()),
                program: "cmake".to_string(),
                args: configure,
                dir: None,
            },
            BuildStep {
                description: format!("Building {}", stage.name()),
                program: "cmake".to_string(),
                args: build,
                dir: None,
            },
            BuildStep {
                description: format!("Installing {}", stage.name()),
                program: "cmake".to_string(),
                args: install,
                dir: None,
            },
        ]
    }

    /// Run the whole plan, stopping at the first failing step
    pub fn build(&self, source_dir: &Path, runner: &dyn CommandRunner) -> Result<PathBuf> {
        let sysroot = self.ctx.sysroot_dir();
        if !sysroot.is_dir() {
            return Err(Error::FilesystemError(format!(
                "Sysroot {} does not exist; assemble it first",
                sysroot.display()
            )));
        }

        for step in self.plan(source_dir) {
            runner.run(&step)?;
        }

        let prefix = self.ctx.runtime_prefix();
        info!("LLVM runtime installed into {}", prefix.display());
        Ok(prefix)
    }
}
