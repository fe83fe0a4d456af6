// src/toolchain.rs

//! Cross-compilation descriptor generation
//!
//! Writes a meson-style cross file recording the compilers, the sysroot and
//! the search flags for the LLVM runtime prefix. The file is regenerated in
//! full on every run.

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::repository::temp_path_for;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything the cross file records for one (distro, arch) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainDescriptor {
    pub c_compiler: String,
    pub cpp_compiler: String,
    pub ar: String,
    pub strip: String,
    pub ranlib: String,
    pub target: String,
    pub sysroot: PathBuf,
    pub runtime_prefix: PathBuf,
    pub cpu_family: String,
    pub cpu: String,
    pub endian: String,
    pub system: String,
}

impl ToolchainDescriptor {
    /// Descriptor for the context's target using the LLVM toolchain
    pub fn for_context(ctx: &BuildContext) -> Self {
        let arch = ctx.arch();
        Self {
            c_compiler: "clang".to_string(),
            cpp_compiler: "clang++".to_string(),
            ar: "llvm-ar".to_string(),
            strip: "llvm-strip".to_string(),
            ranlib: "llvm-ranlib".to_string(),
            target: arch.triple().to_string(),
            sysroot: ctx.sysroot_dir(),
            runtime_prefix: ctx.runtime_prefix(),
            cpu_family: arch.cpu_family().to_string(),
            cpu: arch.cpu_family().to_string(),
            endian: "little".to_string(),
            system: "linux".to_string(),
        }
    }

    /// Flags shared by C and C++ compilations
    pub fn c_args(&self) -> Vec<String> {
        vec![
            format!("--target={}", self.target),
            format!("--sysroot={}", self.sysroot.display()),
        ]
    }

    /// C++ flags: libc++ headers from the runtime prefix
    pub fn cpp_args(&self) -> Vec<String> {
        let mut args = self.c_args();
        args.extend([
            "-stdlib=libc++".to_string(),
            "-nostdinc++".to_string(),
            format!("-isystem{}", self.runtime_prefix.join("include/c++/v1").display()),
            format!(
                "-isystem{}",
                self.runtime_prefix
                    .join("include")
                    .join(&self.target)
                    .join("c++/v1")
                    .display()
            ),
        ]);
        args
    }

    /// Link flags shared by C and C++ links
    pub fn c_link_args(&self) -> Vec<String> {
        vec![
            format!("--target={}", self.target),
            format!("--sysroot={}", self.sysroot.display()),
            "-fuse-ld=lld".to_string(),
            format!("-L{}", self.sysroot.join("usr/lib").join(&self.target).display()),
        ]
    }

    /// C++ link flags: static libc++, libc++abi and libunwind from the prefix
    pub fn cpp_link_args(&self) -> Vec<String> {
        let mut args = self.c_link_args();
        args.extend([
            "-stdlib=libc++".to_string(),
            "-unwindlib=libunwind".to_string(),
            "-rtlib=compiler-rt".to_string(),
            format!("-L{}", self.runtime_prefix.join("lib").display()),
            format!("-L{}", self.runtime_prefix.join("lib").join(&self.target).display()),
            "-static-libstdc++".to_string(),
        ]);
        args
    }

    /// Render the cross file
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("[binaries]\n");
        for (key, value) in [
            ("c", &self.c_compiler),
            ("cpp", &self.cpp_compiler),
            ("ar", &self.ar),
            ("strip", &self.strip),
            ("ranlib", &self.ranlib),
        ] {
            let _ = writeln!(out, "{} = {}", key, quote(value));
        }

        out.push_str("\n[built-in options]\n");
        for (key, values) in [
            ("c_args", self.c_args()),
            ("cpp_args", self.cpp_args()),
            ("c_link_args", self.c_link_args()),
            ("cpp_link_args", self.cpp_link_args()),
        ] {
            let _ = writeln!(out, "{} = {}", key, quote_list(&values));
        }

        out.push_str("\n[properties]\n");
        let _ = writeln!(out, "sys_root = {}", quote(&self.sysroot.display().to_string()));
        let _ = writeln!(
            out,
            "pkg_config_libdir = {}",
            quote_list(&[
                self.sysroot.join("usr/lib").join(&self.target).join("pkgconfig").display().to_string(),
                self.sysroot.join("usr/share/pkgconfig").display().to_string(),
            ])
        );

        out.push_str("\n[host_machine]\n");
        let _ = writeln!(out, "system = {}", quote(&self.system));
        let _ = writeln!(out, "cpu_family = {}", quote(&self.cpu_family));
        let _ = writeln!(out, "cpu = {}", quote(&self.cpu));
        let _ = writeln!(out, "endian = {}", quote(&self.endian));

        out
    }

    /// Write the rendered file to `path`, replacing any previous version
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FilesystemError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, self.render())?;
        fs::rename(&temp_path, path).map_err(|e| {
            Error::FilesystemError(format!("Failed to move {} to {}: {}", temp_path.display(), path.display(), e))
        })?;

        info!("Wrote cross file {}", path.display());
        Ok(())
    }
}

/// Meson string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn quote_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Generate and write the descriptor for `ctx`, returning its path
pub fn write_descriptor(ctx: &BuildContext) -> Result<PathBuf> {
    let path = ctx.descriptor_path();
    ToolchainDescriptor::for_context(ctx).write(&path)?;
    Ok(path)
}
