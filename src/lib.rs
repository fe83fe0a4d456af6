// src/lib.rs

//! sysroot-forge
//!
//! Provisions cross-compilation environments for Debian and Ubuntu targets:
//! a minimal sysroot assembled from distribution packages, plus an LLVM C++
//! runtime built against it, independent of the host's glibc.
//!
//! # Architecture
//!
//! - Profiles: a static table keyed by the `Distro` enum
//! - Context: one immutable `BuildContext` per run, no ambient globals
//! - Cache-on-presence: every download and unpack is skipped when its result exists
//! - Normalization: merged-usr layout and sysroot-relative symlinks, run once
//!   after all packages are extracted

pub mod context;
pub mod distro;
mod error;
pub mod packages;
pub mod repository;
pub mod runtime;
pub mod sysroot;
pub mod toolchain;

pub use context::BuildContext;
pub use distro::{Architecture, Distro, DistroProfile};
pub use error::{Error, Result};
