// src/packages/mod.rs

//! Package format support for sysroot-forge
//!
//! Only Debian binary packages are handled: the sysroot is assembled from the
//! `data.tar.*` payloads of `.deb` files fetched from a mirror.

pub mod deb;

#[cfg(test)]
pub(crate) mod fixtures;

pub use deb::{DataCompression, DebArchive};
