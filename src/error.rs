// src/error.rs

use thiserror::Error;

/// Core error types for sysroot-forge
#[derive(Error, Debug)]
pub enum Error {
    /// Distribution id not present in the profile table
    #[error("Unknown distribution: {0}")]
    UnknownDistribution(String),

    /// Architecture string not recognized
    #[error("Unknown architecture: {0}")]
    UnknownArchitecture(String),

    /// Transfer from a mirror could not complete
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Neither Packages.gz nor Packages.xz could be fetched and decoded
    #[error("Package index unavailable for {distro}: {reason}")]
    IndexUnavailable { distro: String, reason: String },

    /// Package container holds no recognized data member
    #[error("Unsupported package format: {0}")]
    UnsupportedFormat(String),

    /// Directory creation, copy or symlink failure
    #[error("Filesystem error: {0}")]
    FilesystemError(String),

    /// External build command exited unsuccessfully
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using sysroot-forge's Error type
pub type Result<T> = std::result::Result<T, Error>;
