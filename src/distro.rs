// src/distro.rs

//! Supported target distributions and architectures
//!
//! The profile table is an exhaustive `match` over [`Distro`], so adding a
//! variant without a profile is a compile error rather than a lookup failure.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Key into the static distribution table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distro {
    DebianBullseye,
    DebianBookworm,
    UbuntuJammy,
    UbuntuNoble,
}

impl Distro {
    /// Every known distribution, in listing order
    pub const ALL: [Distro; 4] = [
        Distro::DebianBullseye,
        Distro::DebianBookworm,
        Distro::UbuntuJammy,
        Distro::UbuntuNoble,
    ];

    /// Stable identifier used on the command line and in cache paths
    pub fn id(self) -> &'static str {
        self.profile().id
    }

    /// Look up the immutable profile for this distribution
    pub fn profile(self) -> &'static DistroProfile {
        match self {
            Distro::DebianBullseye => &DEBIAN_BULLSEYE,
            Distro::DebianBookworm => &DEBIAN_BOOKWORM,
            Distro::UbuntuJammy => &UBUNTU_JAMMY,
            Distro::UbuntuNoble => &UBUNTU_NOBLE,
        }
    }
}

impl FromStr for Distro {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Distro::ALL
            .into_iter()
            .find(|d| d.id() == s)
            .ok_or_else(|| Error::UnknownDistribution(s.to_string()))
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.id())
    }
}

/// Target CPU architecture, in Debian naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    /// Debian architecture name (`binary-<arch>` in mirror paths)
    pub fn debian_name(self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// GNU multiarch triple, also the library directory under `usr/lib`
    pub fn triple(self) -> &'static str {
        match self {
            Architecture::Amd64 => "x86_64-linux-gnu",
            Architecture::Arm64 => "aarch64-linux-gnu",
        }
    }

    /// CPU family as understood by the cross file's `[host_machine]`
    pub fn cpu_family(self) -> &'static str {
        match self {
            Architecture::Amd64 => "x86_64",
            Architecture::Arm64 => "aarch64",
        }
    }

    /// File name of the platform dynamic linker
    pub fn dynamic_linker(self) -> &'static str {
        match self {
            Architecture::Amd64 => "ld-linux-x86-64.so.2",
            Architecture::Arm64 => "ld-linux-aarch64.so.1",
        }
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "amd64" | "x86_64" => Ok(Architecture::Amd64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            other => Err(Error::UnknownArchitecture(other.to_string())),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.debian_name())
    }
}

/// Static description of one distribution release
#[derive(Debug, Serialize)]
pub struct DistroProfile {
    /// Unique key, e.g. "debian-bookworm"
    pub id: &'static str,
    /// Release codename used under `dists/`
    pub codename: &'static str,
    /// Primary mirror root
    pub mirror_url: &'static str,
    /// Mirror serving non-amd64 architectures, when it differs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_mirror_url: Option<&'static str>,
    /// Archive components published for this release
    pub components: &'static [&'static str],
    /// Architecture used when none is requested
    pub architecture: Architecture,
    /// GCC major version naming the libgcc/libstdc++ dev packages
    pub gcc_major: u32,
}

static DEBIAN_BULLSEYE: DistroProfile = DistroProfile {
    id: "debian-bullseye",
    codename: "bullseye",
    mirror_url: "https://deb.debian.org/debian",
    ports_mirror_url: None,
    components: &["main", "contrib", "non-free"],
    architecture: Architecture::Amd64,
    gcc_major: 10,
};

static DEBIAN_BOOKWORM: DistroProfile = DistroProfile {
    id: "debian-bookworm",
    codename: "bookworm",
    mirror_url: "https://deb.debian.org/debian",
    ports_mirror_url: None,
    components: &["main", "contrib", "non-free", "non-free-firmware"],
    architecture: Architecture::Amd64,
    gcc_major: 12,
};

static UBUNTU_JAMMY: DistroProfile = DistroProfile {
    id: "ubuntu-jammy",
    codename: "jammy",
    mirror_url: "http://archive.ubuntu.com/ubuntu",
    ports_mirror_url: Some("http://ports.ubuntu.com/ubuntu-ports"),
    components: &["main", "universe"],
    architecture: Architecture::Amd64,
    gcc_major: 11,
};

static UBUNTU_NOBLE: DistroProfile = DistroProfile {
    id: "ubuntu-noble",
    codename: "noble",
    mirror_url: "http://archive.ubuntu.com/ubuntu",
    ports_mirror_url: Some("http://ports.ubuntu.com/ubuntu-ports"),
    components: &["main", "universe"],
    architecture: Architecture::Amd64,
    gcc_major: 13,
};

impl DistroProfile {
    /// Mirror root serving packages for `arch`
    pub fn mirror_for(&self, arch: Architecture) -> &'static str {
        match (arch, self.ports_mirror_url) {
            (Architecture::Amd64, _) | (_, None) => self.mirror_url,
            (_, Some(ports)) => ports,
        }
    }

    /// Ordered package set making up the sysroot
    ///
    /// glibc runtime and headers, kernel headers, and the GCC C++ ABI
    /// libraries the LLVM runtime links against during bootstrap.
    pub fn required_packages(&self) -> Vec<String> {
        let gcc = self.gcc_major;
        vec![
            "libc6".to_string(),
            "libc6-dev".to_string(),
            "linux-libc-dev".to_string(),
            "libcrypt1".to_string(),
            "libcrypt-dev".to_string(),
            "libgcc-s1".to_string(),
            format!("libgcc-{}-dev", gcc),
            "libstdc++6".to_string(),
            format!("libstdc++-{}-dev", gcc),
        ]
    }
}
