//! Host platform detection.
//!
//! Platform keys use Node's naming (`process.platform`-`process.arch`), which
//! is how release artifacts of the wrapped tool are keyed, e.g. `darwin-arm64`
//! or `win32-x64`.

use anyhow::{Result, anyhow};
use std::fmt;
use std::str::FromStr;

/// An (operating system, architecture) pair in Node naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformKey {
    pub os: String,
    pub arch: String,
}

impl PlatformKey {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the current platform
    pub fn detect() -> Self {
        Self::from_rust_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's target OS and arch names to Node's.
    pub fn from_rust_target(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            "windows" => "win32",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "ia32",
            "powerpc64" => "ppc64",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Executable file name for `name` on this platform.
    pub fn executable_name(&self, name: &str) -> String {
        if self.os == "win32" {
            format!("{}.exe", name)
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for PlatformKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (os, arch) = s
            .split_once('-')
            .filter(|(os, arch)| !os.is_empty() && !arch.is_empty())
            .ok_or_else(|| anyhow!("Invalid platform key \"{}\", expected <os>-<arch>", s))?;
        Ok(Self::new(os, arch))
    }
}

/// Trait for platform detection (useful for testing)
#[cfg_attr(test, mockall::automock)]
pub trait PlatformDetector: Send + Sync {
    fn detect(&self) -> PlatformKey;
}

/// Default platform detector using compile-time target information
pub struct HostPlatformDetector;

impl PlatformDetector for HostPlatformDetector {
    fn detect(&self) -> PlatformKey {
        PlatformKey::detect()
    }
}
