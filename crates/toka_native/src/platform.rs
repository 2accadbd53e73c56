//! Platform naming for release assets and library files.

use std::fmt;
use toka_common::AssetKey;

/// Name prefix shared by release assets and library files.
pub const COMPONENT: &str = "libtokenizers";

/// Glob matching the musl dynamic loader.
const MUSL_LOADER_GLOB: &str = "/lib/ld-musl-*.so*";

/// The operating system families releases are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux with glibc.
    LinuxGnu,
    /// Linux with musl libc.
    LinuxMusl,
    /// macOS.
    MacOs,
    /// Windows (MSVC toolchain).
    Windows,
    /// Anything else; named by its Rust target OS string.
    Other(&'static str),
}

impl Os {
    /// The OS running this process.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" if is_musl() => Os::LinuxMusl,
            "linux" => Os::LinuxGnu,
            "macos" => Os::MacOs,
            "windows" => Os::Windows,
            other => Os::Other(other),
        }
    }

    /// Vendor-OS-ABI portion of the target triple.
    pub fn target(self) -> &'static str {
        match self {
            Os::LinuxGnu => "unknown-linux-gnu",
            Os::LinuxMusl => "unknown-linux-musl",
            Os::MacOs => "apple-darwin",
            Os::Windows => "pc-windows-msvc",
            Os::Other(os) => os,
        }
    }
}

/// Architecture and OS of a release build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Architecture as used in release names (`x86_64`, `aarch64`).
    pub arch: &'static str,
    /// Operating system family.
    pub os: Os,
}

impl Platform {
    /// The platform running this process.
    pub fn current() -> Self {
        Self {
            arch: std::env::consts::ARCH,
            os: Os::current(),
        }
    }

    /// Full target triple, e.g. `x86_64-unknown-linux-gnu`.
    pub fn triple(&self) -> String {
        format!("{}-{}", self.arch, self.os.target())
    }

    /// Cache key of this platform's library.
    pub fn asset_key(&self) -> AssetKey {
        AssetKey::native_library(self.triple())
    }

    /// Release asset holding this platform's build.
    pub fn asset_name(&self) -> String {
        format!("{COMPONENT}-{}.tar.gz", self.triple())
    }

    /// File name of the loadable library.
    ///
    /// Linux releases also ship a static archive; it cannot be loaded at
    /// runtime, so only the shared object is ever named.
    pub fn library_file_name(&self) -> String {
        match self.os {
            Os::LinuxGnu | Os::LinuxMusl => format!("{COMPONENT}.so"),
            Os::MacOs => format!("{COMPONENT}.dylib"),
            Os::Windows => "tokenizers.dll".to_string(),
            Os::Other(os) => format!("{COMPONENT}_{os}"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.triple())
    }
}

/// Returns true when a musl dynamic loader is installed.
pub fn is_musl() -> bool {
    glob::glob(MUSL_LOADER_GLOB)
        .map(|mut paths| paths.any(|p| p.is_ok()))
        .unwrap_or(false)
}
