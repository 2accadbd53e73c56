//! Dynamic loading of the native library and its version probe.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::NativeError;

/// Exported symbol reporting the library's ABI version.
pub const VERSION_SYMBOL: &str = "get_version";

/// A loaded library image.
pub trait NativeModule: Send + Sync + fmt::Debug {
    /// File the module was loaded from.
    fn path(&self) -> &Path;

    /// Calls the version-reporting symbol.
    fn reported_version(&self) -> Result<String, NativeError>;
}

/// Opens library files.
pub trait LibraryLoader: Send + Sync + fmt::Debug {
    /// Loads the library at `path`. `origin` names where the path came from
    /// and is carried into errors.
    fn load(&self, path: &Path, origin: &'static str) -> Result<Box<dyn NativeModule>, NativeError>;
}

/// Loader backed by the platform dynamic linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DylibLoader;

impl LibraryLoader for DylibLoader {
    fn load(&self, path: &Path, origin: &'static str) -> Result<Box<dyn NativeModule>, NativeError> {
        // SAFETY: loading runs the library's initializers. Only files chosen
        // by the user or verified against a published digest reach here.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| NativeError::Load {
            origin,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(Dylib {
            path: path.to_path_buf(),
            library,
        }))
    }
}

struct Dylib {
    path: PathBuf,
    library: libloading::Library,
}

impl fmt::Debug for Dylib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dylib").field("path", &self.path).finish()
    }
}

type VersionFn = unsafe extern "C" fn() -> *const c_char;

impl NativeModule for Dylib {
    fn path(&self) -> &Path {
        &self.path
    }

    fn reported_version(&self) -> Result<String, NativeError> {
        // SAFETY: the symbol is declared by the library ABI as
        // `const char *get_version(void)`.
        let get_version = unsafe { self.library.get::<VersionFn>(VERSION_SYMBOL.as_bytes()) }
            .map_err(|_| NativeError::MissingSymbol {
                path: self.path.clone(),
                symbol: VERSION_SYMBOL,
            })?;
        // SAFETY: the returned pointer is a NUL-terminated string owned by the
        // library, valid while the library stays loaded.
        let raw = unsafe { get_version() };
        if raw.is_null() {
            return Err(NativeError::InvalidVersion {
                version: String::new(),
                reason: "get_version returned a null pointer".to_string(),
            });
        }
        let version = unsafe { CStr::from_ptr(raw) };
        version
            .to_str()
            .map(str::to_string)
            .map_err(|e| NativeError::InvalidVersion {
                version: version.to_string_lossy().into_owned(),
                reason: e.to_string(),
            })
    }
}
