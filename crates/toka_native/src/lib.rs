//! Native tokenizer library resolution.
//!
//! [`LibraryResolver`] walks an ordered chain of [`LibraryProvider`]s
//! (explicit path, `TOKENIZERS_LIB_PATH`, cached download, fresh download)
//! and returns the first library that loads and passes the [`AbiGate`].
//! Downloads come from a release API and are verified against the published
//! digest before anything is extracted.

pub mod abi;
pub mod archive;
pub mod error;
pub mod loader;
pub mod maintenance;
pub mod platform;
pub mod release;
pub mod resolver;

pub use abi::{AbiConstraint, AbiGate, ABI_CONSTRAINT};
pub use archive::ArchiveExtractor;
pub use error::{NativeError, REMEDIATION};
pub use loader::{DylibLoader, LibraryLoader, NativeModule, VERSION_SYMBOL};
pub use maintenance::{cached_library_path, clear_library_cache, library_info, LibraryInfo};
pub use platform::{Os, Platform};
pub use release::{ReleaseApi, ReleaseAsset, ReleaseManifest};
pub use resolver::{LibraryProvider, LibraryResolver, NativeLibrary, Provided};
