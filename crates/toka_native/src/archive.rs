//! Checksum verification and single-member extraction from `.tar.gz` archives.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use toka_common::Sha256Digest;
use tracing::debug;

use crate::error::NativeError;

/// Extracts one library file from a release archive.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    member_suffix: String,
}

impl ArchiveExtractor {
    /// Extracts the first regular entry whose path ends with `member_suffix`.
    pub fn new(member_suffix: impl Into<String>) -> Self {
        Self {
            member_suffix: member_suffix.into(),
        }
    }

    /// The member name searched for.
    pub fn member(&self) -> &str {
        &self.member_suffix
    }

    /// Verifies `archive` against `expected`, then extracts the member to `dest`.
    ///
    /// Nothing is written to `dest` unless the digest matches. The member is
    /// streamed into a sibling temp file and renamed into place, then made
    /// executable on Unix.
    pub fn verify_and_extract(
        &self,
        archive_name: &str,
        archive: &[u8],
        expected: Option<&Sha256Digest>,
        dest: &Path,
    ) -> Result<PathBuf, NativeError> {
        if let Some(expected) = expected {
            let actual = Sha256Digest::from_bytes(archive);
            if actual != *expected {
                return Err(NativeError::ChecksumMismatch {
                    archive: archive_name.to_string(),
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                });
            }
            debug!(archive = archive_name, digest = %actual, "archive checksum verified");
        }

        let archive_err = |source: io::Error| NativeError::Archive {
            archive: archive_name.to_string(),
            source,
        };
        let mut tar = tar::Archive::new(GzDecoder::new(archive));
        for entry in tar.entries().map_err(archive_err)? {
            let mut entry = entry.map_err(archive_err)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(archive_err)?.to_string_lossy().into_owned();
            if !name.ends_with(&self.member_suffix) {
                continue;
            }
            debug!(archive = archive_name, member = %name, dest = %dest.display(), "extracting");
            install(&mut entry, dest)?;
            return Ok(dest.to_path_buf());
        }

        Err(NativeError::MemberNotFound {
            member: self.member_suffix.clone(),
            archive: archive_name.to_string(),
        })
    }
}

fn install(reader: &mut impl Read, dest: &Path) -> Result<(), NativeError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| NativeError::io(parent, e))?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(
        ".{file_name}.tmp.{}.{:08x}",
        std::process::id(),
        rand::random::<u32>()
    ));

    let mut write = || -> io::Result<()> {
        let mut out = File::create(&tmp)?;
        io::copy(reader, &mut out)?;
        out.flush()?;
        out.sync_all()?;
        set_executable(&tmp)
    };
    if let Err(e) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(NativeError::io(&tmp, e));
    }
    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(NativeError::io(dest, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
