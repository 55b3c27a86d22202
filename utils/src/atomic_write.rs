//! Crash-safe file replacement.
//!
//! Writes land in a sibling temp file that is renamed over the target, so a
//! reader never observes a half-written credential file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Inherit the process umask.
    #[default]
    Default,
    /// Owner read/write only (0o600 on Unix).
    OwnerOnly,
}

impl PersistMode {
    #[cfg(unix)]
    fn mode(self) -> Option<u32> {
        match self {
            Self::Default => None,
            Self::OwnerOnly => Some(0o600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync the temp file, then best-effort fsync the parent directory.
    Durable,
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    pub sync: SyncPolicy,
    pub mode: PersistMode,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            sync: SyncPolicy::Durable,
            mode: PersistMode::OwnerOnly,
        }
    }
}

/// Replace `path` with `bytes`, creating missing parent directories.
pub fn atomic_write(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    apply_mode(tmp.path(), options.mode)?;
    tmp.write_all(bytes)?;
    if options.sync == SyncPolicy::Durable {
        tmp.as_file().sync_all()?;
    }

    tmp.persist(path).map_err(|err| err.error)?;
    apply_mode(path, options.mode)?;

    if options.sync == SyncPolicy::Durable
        && let Err(e) = File::open(parent).and_then(|dir| dir.sync_all())
    {
        debug!(path = %parent.display(), "Parent directory sync failed (best-effort): {e}");
    }
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: PersistMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode.mode() {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: PersistMode) -> io::Result<()> {
    Ok(())
}
