//! File helpers shared by everything that writes into the storage tree.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::warn;

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Read a file, mapping a missing file to `Ok(None)`.
pub async fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Write through a uniquely named sibling temp file and rename it into place.
/// Readers see either the previous file or the complete new one, never a prefix.
pub async fn persist(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    if let Err(err) = write_and_rename(&partial, path, bytes).await {
        if let Err(cleanup) = fs::remove_file(&partial).await {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %partial.display(), error = %cleanup, "failed to remove partial file");
            }
        }
        return Err(err);
    }
    Ok(())
}

async fn write_and_rename(partial: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(partial, bytes).await?;
    fs::rename(partial, path).await
}

/// Concurrent writers of the same path each get their own temp file.
fn partial_path(path: &Path) -> PathBuf {
    let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut partial = path.as_os_str().to_owned();
    partial.push(format!(".{}.{seq}.part", std::process::id()));
    PathBuf::from(partial)
}
