//! Atomic persistence of the session document.
//!
//! Write-to-temporary-then-rename: a reader of the target path sees either
//! the complete old or complete new contents, never a partial write, even
//! across a crash between write and rename. Callers hold the session lock;
//! no locking happens here.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Sibling temp path on the same filesystem, so the rename stays atomic.
fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Serialize-agnostic atomic write: temp file, flush, fsync, rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_file = temp_path(path);

    let mut file = fs::File::create(&temp_file).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    // Durability point: contents must hit disk before the rename makes
    // them visible at the target path.
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_file, path).await.inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_file);
    })?;

    Ok(())
}
