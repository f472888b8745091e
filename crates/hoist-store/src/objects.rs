use std::io::Write;
use std::path::PathBuf;

use hoist_core::Fingerprint;

use crate::layout::StoreLayout;
use crate::StoreError;

/// Write `data` in `chunk_size` pieces, calling `on_chunk(written, total)`
/// after each one. Returning `false` from the callback aborts the write and
/// leaves nothing behind.
///
/// Returns `false` when the object was already present and nothing was
/// written.
pub fn write_object_chunked<F>(
    layout: &StoreLayout,
    scope: &str,
    fp: &Fingerprint,
    data: &[u8],
    chunk_size: usize,
    mut on_chunk: F,
) -> Result<bool, StoreError>
where
    F: FnMut(u64, u64) -> bool,
{
    let path = layout.object_path(scope, fp)?;
    let total = data.len() as u64;

    if path.exists() {
        on_chunk(total, total);
        return Ok(false);
    }

    let dir = match path.parent() {
        Some(dir) => dir.to_path_buf(),
        None => return Err(StoreError::InvalidScope(scope.to_string())),
    };
    std::fs::create_dir_all(&dir)?;

    // Atomic write: temp file + rename
    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    let mut written = 0u64;
    for chunk in data.chunks(chunk_size.max(1)) {
        temp.write_all(chunk)?;
        written += chunk.len() as u64;
        if !on_chunk(written, total) {
            return Err(StoreError::Aborted { written, total });
        }
    }
    if data.is_empty() && !on_chunk(0, 0) {
        return Err(StoreError::Aborted { written, total });
    }
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

    Ok(true)
}

pub fn read_object(
    layout: &StoreLayout,
    scope: &str,
    fp: &Fingerprint,
) -> Result<Vec<u8>, StoreError> {
    let path = layout.object_path(scope, fp)?;
    if !path.exists() {
        return Err(StoreError::ObjectNotFound {
            scope: scope.to_string(),
            fingerprint: *fp,
        });
    }
    Ok(std::fs::read(&path)?)
}

pub fn remove_object(
    layout: &StoreLayout,
    scope: &str,
    fp: &Fingerprint,
) -> Result<bool, StoreError> {
    let path: PathBuf = layout.object_path(scope, fp)?;
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    Ok(true)
}
