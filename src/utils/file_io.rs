use std::fs;
use std::fs::DirBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::StorageError;

/// Creates the file's parent directory (mode 0700) when it does not exist.
pub fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(parent)
        .map_err(|source| StorageError::PathError {
            path: parent.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Durable atomic replace: write `<path>.tmp` (mode 0600), fsync, rename.
///
/// Readers observe either the previous contents or the new contents,
/// never a partial write.
pub fn write_atomic(
    path: &Path,
    contents: &[u8],
) -> Result<()> {
    create_parent_dir_if_not_exist(path)?;

    let mut tmp_os = path.as_os_str().to_os_string();
    tmp_os.push(".tmp");
    let tmp = PathBuf::from(tmp_os);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&tmp)
        .map_err(|source| StorageError::PathError {
            path: tmp.clone(),
            source,
        })?;
    file.write_all(contents)
        .map_err(|source| StorageError::PathError {
            path: tmp.clone(),
            source,
        })?;
    file.sync_all().map_err(|source| StorageError::PathError {
        path: tmp.clone(),
        source,
    })?;
    drop(file);

    fs::rename(&tmp, path).map_err(|source| StorageError::PathError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
