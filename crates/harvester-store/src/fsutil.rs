//! Filesystem helpers shared by the checkpoint and table writers

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp path used for write-temp-then-rename (`<name>.tmp`)
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write bytes to the temp sibling of `path` and fsync it
///
/// Returns the temp path. The target itself is untouched until [`publish`].
pub(crate) fn write_temp(path: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(tmp)
}

/// Rename a fully written temp file over its target
pub(crate) fn publish(tmp: &Path, target: &Path) -> io::Result<()> {
    fs::rename(tmp, target)?;
    sync_parent(target)
}

/// Whole-file replacement: write temp, fsync, rename
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = write_temp(path, bytes)?;
    publish(&tmp, path)
}

/// Make a rename durable by syncing the containing directory
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("out/results.csv"));
        assert_eq!(tmp, PathBuf::from("out/results.csv.tmp"));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");

        atomic_write(&path, b"[1]").unwrap();
        atomic_write(&path, b"[1,2]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[1,2]");
        assert!(!temp_path(&path).exists());
    }
}
