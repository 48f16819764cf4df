//! Filesystem capability seam.
//!
//! All artifact I/O goes through [`Fs`] so tests can substitute an in-memory
//! implementation.

use std::collections::HashMap;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;

/// Mode for created artifact directories.
pub const DIR_MODE: u32 = 0o755;

/// Mode for written artifact files.
pub const FILE_MODE: u32 = 0o644;

/// Capability interface over the filesystem.
#[async_trait]
pub trait Fs: Send + Sync {
    /// Create `path` and any missing parents with mode `perm`.
    async fn ensure_dir(&self, path: &Path, perm: u32) -> Result<(), Error>;

    /// Write `data` to `path` with mode `perm`, replacing any existing file.
    async fn write(&self, path: &Path, data: &[u8], perm: u32) -> Result<(), Error>;

    /// Read `path` as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> Result<String, Error>;

    /// Whether a file exists at `path`.
    async fn exists(&self, path: &Path) -> bool;
}

/// [`Fs`] backed by the real filesystem via `tokio::fs`.
///
/// Modes are applied with `set_permissions` so the requested bits hold
/// regardless of the process umask.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

#[async_trait]
impl Fs for OsFs {
    async fn ensure_dir(&self, path: &Path, perm: u32) -> Result<(), Error> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::file(path.display().to_string(), e))?;
        tokio::fs::set_permissions(path, Permissions::from_mode(perm))
            .await
            .map_err(|e| Error::file(path.display().to_string(), e))
    }

    async fn write(&self, path: &Path, data: &[u8], perm: u32) -> Result<(), Error> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::file(path.display().to_string(), e))?;
        tokio::fs::set_permissions(path, Permissions::from_mode(perm))
            .await
            .map_err(|e| Error::file(path.display().to_string(), e))
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file(path.display().to_string(), e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// In-memory [`Fs`] used by unit and end-to-end tests. Records the mode of
/// every directory and file so permission threading is assertable.
#[derive(Debug, Default)]
pub struct MemFs {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    file_modes: Mutex<HashMap<PathBuf, u32>>,
    dir_modes: Mutex<HashMap<PathBuf, u32>>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `path`, if written.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().expect("fs lock").get(path).cloned()
    }

    /// UTF-8 contents of `path`, if written.
    #[must_use]
    pub fn contents_utf8(&self, path: &Path) -> Option<String> {
        self.contents(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Mode the file at `path` was written with.
    #[must_use]
    pub fn file_mode(&self, path: &Path) -> Option<u32> {
        self.file_modes.lock().expect("fs lock").get(path).copied()
    }

    /// Mode the directory at `path` was created with.
    #[must_use]
    pub fn dir_mode(&self, path: &Path) -> Option<u32> {
        self.dir_modes.lock().expect("fs lock").get(path).copied()
    }

    /// Seed a file, creating it as if previously written.
    pub fn seed(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = path.into();
        self.file_modes
            .lock()
            .expect("fs lock")
            .insert(path.clone(), FILE_MODE);
        self.files
            .lock()
            .expect("fs lock")
            .insert(path, data.into());
    }

    /// Paths of all written files, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().expect("fs lock").keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Fs for MemFs {
    async fn ensure_dir(&self, path: &Path, perm: u32) -> Result<(), Error> {
        self.dir_modes
            .lock()
            .expect("fs lock")
            .insert(path.to_path_buf(), perm);
        Ok(())
    }

    async fn write(&self, path: &Path, data: &[u8], perm: u32) -> Result<(), Error> {
        self.file_modes
            .lock()
            .expect("fs lock")
            .insert(path.to_path_buf(), perm);
        self.files
            .lock()
            .expect("fs lock")
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        let files = self.files.lock().expect("fs lock");
        let bytes = files
            .get(path)
            .ok_or_else(|| Error::file(path.display().to_string(), "not found"))?;
        String::from_utf8(bytes.clone())
            .map_err(|e| Error::file(path.display().to_string(), e))
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("fs lock").contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mem_fs_round_trip() {
        let fs = MemFs::new();
        let path = Path::new("out/c1.log");

        assert!(!fs.exists(path).await);
        fs.write(path, b"hello", FILE_MODE).await.unwrap();
        assert!(fs.exists(path).await);
        assert_eq!(fs.read_to_string(path).await.unwrap(), "hello");
        assert_eq!(fs.file_mode(path), Some(0o644));
    }

    #[tokio::test]
    async fn test_mem_fs_records_dir_mode() {
        let fs = MemFs::new();
        fs.ensure_dir(Path::new("out"), DIR_MODE).await.unwrap();
        assert_eq!(fs.dir_mode(Path::new("out")), Some(0o755));
    }

    #[tokio::test]
    async fn test_mem_fs_missing_file() {
        let fs = MemFs::new();
        let err = fs.read_to_string(Path::new("absent")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::File);
    }

    #[tokio::test]
    async fn test_os_fs_round_trip_applies_modes() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFs;
        let nested = dir.path().join("a/b");
        fs.ensure_dir(&nested, DIR_MODE).await.unwrap();
        let dir_perm = std::fs::metadata(&nested).unwrap().permissions();
        assert_eq!(dir_perm.mode() & 0o777, 0o755);

        let file = nested.join("x.log");
        fs.write(&file, b"data", FILE_MODE).await.unwrap();
        assert!(fs.exists(&file).await);
        assert_eq!(fs.read_to_string(&file).await.unwrap(), "data");
        let file_perm = std::fs::metadata(&file).unwrap().permissions();
        assert_eq!(file_perm.mode() & 0o777, 0o644);
    }
}
