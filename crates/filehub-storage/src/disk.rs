//! Absolute-path filesystem access confined to one root directory.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use filehub_core::error::{AppError, ErrorCode, ErrorKind};
use filehub_core::result::AppResult;

/// Result of a `stat` on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    /// Final path component.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Byte length for files, zero for directories.
    pub size: i64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// Local filesystem operations over absolute paths under `root`.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Create the root directory if needed and return a handle to it.
    pub async fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create tree root: {}", root.display()),
                e,
            )
        })?;
        let root = fs::canonicalize(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to resolve tree root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` is the root or lies below it.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn guard(&self, path: &Path) -> AppResult<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(AppError::coded(
                ErrorCode::PathOutsideRoot,
                format!(
                    "{} is outside of {}",
                    path.display(),
                    self.root.display()
                ),
            ))
        }
    }

    /// Whether anything exists at `path`.
    pub async fn exists(&self, path: &Path) -> AppResult<bool> {
        self.guard(path)?;
        fs::try_exists(path)
            .await
            .map_err(|e| io_error(e, "check", path))
    }

    /// Stat a single entry.
    pub async fn stat(&self, path: &Path) -> AppResult<DiskEntry> {
        self.guard(path)?;
        let meta = fs::metadata(path)
            .await
            .map_err(|e| io_error(e, "stat", path))?;
        let name = utf8_name(path).ok_or_else(|| {
            AppError::validation(format!("{} is not valid UTF-8", path.display()))
        })?;
        Ok(entry_from_metadata(name, path, &meta))
    }

    /// List the direct children of a directory, sorted by name.
    pub async fn read_dir(&self, path: &Path) -> AppResult<Vec<DiskEntry>> {
        self.guard(path)?;
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|e| io_error(e, "list", path))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(e, "list", path))?
        {
            let child = entry.path();
            let Some(name) = utf8_name(&child) else {
                warn!(path = %child.display(), "Skipping entry with a non UTF-8 name");
                continue;
            };
            let meta = entry
                .metadata()
                .await
                .map_err(|e| io_error(e, "stat", &child))?;
            entries.push(entry_from_metadata(name, &child, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create a new regular file, failing if one already exists.
    /// Returns the number of bytes written.
    pub async fn create_file(&self, path: &Path, data: Option<&Bytes>) -> AppResult<i64> {
        self.guard(path)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| io_error(e, "create", path))?;

        let written = match data {
            Some(data) => {
                file.write_all(data)
                    .await
                    .map_err(|e| io_error(e, "write", path))?;
                data.len()
            }
            None => 0,
        };
        file.flush().await.map_err(|e| io_error(e, "flush", path))?;

        debug!(path = %path.display(), bytes = written, "Created file");
        Ok(written as i64)
    }

    /// Create a directory. Returns `false` when it already existed.
    pub async fn create_dir(&self, path: &Path) -> AppResult<bool> {
        self.guard(path)?;
        match fs::create_dir(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Created directory");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let meta = fs::metadata(path)
                    .await
                    .map_err(|e| io_error(e, "stat", path))?;
                if meta.is_dir() {
                    Ok(false)
                } else {
                    Err(AppError::coded(
                        ErrorCode::AlreadyExists,
                        format!("A file already exists at {}", path.display()),
                    ))
                }
            }
            Err(e) => Err(io_error(e, "create directory", path)),
        }
    }

    /// Remove a regular file or an empty directory.
    pub async fn remove(&self, path: &Path) -> AppResult<()> {
        self.guard(path)?;
        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| io_error(e, "stat", path))?;
        if meta.is_dir() {
            fs::remove_dir(path)
                .await
                .map_err(|e| io_error(e, "remove directory", path))?;
        } else {
            fs::remove_file(path)
                .await
                .map_err(|e| io_error(e, "remove", path))?;
        }
        debug!(path = %path.display(), "Removed entry");
        Ok(())
    }

    /// Remove whatever is at `path`, recursively.
    pub async fn remove_all(&self, path: &Path) -> AppResult<()> {
        self.guard(path)?;
        if path == self.root {
            return Err(AppError::coded(
                ErrorCode::RootFolder,
                "Refusing to remove the tree root",
            ));
        }
        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(e, "stat", path)),
        };
        if meta.is_dir() {
            fs::remove_dir_all(path)
                .await
                .map_err(|e| io_error(e, "remove directory", path))?;
        } else {
            fs::remove_file(path)
                .await
                .map_err(|e| io_error(e, "remove", path))?;
        }
        debug!(path = %path.display(), "Removed entry recursively");
        Ok(())
    }

    /// Rename `from` to `to` in one step.
    pub async fn rename(&self, from: &Path, to: &Path) -> AppResult<()> {
        self.guard(from)?;
        self.guard(to)?;
        fs::rename(from, to).await.map_err(|e| {
            AppError::with_source(
                storage_kind(&e),
                format!("Failed to rename {} -> {}", from.display(), to.display()),
                e,
            )
        })?;
        debug!(from = %from.display(), to = %to.display(), "Renamed entry");
        Ok(())
    }
}

fn utf8_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_owned)
}

fn entry_from_metadata(name: String, path: &Path, meta: &std::fs::Metadata) -> DiskEntry {
    DiskEntry {
        name,
        path: path.to_path_buf(),
        is_dir: meta.is_dir(),
        size: if meta.is_dir() { 0 } else { meta.len() as i64 },
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

fn storage_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
        _ => ErrorKind::Storage,
    }
}

fn io_error(err: std::io::Error, op: &str, path: &Path) -> AppError {
    let message = format!("Failed to {op} {}: {err}", path.display());
    let mut app = AppError::with_source(storage_kind(&err), message, err);
    app.code = match app.kind {
        ErrorKind::NotFound => Some(ErrorCode::FileNotFound),
        ErrorKind::Conflict => Some(ErrorCode::AlreadyExists),
        _ => None,
    };
    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_stat_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let root = disk.root().to_path_buf();

        assert!(disk.create_dir(&root.join("a")).await.unwrap());
        assert!(!disk.create_dir(&root.join("a")).await.unwrap());
        let written = disk
            .create_file(&root.join("a/f.txt"), Some(&Bytes::from_static(b"hello")))
            .await
            .unwrap();
        assert_eq!(written, 5);

        let entry = disk.stat(&root.join("a/f.txt")).await.unwrap();
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);

        let listed = disk.read_dir(&root.join("a")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "f.txt");
    }

    #[tokio::test]
    async fn test_create_file_twice_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let path = disk.root().join("f");
        disk.create_file(&path, None).await.unwrap();
        let err = disk.create_file(&path, None).await.unwrap_err();
        assert!(err.is(ErrorCode::AlreadyExists));
    }

    #[tokio::test]
    async fn test_paths_outside_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path().join("root")).await.unwrap();
        let err = disk.stat(&dir.path().join("elsewhere")).await.unwrap_err();
        assert!(err.is(ErrorCode::PathOutsideRoot));
    }

    #[tokio::test]
    async fn test_remove_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let a = disk.root().join("a");
        disk.create_dir(&a).await.unwrap();
        disk.create_file(&a.join("f"), None).await.unwrap();

        assert!(disk.remove(&a).await.is_err());
        disk.remove_all(&a).await.unwrap();
        assert!(!disk.exists(&a).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_entry_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let err = disk.stat(&disk.root().join("nope")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.is(ErrorCode::FileNotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_dir_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let root = disk.root().to_path_buf();
        let bad = root.join(OsStr::from_bytes(b"bad-\xff.txt"));
        if std::fs::write(&bad, b"x").is_err() {
            // Some filesystems refuse such names outright.
            return;
        }
        std::fs::write(root.join("good.txt"), b"x").unwrap();

        let listed = disk.read_dir(&root).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["good.txt"]);
        assert!(disk.stat(&bad).await.is_err());
    }
}
