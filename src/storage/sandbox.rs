//! Path sandbox
//!
//! Every client-supplied path is resolved here. A path is accepted only if
//! its canonical form (after `.`, `..` and symlinks are resolved) is the root
//! itself or lies below it.

use log::warn;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Filesystem subtree outside which no session may read, write or navigate
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Creates a sandbox over the canonical form of `root`
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sandbox root is not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Component-wise containment: the root itself or anything below it
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// The session path for a canonical path inside the root
    pub fn virtual_path(&self, canonical: &Path) -> String {
        match canonical.strip_prefix(&self.root) {
            Ok(rest) if rest.as_os_str().is_empty() => "/".to_string(),
            Ok(rest) => format!("/{}", rest.to_string_lossy()),
            Err(_) => "/".to_string(),
        }
    }

    /// Real path of the session's working directory
    pub fn real_cwd(&self, cwd: &str) -> PathBuf {
        self.join_request(cwd, ".")
    }

    /// Joins the request onto the root without interpreting it.
    ///
    /// Absolute arguments start from the root, relative ones from `cwd`.
    fn join_request(&self, cwd: &str, arg: &str) -> PathBuf {
        let mut joined = OsString::from(self.root.as_os_str());
        if arg.starts_with('/') {
            joined.push(arg);
        } else {
            joined.push("/");
            joined.push(cwd);
            joined.push("/");
            joined.push(arg);
        }
        PathBuf::from(joined)
    }

    /// Canonicalizes the request and checks containment
    pub async fn resolve(&self, cwd: &str, arg: &str) -> Result<PathBuf, StorageError> {
        let requested = self.join_request(cwd, arg);
        let canonical = tokio::fs::canonicalize(&requested)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StorageError::NotFound(arg.to_string()),
                _ => StorageError::IoError(e),
            })?;

        if !self.contains(&canonical) {
            warn!(
                "Rejected path {:?} resolving to {} outside {}",
                arg,
                canonical.display(),
                self.root.display()
            );
            return Err(StorageError::OutsideRoot(arg.to_string()));
        }

        Ok(canonical)
    }

    /// Resolves a CWD target and returns the new session path
    pub async fn change_directory(&self, cwd: &str, arg: &str) -> Result<String, StorageError> {
        if arg.is_empty() {
            return Err(StorageError::InvalidPath("empty directory".into()));
        }

        let canonical = self.resolve(cwd, arg).await?;
        let metadata = tokio::fs::metadata(&canonical).await?;
        if !metadata.is_dir() {
            return Err(StorageError::NotADirectory(arg.to_string()));
        }

        Ok(self.virtual_path(&canonical))
    }

    /// Resolves an existing regular file strictly below the root
    pub async fn resolve_file(&self, cwd: &str, arg: &str) -> Result<PathBuf, StorageError> {
        let canonical = self.resolve(cwd, arg).await?;
        if canonical == self.root {
            return Err(StorageError::NotAFile(arg.to_string()));
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if !metadata.is_file() {
            return Err(StorageError::NotAFile(arg.to_string()));
        }

        Ok(canonical)
    }

    /// Resolves the destination of an upload.
    ///
    /// Arguments containing `..` are refused outright. The parent directory
    /// is canonicalized and checked; the final component must not exist yet,
    /// dangling symlinks included.
    pub async fn resolve_new_file(&self, cwd: &str, arg: &str) -> Result<PathBuf, StorageError> {
        if arg.contains("..") {
            return Err(StorageError::PathTraversal(arg.to_string()));
        }

        let requested = self.join_request(cwd, arg);
        let (Some(parent), Some(file_name)) = (requested.parent(), requested.file_name()) else {
            return Err(StorageError::InvalidPath(arg.to_string()));
        };

        let parent = tokio::fs::canonicalize(parent)
            .await
            .map_err(|_| StorageError::NotFound(arg.to_string()))?;
        if !self.contains(&parent) {
            return Err(StorageError::OutsideRoot(arg.to_string()));
        }
        if !tokio::fs::metadata(&parent).await?.is_dir() {
            return Err(StorageError::NotADirectory(arg.to_string()));
        }

        let target = parent.join(file_name);
        if tokio::fs::symlink_metadata(&target).await.is_ok() {
            return Err(StorageError::FileAlreadyExists(arg.to_string()));
        }

        Ok(target)
    }
}
