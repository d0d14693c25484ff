//! Artifact trees on local disk
//!
//! Artifacts travel between stores as a directory tree: the source store
//! materializes its tree under a staging directory, the destination store
//! uploads that directory. Paths inside a tree are `/`-separated and relative
//! to the tree root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Scoped staging directory for one artifact transfer.
///
/// The directory and everything under it is removed when the value is
/// dropped, whichever step of the transfer failed.
#[derive(Debug)]
pub struct ArtifactStaging {
    dir: TempDir,
}

impl ArtifactStaging {
    /// Create a staging directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("trueno-migrate-")
            .tempdir()?;
        Ok(Self { dir })
    }

    /// Create a staging directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("trueno-migrate-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    /// Root of the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the staging directory now, reporting removal errors.
    ///
    /// # Errors
    ///
    /// Returns error if the tree cannot be deleted
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

/// Validate a relative artifact path and normalize it to `/` separators.
///
/// The empty string addresses the tree root.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for absolute paths or `..` components
pub fn normalize_artifact_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidInput(format!(
                    "artifact path must be relative and stay inside the run: '{path}'"
                )));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Join a normalized artifact path onto a local directory.
#[must_use]
pub fn local_path(root: &Path, artifact_path: &str) -> PathBuf {
    artifact_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Read every file under `root` into memory, keyed by relative path.
///
/// A missing root reads as an empty tree.
///
/// # Errors
///
/// Returns error if the tree cannot be walked or a file cannot be read
pub fn read_tree(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| Error::Other(format!("Failed to walk directory: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_path(root, entry.path())?;
        files.insert(relative, fs::read(entry.path())?);
    }
    Ok(files)
}

/// Write an in-memory tree under `root`, creating directories as needed.
///
/// # Errors
///
/// Returns error if a path is invalid or a file cannot be written
pub fn write_tree<'a, I>(root: &Path, files: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<u8>)>,
{
    fs::create_dir_all(root)?;
    let mut written = 0;
    for (path, bytes) in files {
        let target = local_path(root, &normalize_artifact_path(path)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        written += 1;
    }
    Ok(written)
}

/// Copy the tree under `src` into `dst`, merging with existing content.
///
/// # Errors
///
/// Returns error if the source cannot be walked or a file cannot be copied
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    if !src.exists() {
        return Ok(copied);
    }
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| Error::Other(format!("Failed to walk directory: {e}")))?;
        let target = local_path(dst, &relative_path(src, entry.path())?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| Error::Other(format!("Path {} escapes {}: {e}", path.display(), root.display())))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        files.insert("info.txt".to_string(), b"Hi artifact".to_vec());
        files.insert("dir2/info.txt".to_string(), b"Hi artifact".to_vec());
        files
    }

    #[test]
    fn test_normalize_artifact_path() {
        assert_eq!(normalize_artifact_path("").unwrap(), "");
        assert_eq!(normalize_artifact_path("./dir2/info.txt").unwrap(), "dir2/info.txt");
        assert!(normalize_artifact_path("../escape").is_err());
        assert!(normalize_artifact_path("/etc/passwd").is_err());
    }

    #[test]
    fn test_write_then_read_tree() {
        let dir = tempfile::tempdir().unwrap();
        let files = sample_tree();
        assert_eq!(write_tree(dir.path(), &files).unwrap(), 2);
        assert!(dir.path().join("dir2").join("info.txt").is_file());
        assert_eq!(read_tree(dir.path()).unwrap(), files);
    }

    #[test]
    fn test_copy_tree_preserves_layout() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_tree(src.path(), &sample_tree()).unwrap();
        fs::create_dir_all(src.path().join("empty")).unwrap();

        assert_eq!(copy_tree(src.path(), dst.path()).unwrap(), 2);
        assert!(dst.path().join("empty").is_dir());
        assert_eq!(read_tree(dst.path()).unwrap(), sample_tree());
    }

    #[test]
    fn test_read_missing_tree_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_tree(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_staging_removed_on_drop() {
        let path = {
            let staging = ArtifactStaging::new().unwrap();
            fs::write(staging.path().join("a.bin"), [1, 2, 3]).unwrap();
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_close() {
        let parent = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new_in(parent.path()).unwrap();
        let path = staging.path().to_path_buf();
        staging.close().unwrap();
        assert!(!path.exists());
    }
}
