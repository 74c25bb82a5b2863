use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

const ARCHIVE_DIR: &str = ".archives";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path escapes the project folder: {0}")]
    InvalidPath(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// On-disk layout of the upload root:
///
/// ```text
/// <root>/<owner>/.archives/<name>.zip   raw archive
/// <root>/<owner>/<name>/...              extracted project folder
/// <root>/<owner>/.staging-*              in-flight extraction, never listed
/// ```
#[derive(Debug, Clone)]
pub struct ProjectStorage {
    root: PathBuf,
}

impl ProjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn owner_dir(&self, owner: Uuid) -> PathBuf {
        self.root.join(owner.to_string())
    }

    pub fn archive_dir(&self, owner: Uuid) -> PathBuf {
        self.owner_dir(owner).join(ARCHIVE_DIR)
    }

    pub fn ensure_owner_dir(&self, owner: Uuid) -> io::Result<PathBuf> {
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Sorted names of the owner's project folders. Raw archives and hidden
    /// staging directories are skipped; a missing owner directory is empty.
    pub fn list_project_folders(&self, owner: Uuid) -> Result<Vec<String>, StorageError> {
        let dir = self.owner_dir(owner);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                folders.push(name);
            }
        }
        folders.sort();
        Ok(folders)
    }

    /// Resolves a folder name previously returned by
    /// [`list_project_folders`](Self::list_project_folders).
    pub fn project_dir(&self, owner: Uuid, folder: &str) -> Result<PathBuf, StorageError> {
        let rel = safe_relative_path(folder)
            .filter(|p| p.components().count() == 1)
            .ok_or_else(|| StorageError::InvalidPath(folder.to_string()))?;
        if folder.starts_with('.') {
            return Err(StorageError::InvalidPath(folder.to_string()));
        }
        let dir = self.owner_dir(owner).join(rel);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(format!("project folder {folder}")));
        }
        Ok(dir)
    }

    /// Every regular file under the project folder, relative and `/`-separated.
    pub fn list_files(&self, owner: Uuid, folder: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.project_dir(owner, folder)?;
        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1) {
            let entry = entry.map_err(|e| {
                StorageError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "filesystem loop")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&dir) {
                files.push(to_slash(rel));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Reads a file for display. Invalid UTF-8 is replaced, never rejected.
    pub fn read_text(
        &self,
        owner: Uuid,
        folder: &str,
        relative: &str,
    ) -> Result<String, StorageError> {
        let dir = self.project_dir(owner, folder)?;
        let rel = safe_relative_path(relative)
            .filter(|p| p.components().next().is_some())
            .ok_or_else(|| StorageError::InvalidPath(relative.to_string()))?;

        let full = dir.join(rel);
        if !full.is_file() {
            return Err(StorageError::NotFound(format!("file {relative}")));
        }

        // symlinks could still point elsewhere
        let canonical_dir = dir.canonicalize()?;
        let canonical = full.canonicalize()?;
        if !canonical.starts_with(&canonical_dir) {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }

        let bytes = fs::read(&canonical)?;
        debug!(path = %canonical.display(), len = bytes.len(), "file read for display");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Turns an untrusted `/` or `\` separated path into a relative path that
/// cannot leave its base directory. Returns `None` for absolute paths, any
/// `..` component or embedded NUL bytes. `.` and empty components are dropped,
/// so the result may be empty.
pub fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') || normalized.contains('\0') {
        return None;
    }
    let mut out = PathBuf::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            p => out.push(p),
        }
    }
    Some(out)
}

pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_project(files: &[(&str, &str)]) -> (tempfile::TempDir, ProjectStorage, Uuid) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = ProjectStorage::new(tmp.path());
        let owner = Uuid::new_v4();
        let project = storage.owner_dir(owner).join("demo");
        for (path, body) in files {
            let full = project.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, body).unwrap();
        }
        (tmp, storage, owner)
    }

    #[test]
    fn safe_relative_path_rejects_escapes() {
        assert!(safe_relative_path("../../evil.sh").is_none());
        assert!(safe_relative_path("a/../../b").is_none());
        assert!(safe_relative_path("/etc/passwd").is_none());
        assert!(safe_relative_path("\\windows\\system32").is_none());
        assert!(safe_relative_path("a\\..\\..\\b").is_none());
        assert!(safe_relative_path("nul\0byte").is_none());
    }

    #[test]
    fn safe_relative_path_normalizes_harmless_input() {
        assert_eq!(
            safe_relative_path("./src//main.py").unwrap(),
            PathBuf::from("src/main.py")
        );
        assert_eq!(
            safe_relative_path("dir\\file.txt").unwrap(),
            PathBuf::from("dir/file.txt")
        );
        assert_eq!(safe_relative_path("./").unwrap(), PathBuf::new());
    }

    #[test]
    fn missing_owner_has_no_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ProjectStorage::new(tmp.path());
        assert!(storage.list_project_folders(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn folder_listing_skips_archives_and_staging() {
        let (_tmp, storage, owner) = storage_with_project(&[("main.py", "print()")]);
        let owner_dir = storage.owner_dir(owner);
        fs::write(owner_dir.join("demo.zip"), b"PK").unwrap();
        fs::create_dir_all(owner_dir.join(".staging-123")).unwrap();
        fs::create_dir_all(storage.archive_dir(owner)).unwrap();
        fs::create_dir_all(owner_dir.join("another")).unwrap();

        assert_eq!(
            storage.list_project_folders(owner).unwrap(),
            vec!["another".to_string(), "demo".to_string()]
        );
    }

    #[test]
    fn lists_files_relative_and_sorted() {
        let (_tmp, storage, owner) = storage_with_project(&[
            ("src/lib.py", ""),
            ("README.md", "# hi"),
            ("src/tests/test_lib.py", ""),
        ]);
        assert_eq!(
            storage.list_files(owner, "demo").unwrap(),
            vec!["README.md", "src/lib.py", "src/tests/test_lib.py"]
        );
    }

    #[test]
    fn unknown_folder_is_not_found() {
        let (_tmp, storage, owner) = storage_with_project(&[("a.txt", "")]);
        assert!(matches!(
            storage.list_files(owner, "nope"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn folder_names_cannot_traverse() {
        let (_tmp, storage, owner) = storage_with_project(&[("a.txt", "")]);
        for bad in ["..", "../other", "demo/src", ".staging-1"] {
            assert!(
                matches!(storage.project_dir(owner, bad), Err(StorageError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn reads_text_and_replaces_invalid_utf8() {
        let (_tmp, storage, owner) = storage_with_project(&[("src/app.py", "print('hi')")]);
        assert_eq!(
            storage.read_text(owner, "demo", "src/app.py").unwrap(),
            "print('hi')"
        );

        let bin = storage.owner_dir(owner).join("demo").join("blob.bin");
        fs::write(&bin, [b'o', b'k', 0xff]).unwrap();
        assert_eq!(
            storage.read_text(owner, "demo", "blob.bin").unwrap(),
            "ok\u{fffd}"
        );
    }

    #[test]
    fn read_text_rejects_traversal_and_reports_missing() {
        let (_tmp, storage, owner) = storage_with_project(&[("a.txt", "")]);
        fs::write(storage.owner_dir(owner).join("secret.txt"), "x").unwrap();

        assert!(matches!(
            storage.read_text(owner, "demo", "../secret.txt"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.read_text(owner, "demo", ""),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.read_text(owner, "demo", "missing.txt"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn read_text_rejects_symlinks_leaving_the_folder() {
        let (_tmp, storage, owner) = storage_with_project(&[("a.txt", "")]);
        let outside = storage.owner_dir(owner).join("secret.txt");
        fs::write(&outside, "x").unwrap();
        std::os::unix::fs::symlink(&outside, storage.owner_dir(owner).join("demo/link.txt"))
            .unwrap();

        assert!(matches!(
            storage.read_text(owner, "demo", "link.txt"),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
