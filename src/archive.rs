//! Safe materialization of uploaded zip archives.
//!
//! Every entry is validated before the first byte is written: entry names
//! must stay inside the target, the entry count and the declared
//! decompressed size must fit the configured limits. Data is then unpacked
//! into a hidden staging directory next to the project folder and swapped in
//! only once everything succeeded, so a failed upload never leaves a half
//! written project behind.

use std::{
    fs,
    io::{self, Cursor, Read},
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::{
    config::UploadConfig,
    storage::{safe_relative_path, ProjectStorage},
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("archive extraction failed: {0}")]
    Archive(String),
}

impl ExtractError {
    fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    fn io(what: &str, e: io::Error) -> Self {
        Self::Archive(format!("{what}: {e}"))
    }
}

/// Outcome of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub storage_path: PathBuf,
    pub filename: String,
}

struct PlannedEntry {
    index: usize,
    path: PathBuf,
    is_dir: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    storage: ProjectStorage,
    allowed_extensions: Vec<String>,
    max_extracted_bytes: u64,
    max_entries: usize,
}

impl ArchiveExtractor {
    pub fn new(storage: ProjectStorage, config: &UploadConfig) -> Self {
        Self {
            storage,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            max_extracted_bytes: config.max_extracted_bytes,
            max_entries: config.max_entries,
        }
    }

    /// Cheap pre-check so callers can reject uploads before any work.
    pub fn check_extension(&self, declared_filename: &str) -> Result<(), ExtractError> {
        if has_allowed_extension(declared_filename, &self.allowed_extensions) {
            Ok(())
        } else {
            Err(ExtractError::UnsupportedFileType(
                declared_filename.to_string(),
            ))
        }
    }

    /// Unpacks `archive` into `<owner>/<stem>` and keeps the raw bytes as
    /// `<owner>/.archives/<filename>`, replacing what a previous upload of the
    /// same name left there.
    pub fn extract(
        &self,
        archive: &[u8],
        owner: Uuid,
        declared_filename: &str,
    ) -> Result<Extracted, ExtractError> {
        self.check_extension(declared_filename)?;

        let filename = sanitize_filename(declared_filename);
        if !has_allowed_extension(&filename, &self.allowed_extensions) {
            return Err(ExtractError::InvalidFilename(declared_filename.to_string()));
        }
        let stem = Path::new(&filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExtractError::InvalidFilename(declared_filename.to_string()))?
            .to_string();

        let mut zip = ZipArchive::new(Cursor::new(archive))
            .map_err(|e| ExtractError::archive(format!("unreadable zip: {e}")))?;
        let plan = self.plan(&mut zip)?;

        let owner_dir = self
            .storage
            .ensure_owner_dir(owner)
            .map_err(|e| ExtractError::io("create owner directory", e))?;
        let token = Uuid::new_v4();
        let staging = owner_dir.join(format!(".staging-{token}"));
        if let Err(e) = self.unpack(&mut zip, &plan, &staging) {
            discard(&staging);
            warn!(%owner, %filename, error = %e, "extraction aborted");
            return Err(e);
        }

        let project_dir = owner_dir.join(&stem);
        let stored = self
            .store_raw(archive, owner, &filename, token)
            .map_err(|e| ExtractError::io("store archive", e))
            .and_then(|_| {
                replace_with(&staging, &project_dir)
                    .map_err(|e| ExtractError::io("move extracted project into place", e))
            });
        if let Err(e) = stored {
            discard(&staging);
            warn!(%owner, %filename, error = %e, "extraction aborted");
            return Err(e);
        }

        info!(%owner, %filename, entries = plan.len(), path = %project_dir.display(), "archive extracted");
        Ok(Extracted {
            storage_path: project_dir,
            filename,
        })
    }

    fn store_raw(&self, archive: &[u8], owner: Uuid, filename: &str, token: Uuid) -> io::Result<()> {
        let dir = self.storage.archive_dir(owner);
        fs::create_dir_all(&dir)?;
        let part = dir.join(format!(".{filename}.{token}.part"));
        let written = fs::write(&part, archive).and_then(|_| fs::rename(&part, dir.join(filename)));
        if written.is_err() {
            discard(&part);
        }
        written
    }

    fn plan(&self, zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<PlannedEntry>, ExtractError> {
        if zip.len() > self.max_entries {
            return Err(ExtractError::archive(format!(
                "{} entries exceed the limit of {}",
                zip.len(),
                self.max_entries
            )));
        }

        let mut declared: u64 = 0;
        let mut plan = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip
                .by_index_raw(index)
                .map_err(|e| ExtractError::archive(format!("entry {index}: {e}")))?;
            let name = entry.name().to_string();
            let path = safe_relative_path(&name).ok_or_else(|| {
                ExtractError::archive(format!("entry {name:?} escapes the target directory"))
            })?;
            if path.as_os_str().is_empty() {
                continue;
            }

            declared = declared.saturating_add(entry.size());
            if declared > self.max_extracted_bytes {
                return Err(ExtractError::archive(format!(
                    "decompressed size exceeds the limit of {} bytes",
                    self.max_extracted_bytes
                )));
            }
            plan.push(PlannedEntry {
                index,
                path,
                is_dir: entry.is_dir(),
            });
        }
        Ok(plan)
    }

    fn unpack(
        &self,
        zip: &mut ZipArchive<Cursor<&[u8]>>,
        plan: &[PlannedEntry],
        target: &Path,
    ) -> Result<(), ExtractError> {
        fs::create_dir_all(target).map_err(|e| ExtractError::io("create staging directory", e))?;

        let mut written: u64 = 0;
        for planned in plan {
            let out_path = target.join(&planned.path);
            if planned.is_dir {
                fs::create_dir_all(&out_path)
                    .map_err(|e| ExtractError::io("create directory", e))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ExtractError::io("create directory", e))?;
            }

            let mut entry = zip
                .by_index(planned.index)
                .map_err(|e| ExtractError::archive(format!("entry {}: {e}", planned.index)))?;
            let mut out = fs::File::create(&out_path)
                .map_err(|e| ExtractError::io("create file", e))?;

            // declared sizes can lie; count what actually comes out
            let remaining = self.max_extracted_bytes - written;
            let copied = io::copy(&mut entry.by_ref().take(remaining.saturating_add(1)), &mut out)
                .map_err(|e| ExtractError::io(&format!("decompress {}", planned.path.display()), e))?;
            written += copied;
            if written > self.max_extracted_bytes {
                return Err(ExtractError::archive(format!(
                    "decompressed size exceeds the limit of {} bytes",
                    self.max_extracted_bytes
                )));
            }
            debug!(path = %planned.path.display(), bytes = copied, "entry extracted");
        }
        Ok(())
    }
}

/// Reduces an uploaded filename to `[A-Za-z0-9_.-]`, with path separators and
/// whitespace turned into `_` and leading/trailing dots and underscores
/// stripped. May return an empty string.
pub fn sanitize_filename(raw: &str) -> String {
    lazy_static! {
        static ref UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
    }
    let ascii: String = raw
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_RE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

fn has_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

const REPLACE_ATTEMPTS: usize = 3;

/// Moves `staging` to `target`, removing whatever is there first. A concurrent
/// upload of the same name may land in between; the removal is then repeated
/// so the later swap wins.
fn replace_with(staging: &Path, target: &Path) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        remove_existing(target)?;
        match fs::rename(staging, target) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < REPLACE_ATTEMPTS && target.exists() => {
                debug!(target = %target.display(), error = %e, attempt, "target reappeared, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn remove_existing(target: &Path) -> io::Result<()> {
    let removed = match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
        Ok(_) => fs::remove_file(target),
        Err(e) => Err(e),
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn discard(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = result {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to clean up");
        }
    }
}
