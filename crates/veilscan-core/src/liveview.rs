/// Live-listing oracle: does an entry name exist among the children the
/// running OS reports for a directory?
///
/// This is the central trust decision of the whole system: the live view
/// is assumed to be enumerated by an independent, trustworthy lister
/// (the kernel's own directory syscalls) while the metadata comes from
/// an offline view. A rootkit that also hooks the live lister defeats
/// detection; that is a documented limitation, not something this module
/// mitigates.
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RecordError;

pub trait LiveView {
    /// Whether `parent_path` (relative to the live root) contains a child
    /// named exactly `name`.
    ///
    /// A [`RecordError::DirectoryUnreadable`] answer means "cannot
    /// determine": the caller classifies the record Indeterminate and
    /// continues the walk.
    fn exists(&self, parent_path: &Path, name: &OsStr) -> Result<bool, RecordError>;
}

/// Oracle backed by the running kernel's directory enumeration.
pub struct OsLiveView {
    root: PathBuf,
}

impl OsLiveView {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LiveView for OsLiveView {
    fn exists(&self, parent_path: &Path, name: &OsStr) -> Result<bool, RecordError> {
        let dir = self.root.join(parent_path);
        let entries = fs::read_dir(&dir).map_err(|source| RecordError::DirectoryUnreadable {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| RecordError::DirectoryUnreadable {
                path: dir.clone(),
                source,
            })?;
            // Byte-exact, case-sensitive comparison. Forensic filenames may
            // be crafted to exploit case or Unicode normalization mismatches.
            if entry.file_name() == name {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
