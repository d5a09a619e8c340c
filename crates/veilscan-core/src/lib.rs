use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod digest;
pub mod error;
pub mod extract;
pub mod filter;
pub mod liveview;
pub mod scan;
pub mod source;

// Re-export the types a front end needs
pub use classify::{Classification, Comparator};
pub use digest::FileDigests;
pub use error::{RecordError, SetupError};
pub use extract::{ensure_dir, ContentExtractor, ExtractionResult, SparsePolicy, WritePolicy};
pub use filter::FilterPolicy;
pub use liveview::{LiveView, OsLiveView};
pub use scan::{run_scan, run_scan_with_oracle, HiddenItem, ScanConfig, ScanContext, ScanReport};
pub use source::{MetadataSource, SourceInfo, WalkEntry};

/// Entry type as reconstructed from filesystem metadata, independent of
/// the live OS view. Virtual and undefined variants are parser artifacts
/// some forensic libraries synthesize (e.g. `$OrphanFiles`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    RegularFile,
    Directory,
    SymbolicLink,
    Undefined,
    VirtualFile,
    VirtualDirectory,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::RegularFile => write!(f, "file"),
            EntryType::Directory => write!(f, "directory"),
            EntryType::SymbolicLink => write!(f, "symlink"),
            EntryType::Undefined => write!(f, "undefined"),
            EntryType::VirtualFile => write!(f, "virtual file"),
            EntryType::VirtualDirectory => write!(f, "virtual directory"),
        }
    }
}

/// Whether the filesystem's own bookkeeping considers the entry's slot
/// in use or free/deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationState {
    Allocated,
    Unallocated,
}

/// One entry seen during the metadata walk.
///
/// The record carries no content; the traversal source pairs it with a
/// scoped content handle in [`WalkEntry`], valid only while the record
/// is being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Name as stored in metadata. May contain arbitrary non-UTF-8 bytes;
    /// adversarial names are compared byte-exact, never normalized.
    pub name: OsString,
    pub entry_type: EntryType,
    pub allocation: AllocationState,
    /// Logical size; `None` when the source could not resolve it.
    pub size: Option<i64>,
    /// Path from the filesystem root to this entry's parent, not
    /// including `name`. Empty for entries directly under the root.
    pub parent_path: PathBuf,
    /// Source-assigned identifier (inode number or metadata address),
    /// printed with findings for forensic traceability.
    pub record_id: u64,
}

impl MetadataRecord {
    /// Path of the entry relative to the filesystem root.
    pub fn relative_path(&self) -> PathBuf {
        self.parent_path.join(&self.name)
    }
}

/// Scan an independently mounted (trusted) view of a volume against the
/// live mount point, extracting hidden entries under `extraction_root`.
pub fn scan_mounted(
    metadata_root: &Path,
    live_root: &Path,
    extraction_root: &Path,
    config: &ScanConfig,
) -> Result<ScanReport> {
    let mut source = source::mounted::MountedSource::open(metadata_root)?;
    let report = run_scan(&mut source, live_root, extraction_root, config)?;

    tracing::info!(
        "Scan complete: {} records examined, {} hidden",
        report.records_scanned,
        report.hidden_count
    );

    Ok(report)
}
